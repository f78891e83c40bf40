//! Pass-through handler for unencrypted notes.

use std::io::{Read, Write};

use pt_core::PtResult;

use crate::handler::NoteHandler;

#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl NoteHandler for Raw {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn description(&self) -> &'static str {
        "Unencrypted text"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".txt", ".md"]
    }

    fn is_encrypted(&self) -> bool {
        false
    }

    fn read_from(&self, reader: &mut dyn Read) -> PtResult<Vec<u8>> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn write_to(&self, writer: &mut dyn Write, plaintext: &[u8]) -> PtResult<()> {
        writer.write_all(plaintext)?;
        Ok(())
    }
}
