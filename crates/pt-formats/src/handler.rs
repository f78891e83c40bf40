use std::io::{Read, Write};

use pt_core::PtResult;

/// A note file format, bound to the key it was created with.
///
/// Handlers hold no state beyond the key and create no persistent
/// resources, so they are cheap to build per operation.
pub trait NoteHandler: Send + Sync {
    /// Short identifier, e.g. `"zipaes"`
    fn name(&self) -> &'static str;

    /// Human-readable description for UI listings
    fn description(&self) -> &'static str;

    /// Recognised extensions (lowercase, with leading dot), canonical first
    fn extensions(&self) -> &'static [&'static str];

    /// Extension used when writing a new file
    fn default_extension(&self) -> &'static str {
        self.extensions()[0]
    }

    /// Whether reading requires the right key
    fn is_encrypted(&self) -> bool;

    /// Read the whole stream and return the plaintext.
    fn read_from(&self, reader: &mut dyn Read) -> PtResult<Vec<u8>>;

    /// Encode `plaintext` and write it to `writer`.
    fn write_to(&self, writer: &mut dyn Write, plaintext: &[u8]) -> PtResult<()>;

    /// Convenience wrapper over [`NoteHandler::read_from`] for in-memory data.
    fn decode(&self, data: &[u8]) -> PtResult<Vec<u8>> {
        let mut reader = data;
        self.read_from(&mut reader)
    }

    /// Convenience wrapper over [`NoteHandler::write_to`] for in-memory data.
    fn encode(&self, plaintext: &[u8]) -> PtResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out, plaintext)?;
        Ok(out)
    }
}
