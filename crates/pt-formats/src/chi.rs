//! Tombo CHI encrypted notes (`.chi`), as read by Tombo, Kumagusu and
//! miniNoteViewer.
//!
//! File layout:
//! ```text
//! [4 bytes: "BF01"][4 bytes: plaintext length, LE u32][N bytes: Blowfish-CBC body]
//!
//! body (before encryption, padded with zeros to a multiple of 8):
//!   [8 bytes: random][16 bytes: MD5(plaintext)][plaintext][padding]
//! ```

use std::io::{Read, Write};

use pt_core::{PtError, PtResult};
use pt_crypto::{
    random_bytes, tombo_decrypt, tombo_digest, tombo_encrypt, tombo_key, NoteKey, TOMBO_BLOCK_SIZE,
};

use crate::handler::NoteHandler;

const MAGIC: &[u8; 4] = b"BF01";
const HEADER_SIZE: usize = 8;
const RANDOM_SIZE: usize = 8;
const DIGEST_SIZE: usize = 16;
const PREFIX_SIZE: usize = RANDOM_SIZE + DIGEST_SIZE;

#[derive(Debug, Clone)]
pub struct TomboChi {
    key: NoteKey,
}

impl TomboChi {
    pub fn new(key: NoteKey) -> Self {
        Self { key }
    }
}

impl NoteHandler for TomboChi {
    fn name(&self) -> &'static str {
        "tombo"
    }

    fn description(&self) -> &'static str {
        "Tombo CHI (Blowfish)"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".chi"]
    }

    fn is_encrypted(&self) -> bool {
        true
    }

    fn read_from(&self, reader: &mut dyn Read) -> PtResult<Vec<u8>> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        if data.len() < HEADER_SIZE || &data[..4] != MAGIC {
            return Err(PtError::unsupported("not a Tombo CHI file"));
        }
        let plain_len = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
        let mut body = data.split_off(HEADER_SIZE);

        if body.len() % TOMBO_BLOCK_SIZE != 0 || body.len() < PREFIX_SIZE + plain_len {
            return Err(PtError::unsupported(format!(
                "CHI body of {} bytes cannot hold {plain_len} bytes of text",
                body.len()
            )));
        }

        let key = tombo_key(self.key.as_bytes());
        tombo_decrypt(&key, &mut body)?;

        let digest = &body[RANDOM_SIZE..PREFIX_SIZE];
        let plaintext = &body[PREFIX_SIZE..PREFIX_SIZE + plain_len];
        let padding = &body[PREFIX_SIZE + plain_len..];
        if tombo_digest(plaintext).as_slice() != digest || padding.iter().any(|&b| b != 0) {
            return Err(PtError::BadPassword);
        }
        Ok(plaintext.to_vec())
    }

    fn write_to(&self, writer: &mut dyn Write, plaintext: &[u8]) -> PtResult<()> {
        let plain_len = u32::try_from(plaintext.len())
            .map_err(|_| PtError::unsupported("note too large for CHI format"))?;

        let padded = (PREFIX_SIZE + plaintext.len()).div_ceil(TOMBO_BLOCK_SIZE) * TOMBO_BLOCK_SIZE;
        let mut body = Vec::with_capacity(padded);
        body.extend_from_slice(&random_bytes(RANDOM_SIZE));
        body.extend_from_slice(&tombo_digest(plaintext));
        body.extend_from_slice(plaintext);
        body.resize(padded, 0);

        let key = tombo_key(self.key.as_bytes());
        tombo_encrypt(&key, &mut body)?;

        writer.write_all(MAGIC)?;
        writer.write_all(&plain_len.to_le_bytes())?;
        writer.write_all(&body)?;
        Ok(())
    }
}
