//! Key material handed to format handlers.

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

/// Raw key bytes, typically the UTF-8 encoding of a password.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone, Default)]
pub struct NoteKey {
    bytes: Vec<u8>,
}

impl NoteKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn from_password(password: &str) -> Self {
        Self::from_bytes(password.as_bytes())
    }

    pub fn from_secret(password: &SecretString) -> Self {
        Self::from_password(password.expose_secret())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for NoteKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for NoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
