//! pt-crypto: the primitives behind the encrypted note formats
//!
//! Everything here operates on byte slices and is deterministic apart from
//! [`random_bytes`]. The on-disk layouts that use them live in `pt-formats`:
//!
//! ```text
//! ZipAES (WinZip AE-1/AE-2)
//!   PBKDF2-HMAC-SHA1(password, salt, 1000) -> aes_key || hmac_key || verify[2]
//!   payload = AES-CTR (128-bit little-endian counter, starts at 1)
//!   tag     = HMAC-SHA1(hmac_key, payload)[..10]
//!
//! Tombo CHI
//!   key     = MD5(password)
//!   body    = Blowfish (little-endian words) CBC, zero IV
//! ```

pub mod aes_ctr;
pub mod kdf;
pub mod key;
pub mod mac;
pub mod tombo;

pub use aes_ctr::{aes_ctr_le, apply_aes_ctr_le};
pub use kdf::{pbkdf2_sha1, PBKDF2_ITERATIONS};
pub use key::NoteKey;
pub use mac::{hmac_sha1_80, verify_hmac_sha1_80, HMAC_TAG_SIZE};
pub use tombo::{tombo_decrypt, tombo_digest, tombo_encrypt, tombo_key, TOMBO_BLOCK_SIZE};

use rand::RngCore;

/// Fill a fresh buffer from the thread-local CSPRNG.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}
