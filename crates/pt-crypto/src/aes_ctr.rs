//! AES in CTR mode with a little-endian 128-bit counter, as used by WinZip AE-x.
//!
//! The counter block starts at 1 and there is no nonce prefix: block `n` of
//! the keystream is `AES(key, le128(n + 1))`.

use ctr::cipher::{KeyIvInit, StreamCipher};
use pt_core::{PtError, PtResult};

type Aes128CtrLe = ctr::Ctr128LE<aes::Aes128>;
type Aes192CtrLe = ctr::Ctr128LE<aes::Aes192>;
type Aes256CtrLe = ctr::Ctr128LE<aes::Aes256>;

/// Initial counter block: 1 as a little-endian u128.
const INITIAL_COUNTER: [u8; 16] = 1u128.to_le_bytes();

/// Encrypt or decrypt `data` in place. The key selects AES-128/192/256.
pub fn apply_aes_ctr_le(key: &[u8], data: &mut [u8]) -> PtResult<()> {
    match key.len() {
        16 => keystream::<Aes128CtrLe>(key, data),
        24 => keystream::<Aes192CtrLe>(key, data),
        32 => keystream::<Aes256CtrLe>(key, data),
        n => Err(PtError::unsupported(format!(
            "AES key must be 16, 24 or 32 bytes, got {n}"
        ))),
    }
}

/// Encrypt or decrypt `data`, returning a new buffer of the same length.
pub fn aes_ctr_le(key: &[u8], data: &[u8]) -> PtResult<Vec<u8>> {
    let mut out = data.to_vec();
    apply_aes_ctr_le(key, &mut out)?;
    Ok(out)
}

fn keystream<C: KeyIvInit + StreamCipher>(key: &[u8], data: &mut [u8]) -> PtResult<()> {
    let mut cipher = C::new_from_slices(key, &INITIAL_COUNTER)
        .map_err(|e| PtError::Other(anyhow::anyhow!("AES-CTR init failed: {e}")))?;
    cipher.apply_keystream(data);
    Ok(())
}
