//! HMAC-SHA1 truncated to 80 bits (WinZip AE-x authentication code)

use hmac::{Hmac, Mac};
use pt_core::{PtError, PtResult};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Size of the truncated authentication tag
pub const HMAC_TAG_SIZE: usize = 10;

/// Compute the leftmost 10 bytes of HMAC-SHA1(key, message).
pub fn hmac_sha1_80(key: &[u8], message: &[u8]) -> PtResult<[u8; HMAC_TAG_SIZE]> {
    let mac = keyed(key, message)?;
    let full = mac.finalize().into_bytes();
    let mut tag = [0u8; HMAC_TAG_SIZE];
    tag.copy_from_slice(&full[..HMAC_TAG_SIZE]);
    Ok(tag)
}

/// Constant-time check of a truncated tag. `Ok(false)` means mismatch.
pub fn verify_hmac_sha1_80(key: &[u8], message: &[u8], tag: &[u8]) -> PtResult<bool> {
    if tag.len() != HMAC_TAG_SIZE {
        return Ok(false);
    }
    let mac = keyed(key, message)?;
    Ok(mac.verify_truncated_left(tag).is_ok())
}

fn keyed(key: &[u8], message: &[u8]) -> PtResult<HmacSha1> {
    let mut mac = <HmacSha1 as Mac>::new_from_slice(key)
        .map_err(|e| PtError::Other(anyhow::anyhow!("HMAC init failed: {e}")))?;
    mac.update(message);
    Ok(mac)
}
