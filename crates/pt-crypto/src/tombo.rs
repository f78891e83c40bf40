//! Tombo's Blowfish variant.
//!
//! Tombo keys Blowfish with MD5(password) and runs it over 32-bit words read
//! in little-endian order (the x86-native layout of the original C code), in
//! CBC mode with an all-zero IV.
//!
//! The key schedule follows the C reference code with a signed `char` key:
//! each key byte is sign-extended before being OR'd into the word that is
//! XOR'd into the P-array, so any byte >= 0x80 fills the word's upper bits
//! with ones. [`signed_key`] folds the key into those words and re-packs them
//! as a key the stock schedule consumes unchanged.

use blowfish::BlowfishLE;
use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use md5::{Digest, Md5};
use pt_core::{PtError, PtResult};

/// Blowfish block size in bytes
pub const TOMBO_BLOCK_SIZE: usize = 8;

/// Tombo's key: the MD5 digest of the password bytes.
pub fn tombo_key(password: &[u8]) -> [u8; 16] {
    tombo_digest(password)
}

/// MD5, used by Tombo both for keying and as the plaintext integrity check.
pub fn tombo_digest(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Md5::digest(data));
    out
}

/// CBC-encrypt `buf` in place. `buf.len()` must be a multiple of 8.
pub fn tombo_encrypt(key: &[u8], buf: &mut [u8]) -> PtResult<()> {
    let cipher = cipher_for(key, buf.len())?;
    let mut chain = [0u8; TOMBO_BLOCK_SIZE];
    for block in buf.chunks_exact_mut(TOMBO_BLOCK_SIZE) {
        for (b, c) in block.iter_mut().zip(chain.iter()) {
            *b ^= c;
        }
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
        chain.copy_from_slice(block);
    }
    Ok(())
}

/// CBC-decrypt `buf` in place. `buf.len()` must be a multiple of 8.
pub fn tombo_decrypt(key: &[u8], buf: &mut [u8]) -> PtResult<()> {
    let cipher = cipher_for(key, buf.len())?;
    let mut chain = [0u8; TOMBO_BLOCK_SIZE];
    let mut saved = [0u8; TOMBO_BLOCK_SIZE];
    for block in buf.chunks_exact_mut(TOMBO_BLOCK_SIZE) {
        saved.copy_from_slice(block);
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
        for (b, c) in block.iter_mut().zip(chain.iter()) {
            *b ^= c;
        }
        chain = saved;
    }
    Ok(())
}

/// Longest key the Blowfish schedule accepts.
const MAX_KEY_SIZE: usize = 56;

/// The key as the stock schedule must see it to reproduce the signed-`char`
/// feed.
///
/// The schedule XORs P-array word `i` with four key bytes taken cyclically, so
/// the words repeat with period `lcm(len, 4) / 4`. One period of the
/// sign-extended words, written big-endian, is such a key.
pub(crate) fn signed_key(key: &[u8]) -> PtResult<Vec<u8>> {
    let len = key.len();
    let period = match len % 4 {
        0 => len,
        2 => len * 2,
        _ => len * 4,
    };
    if len == 0 || period > MAX_KEY_SIZE {
        return Err(PtError::unsupported(format!("invalid Blowfish key length {len}")));
    }
    let mut bytes = key.iter().cycle().map(|&b| b as i8 as i32 as u32);
    let mut out = Vec::with_capacity(period);
    for _ in 0..period / 4 {
        let word = bytes
            .by_ref()
            .take(4)
            .fold(0u32, |word, b| (word << 8) | b);
        out.extend_from_slice(&word.to_be_bytes());
    }
    Ok(out)
}

fn cipher_for(key: &[u8], len: usize) -> PtResult<BlowfishLE> {
    if len % TOMBO_BLOCK_SIZE != 0 {
        return Err(PtError::unsupported(format!(
            "Blowfish data length {len} is not a multiple of {TOMBO_BLOCK_SIZE}"
        )));
    }
    let key = signed_key(key)?;
    BlowfishLE::new_from_slice(&key)
        .map_err(|_| PtError::unsupported(format!("invalid Blowfish key length {}", key.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn test_md5_key() {
        assert_eq!(hex(&tombo_key(b"password")), "5f4dcc3b5aa765d61d8327deb882cf99");
    }

    #[test]
    fn test_little_endian_word_order() {
        // Schneier's zero-key vector 4ef997456198dd78, with each 32-bit
        // half byte-swapped.
        let mut block = [0u8; 8];
        tombo_encrypt(&[0u8; 8], &mut block).unwrap();
        assert_eq!(hex(&block), "4597f94e78dd9861");
    }

    #[test]
    fn test_signed_key_words() {
        // 5f4dcc3b 5aa765d6 1d8327de b882cf99, sign-extended byte by byte
        let key = tombo_key(b"password");
        assert_eq!(
            hex(&signed_key(&key).unwrap()),
            "ffffcc3bffffffd6ffffffdeffffff99"
        );
        // Bytes below 0x80 pass through
        assert_eq!(signed_key(b"abcd").unwrap(), b"abcd");
        // Odd lengths repeat until the words line up again
        assert_eq!(
            hex(&signed_key(&[0x01, 0x80, 0x02]).unwrap()),
            "ff800201ffffff80ffff8002"
        );
    }

    #[test]
    fn test_signed_key_length_limits() {
        assert!(signed_key(&[]).is_err());
        assert!(signed_key(&[7u8; 56]).is_ok());
        // 15 bytes need a 60-byte period
        assert!(signed_key(&[7u8; 15]).is_err());
    }

    #[test]
    fn test_known_block_with_md5_key() {
        // Computed with the C reference Blowfish keyed through a signed char
        // pointer; the unsigned schedule gives f791a4e7960a15a4.
        let key = tombo_key(b"password");
        let mut block = *b"ABCDEFGH";
        tombo_encrypt(&key, &mut block).unwrap();
        assert_eq!(hex(&block), "89049d0cdc43bcaf");
    }

    #[test]
    fn test_known_zero_block_with_md5_key() {
        let key = tombo_key(b"password");
        let mut block = [0u8; 8];
        tombo_encrypt(&key, &mut block).unwrap();
        assert_eq!(hex(&block), "33fc72a80e225b64");
    }

    #[test]
    fn test_cbc_roundtrip() {
        let key = tombo_key(b"secret");
        let plain = b"0123456789abcdef01234567".to_vec();
        let mut buf = plain.clone();
        tombo_encrypt(&key, &mut buf).unwrap();
        assert_ne!(buf, plain);
        // Identical plaintext blocks must not produce identical ciphertext blocks
        assert_ne!(buf[..8], buf[16..24]);
        tombo_decrypt(&key, &mut buf).unwrap();
        assert_eq!(buf, plain);
    }

    #[test]
    fn test_unaligned_length_rejected() {
        let mut buf = [0u8; 7];
        assert!(matches!(
            tombo_encrypt(&[1u8; 16], &mut buf),
            Err(PtError::UnsupportedFile(_))
        ));
    }
}
