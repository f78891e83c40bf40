//! Key derivation: PBKDF2-HMAC-SHA1 password → key material

use sha1::Sha1;
use zeroize::Zeroizing;

/// Iteration count fixed by the WinZip AES format
pub const PBKDF2_ITERATIONS: u32 = 1000;

/// Derive `len` bytes from `password` and `salt` with PBKDF2-HMAC-SHA1.
///
/// The result is zeroized on drop; callers slice it into the individual
/// keys they need.
pub fn pbkdf2_sha1(password: &[u8], salt: &[u8], iterations: u32, len: usize) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(vec![0u8; len]);
    pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    // RFC 6070 test vectors
    #[test]
    fn test_rfc6070_one_iteration() {
        let dk = pbkdf2_sha1(b"password", b"salt", 1, 20);
        assert_eq!(hex(&dk), "0c60c80f961f0e71f3a9b524af6012062fe037a6");
    }

    #[test]
    fn test_rfc6070_two_iterations() {
        let dk = pbkdf2_sha1(b"password", b"salt", 2, 20);
        assert_eq!(hex(&dk), "ea6c014dc72d6f8ccd1ed92ace1d41f0d8de8957");
    }

    #[test]
    fn test_rfc6070_long_output() {
        let dk = pbkdf2_sha1(
            b"passwordPASSWORDpassword",
            b"saltSALTsaltSALTsaltSALTsaltSALTsalt",
            4096,
            25,
        );
        assert_eq!(
            hex(&dk),
            "3d2eec4fe41c849b80c8d83662c0e44a8b291a964cf2f07038"
        );
    }

    #[test]
    fn test_kdf_different_salts() {
        let k1 = pbkdf2_sha1(b"pw", &[1u8; 16], PBKDF2_ITERATIONS, 66);
        let k2 = pbkdf2_sha1(b"pw", &[2u8; 16], PBKDF2_ITERATIONS, 66);
        assert_eq!(k1.len(), 66);
        assert_ne!(*k1, *k2, "different salts must produce different keys");
    }
}
