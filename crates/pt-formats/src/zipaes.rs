//! WinZip AE-1/AE-2 single-entry ZIP archives (`.aes.zip`, `.aes256.zip`).
//!
//! Archive layout (all integers little-endian):
//! ```text
//! local file header (30) | "encrypted.md" | AES extra field (11)
//! [salt: 8/12/16][verify: 2][payload: AES-CTR-LE][HMAC-SHA1-80: 10]
//! central directory header (46) | "encrypted.md" | AES extra field (11)
//! end of central directory (22)
//! ```
//!
//! PBKDF2-HMAC-SHA1(password, salt, 1000, 2*keylen + 2) is split into
//! `aes_key || hmac_key || verify`. The MAC covers the encrypted payload.
//! AE-1 stores the CRC-32 of the plaintext; AE-2 stores zero.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use pt_core::{PtError, PtResult};
use pt_crypto::{
    apply_aes_ctr_le, hmac_sha1_80, pbkdf2_sha1, random_bytes, verify_hmac_sha1_80, NoteKey,
    HMAC_TAG_SIZE, PBKDF2_ITERATIONS,
};

use crate::handler::NoteHandler;
use crate::ZIP_INNER_FILENAME;

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;

const LOCAL_HEADER_SIZE: usize = 30;
const AES_EXTRA_SIZE: usize = 11;
const END_OF_CENTRAL_DIR_SIZE: usize = 22;
const AES_EXTRA_ID: u16 = 0x9901;
const AES_EXTRA_DATA_SIZE: u16 = 7;
const AES_VENDOR_ID: u16 = 0x4541; // "AE"
const METHOD_AES: u16 = 99;
const VERSION_NEEDED: u16 = 51;
const FLAG_ENCRYPTED: u16 = 0x0001;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const VERIFY_SIZE: usize = 2;
const DEFLATE_LEVEL: u32 = 9;

/// AES extra field version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeVersion {
    /// CRC-32 of the plaintext is stored and checked
    Ae1,
    /// CRC-32 field is zero; the HMAC alone authenticates
    Ae2,
}

impl AeVersion {
    fn code(self) -> u16 {
        match self {
            AeVersion::Ae1 => 1,
            AeVersion::Ae2 => 2,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(AeVersion::Ae1),
            2 => Some(AeVersion::Ae2),
            _ => None,
        }
    }
}

/// AES key strength byte of the extra field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrength {
    Aes128,
    Aes192,
    Aes256,
}

impl KeyStrength {
    fn code(self) -> u8 {
        match self {
            KeyStrength::Aes128 => 1,
            KeyStrength::Aes192 => 2,
            KeyStrength::Aes256 => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(KeyStrength::Aes128),
            2 => Some(KeyStrength::Aes192),
            3 => Some(KeyStrength::Aes256),
            _ => None,
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            KeyStrength::Aes128 => 16,
            KeyStrength::Aes192 => 24,
            KeyStrength::Aes256 => 32,
        }
    }

    pub fn salt_len(self) -> usize {
        self.key_len() / 2
    }
}

/// Compression applied before encryption (the "actual method").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZipMethod {
    Stored,
    Deflate,
}

impl ZipMethod {
    fn code(self) -> u16 {
        match self {
            ZipMethod::Stored => 0,
            ZipMethod::Deflate => 8,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(ZipMethod::Stored),
            8 => Some(ZipMethod::Deflate),
            _ => None,
        }
    }
}

/// Writer settings. Reading accepts every combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZipAesOptions {
    pub version: AeVersion,
    pub strength: KeyStrength,
    pub method: ZipMethod,
}

impl Default for ZipAesOptions {
    fn default() -> Self {
        Self {
            version: AeVersion::Ae1,
            strength: KeyStrength::Aes256,
            method: ZipMethod::Deflate,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZipAes {
    key: NoteKey,
    options: ZipAesOptions,
}

impl ZipAes {
    pub fn new(key: NoteKey) -> Self {
        Self::with_options(key, ZipAesOptions::default())
    }

    pub fn with_options(key: NoteKey, options: ZipAesOptions) -> Self {
        Self { key, options }
    }

    pub fn options(&self) -> ZipAesOptions {
        self.options
    }
}

impl NoteHandler for ZipAes {
    fn name(&self) -> &'static str {
        "zipaes"
    }

    fn description(&self) -> &'static str {
        "WinZip AES-256 encrypted ZIP (AE-1/AE-2)"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".aes.zip", ".aes256.zip"]
    }

    fn is_encrypted(&self) -> bool {
        true
    }

    fn read_from(&self, reader: &mut dyn Read) -> PtResult<Vec<u8>> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let entry = AesEntry::parse(&data)?;
        entry.decrypt(self.key.as_bytes())
    }

    fn write_to(&self, writer: &mut dyn Write, plaintext: &[u8]) -> PtResult<()> {
        let archive = build_archive(self.key.as_bytes(), plaintext, self.options)?;
        writer.write_all(&archive)?;
        Ok(())
    }
}

/// The parsed local entry of an AES-encrypted archive.
struct AesEntry<'a> {
    version: AeVersion,
    strength: KeyStrength,
    method: ZipMethod,
    crc32: u32,
    salt: &'a [u8],
    verify: &'a [u8],
    payload: &'a [u8],
    mac: &'a [u8],
}

impl<'a> AesEntry<'a> {
    fn parse(data: &'a [u8]) -> PtResult<Self> {
        find_end_of_central_directory(data)?;
        let mut cur = Cursor::new(data);
        if cur.u32()? != LOCAL_HEADER_SIG {
            return Err(PtError::unsupported("not a ZIP file"));
        }
        let _version_needed = cur.u16()?;
        let flags = cur.u16()?;
        let method = cur.u16()?;
        let _mod_time = cur.u16()?;
        let _mod_date = cur.u16()?;
        let crc32 = cur.u32()?;
        let compressed_size = cur.u32()? as usize;
        let _uncompressed_size = cur.u32()?;
        let name_len = cur.u16()? as usize;
        let extra_len = cur.u16()? as usize;

        if method != METHOD_AES {
            return Err(PtError::unsupported(format!(
                "ZIP entry is not AES encrypted (method {method})"
            )));
        }
        if extra_len != AES_EXTRA_SIZE {
            return Err(PtError::unsupported(format!(
                "unexpected ZIP extra field length {extra_len}"
            )));
        }
        if flags & FLAG_DATA_DESCRIPTOR != 0 && compressed_size == 0 {
            return Err(PtError::unsupported("streamed ZIP entries are not supported"));
        }

        cur.take(name_len)?;

        let extra_id = cur.u16()?;
        let _extra_data_size = cur.u16()?;
        let ae_version = cur.u16()?;
        let vendor = cur.u16()?;
        let strength = cur.u8()?;
        let actual_method = cur.u16()?;

        let version = match (extra_id, AeVersion::from_code(ae_version), vendor) {
            (AES_EXTRA_ID, Some(v), AES_VENDOR_ID) => v,
            _ => {
                return Err(PtError::unsupported(format!(
                    "unknown AES extra field (id {extra_id:#06x}, version {ae_version}, vendor {vendor:#06x})"
                )))
            }
        };
        let strength = KeyStrength::from_code(strength)
            .ok_or_else(|| PtError::unsupported(format!("unknown AES key strength {strength}")))?;
        let method = ZipMethod::from_code(actual_method).ok_or_else(|| {
            PtError::unsupported(format!("unsupported compression method {actual_method}"))
        })?;

        let overhead = strength.salt_len() + VERIFY_SIZE + HMAC_TAG_SIZE;
        let payload_len = compressed_size.checked_sub(overhead).ok_or_else(|| {
            PtError::unsupported(format!("compressed size {compressed_size} too small"))
        })?;

        Ok(Self {
            version,
            strength,
            method,
            crc32,
            salt: cur.take(strength.salt_len())?,
            verify: cur.take(VERIFY_SIZE)?,
            payload: cur.take(payload_len)?,
            mac: cur.take(HMAC_TAG_SIZE)?,
        })
    }

    fn decrypt(&self, password: &[u8]) -> PtResult<Vec<u8>> {
        let key_len = self.strength.key_len();
        let derived = pbkdf2_sha1(password, self.salt, PBKDF2_ITERATIONS, 2 * key_len + VERIFY_SIZE);
        let (aes_key, rest) = derived.split_at(key_len);
        let (hmac_key, verify) = rest.split_at(key_len);

        if verify != self.verify {
            return Err(PtError::BadPassword);
        }
        if !verify_hmac_sha1_80(hmac_key, self.payload, self.mac)? {
            return Err(PtError::unsupported("bad HMAC"));
        }

        let mut payload = self.payload.to_vec();
        apply_aes_ctr_le(aes_key, &mut payload)?;

        let plaintext = match self.method {
            ZipMethod::Stored => payload,
            ZipMethod::Deflate => {
                let mut out = Vec::new();
                DeflateDecoder::new(payload.as_slice())
                    .read_to_end(&mut out)
                    .map_err(|e| PtError::unsupported(format!("inflate failed: {e}")))?;
                out
            }
        };

        if self.version == AeVersion::Ae1 && crc32fast::hash(&plaintext) != self.crc32 {
            return Err(PtError::unsupported("CRC-32 mismatch"));
        }
        tracing::trace!(
            version = ?self.version,
            strength = ?self.strength,
            method = ?self.method,
            bytes = plaintext.len(),
            "decrypted AES zip entry"
        );
        Ok(plaintext)
    }
}

/// Offset of the end-of-central-directory record. The record must end the
/// file exactly (after its comment), as ZIP readers locate it from the end.
fn find_end_of_central_directory(data: &[u8]) -> PtResult<usize> {
    let last = data
        .len()
        .checked_sub(END_OF_CENTRAL_DIR_SIZE)
        .ok_or_else(|| PtError::unsupported("not a ZIP file"))?;
    let first = last.saturating_sub(u16::MAX as usize);
    (first..=last)
        .rev()
        .find(|&pos| {
            let sig = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
            let comment_len = u16::from_le_bytes([data[pos + 20], data[pos + 21]]) as usize;
            sig == END_OF_CENTRAL_DIR_SIG && pos + END_OF_CENTRAL_DIR_SIZE + comment_len == data.len()
        })
        .ok_or_else(|| PtError::unsupported("ZIP end of central directory not found"))
}

fn build_archive(password: &[u8], plaintext: &[u8], options: ZipAesOptions) -> PtResult<Vec<u8>> {
    let strength = options.strength;
    let key_len = strength.key_len();
    let salt = random_bytes(strength.salt_len());
    let derived = pbkdf2_sha1(password, &salt, PBKDF2_ITERATIONS, 2 * key_len + VERIFY_SIZE);
    let (aes_key, rest) = derived.split_at(key_len);
    let (hmac_key, verify) = rest.split_at(key_len);

    let mut payload = match options.method {
        ZipMethod::Stored => plaintext.to_vec(),
        ZipMethod::Deflate => {
            let mut enc = DeflateEncoder::new(Vec::new(), flate2::Compression::new(DEFLATE_LEVEL));
            enc.write_all(plaintext)?;
            enc.finish()?
        }
    };
    apply_aes_ctr_le(aes_key, &mut payload)?;
    let mac = hmac_sha1_80(hmac_key, &payload)?;

    let crc32 = match options.version {
        AeVersion::Ae1 => crc32fast::hash(plaintext),
        AeVersion::Ae2 => 0,
    };
    let compressed_size = to_u32(salt.len() + VERIFY_SIZE + payload.len() + HMAC_TAG_SIZE)?;
    let uncompressed_size = to_u32(plaintext.len())?;
    let (mod_time, mod_date) = dos_timestamp();
    let name = ZIP_INNER_FILENAME.as_bytes();

    let mut extra = Vec::with_capacity(AES_EXTRA_SIZE);
    put_u16(&mut extra, AES_EXTRA_ID);
    put_u16(&mut extra, AES_EXTRA_DATA_SIZE);
    put_u16(&mut extra, options.version.code());
    put_u16(&mut extra, AES_VENDOR_ID);
    extra.push(strength.code());
    put_u16(&mut extra, options.method.code());

    let mut out = Vec::with_capacity(compressed_size as usize + 200);

    // Local file header
    put_u32(&mut out, LOCAL_HEADER_SIG);
    put_u16(&mut out, VERSION_NEEDED);
    put_u16(&mut out, FLAG_ENCRYPTED);
    put_u16(&mut out, METHOD_AES);
    put_u16(&mut out, mod_time);
    put_u16(&mut out, mod_date);
    put_u32(&mut out, crc32);
    put_u32(&mut out, compressed_size);
    put_u32(&mut out, uncompressed_size);
    put_u16(&mut out, name.len() as u16);
    put_u16(&mut out, AES_EXTRA_SIZE as u16);
    out.extend_from_slice(name);
    out.extend_from_slice(&extra);

    // Encrypted content
    out.extend_from_slice(&salt);
    out.extend_from_slice(verify);
    out.extend_from_slice(&payload);
    out.extend_from_slice(&mac);

    // Central directory
    let central_offset = to_u32(out.len())?;
    put_u32(&mut out, CENTRAL_HEADER_SIG);
    put_u16(&mut out, VERSION_NEEDED); // version made by
    put_u16(&mut out, VERSION_NEEDED);
    put_u16(&mut out, FLAG_ENCRYPTED);
    put_u16(&mut out, METHOD_AES);
    put_u16(&mut out, mod_time);
    put_u16(&mut out, mod_date);
    put_u32(&mut out, crc32);
    put_u32(&mut out, compressed_size);
    put_u32(&mut out, uncompressed_size);
    put_u16(&mut out, name.len() as u16);
    put_u16(&mut out, AES_EXTRA_SIZE as u16);
    put_u16(&mut out, 0); // comment length
    put_u16(&mut out, 0); // disk number start
    put_u16(&mut out, 0); // internal attributes
    put_u32(&mut out, 0); // external attributes
    put_u32(&mut out, 0); // local header offset
    out.extend_from_slice(name);
    out.extend_from_slice(&extra);
    let central_size = to_u32(out.len())? - central_offset;

    // End of central directory
    put_u32(&mut out, END_OF_CENTRAL_DIR_SIG);
    put_u16(&mut out, 0); // this disk
    put_u16(&mut out, 0); // disk with central directory
    put_u16(&mut out, 1); // entries on this disk
    put_u16(&mut out, 1); // total entries
    put_u32(&mut out, central_size);
    put_u32(&mut out, central_offset);
    put_u16(&mut out, 0); // comment length

    Ok(out)
}

fn to_u32(n: usize) -> PtResult<u32> {
    u32::try_from(n).map_err(|_| PtError::unsupported("note too large for a ZIP32 archive"))
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Current local time as MS-DOS (time, date).
fn dos_timestamp() -> (u16, u16) {
    use chrono::{Datelike, Timelike};

    let now = chrono::Local::now();
    let year = now.year().clamp(1980, 2107) as u16;
    let time = ((now.hour() as u16) << 11) | ((now.minute() as u16) << 5) | (now.second() as u16 / 2);
    let date = ((year - 1980) << 9) | ((now.month() as u16) << 5) | now.day() as u16;
    (time, date)
}

/// Bounds-checked little-endian reader over the archive bytes.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> PtResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| PtError::unsupported("truncated ZIP archive"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> PtResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> PtResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> PtResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
