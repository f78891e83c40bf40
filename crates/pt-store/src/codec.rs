//! Note bytes ↔ text, trying a configured list of encodings in order.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use pt_core::{PtError, PtResult};

#[derive(Debug, Clone)]
pub struct TextCodec {
    encodings: Vec<&'static Encoding>,
}

impl Default for TextCodec {
    /// UTF-8, then Windows-1252 (which accepts any byte sequence).
    fn default() -> Self {
        Self {
            encodings: vec![UTF_8, encoding_rs::WINDOWS_1252],
        }
    }
}

impl TextCodec {
    /// Build from WHATWG labels such as `utf8`, `cp1252`, `latin1`,
    /// `shift_jis`.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> PtResult<Self> {
        let encodings = labels
            .iter()
            .map(|label| {
                let label = label.as_ref();
                Encoding::for_label(label.trim().as_bytes())
                    .ok_or_else(|| PtError::Config(format!("unknown text encoding {label:?}")))
            })
            .collect::<PtResult<Vec<_>>>()?;
        if encodings.is_empty() {
            return Err(PtError::Config("no text encodings configured".into()));
        }
        Ok(Self { encodings })
    }

    pub fn encodings(&self) -> &[&'static Encoding] {
        &self.encodings
    }

    /// Encoding used for writing when none is named.
    pub fn primary(&self) -> &'static Encoding {
        self.encodings[0]
    }

    /// Decode with the first encoding that accepts `bytes` without errors.
    /// A UTF-8 byte order mark is dropped.
    pub fn decode<'b>(&self, bytes: &'b [u8]) -> PtResult<Cow<'b, str>> {
        for encoding in &self.encodings {
            let input = if *encoding == UTF_8 {
                bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
            } else {
                bytes
            };
            if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(input)
            {
                return Ok(text);
            }
            tracing::trace!(encoding = encoding.name(), "decode attempt failed");
        }
        Err(PtError::Decode(format!(
            "bytes are not valid in any of: {}",
            self.names().join(", ")
        )))
    }

    /// Encode `text` with `encoding` (by label) or the primary encoding.
    pub fn encode<'t>(&self, text: &'t str, encoding: Option<&str>) -> PtResult<Cow<'t, [u8]>> {
        let encoding = match encoding {
            Some(label) => Encoding::for_label(label.as_bytes())
                .ok_or_else(|| PtError::Config(format!("unknown text encoding {label:?}")))?,
            None => self.primary(),
        };
        let (bytes, _, had_errors) = encoding.encode(text);
        if had_errors {
            return Err(PtError::Decode(format!(
                "text cannot be represented in {}",
                encoding.name()
            )));
        }
        Ok(bytes)
    }

    fn names(&self) -> Vec<&'static str> {
        self.encodings.iter().map(|e| e.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_falls_back_to_cp1252() {
        let codec = TextCodec::default();
        assert_eq!(codec.decode(b"caf\xc3\xa9").unwrap(), "café");
        assert_eq!(codec.decode(b"caf\xe9").unwrap(), "café");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let codec = TextCodec::default();
        assert_eq!(codec.decode(b"\xEF\xBB\xBFhi").unwrap(), "hi");
    }

    #[test]
    fn test_utf8_only_rejects_invalid() {
        let codec = TextCodec::from_labels(&["utf8"]).unwrap();
        assert!(matches!(codec.decode(b"\xff\xfe\xfd"), Err(PtError::Decode(_))));
    }

    #[test]
    fn test_from_labels() {
        let codec = TextCodec::from_labels(&["utf-8", "latin1"]).unwrap();
        assert_eq!(codec.encodings().len(), 2);
        assert!(matches!(
            TextCodec::from_labels(&["klingon"]),
            Err(PtError::Config(_))
        ));
        assert!(TextCodec::from_labels::<&str>(&[]).is_err());
    }

    #[test]
    fn test_encode() {
        let codec = TextCodec::default();
        assert_eq!(&*codec.encode("café", None).unwrap(), b"caf\xc3\xa9");
        assert_eq!(&*codec.encode("café", Some("cp1252")).unwrap(), b"caf\xe9");
        assert!(matches!(
            codec.encode("日本", Some("cp1252")),
            Err(PtError::Decode(_))
        ));
    }
}
