use std::path::PathBuf;

use thiserror::Error;

pub type PtResult<T> = Result<T, PtError>;

#[derive(Debug, Error)]
pub enum PtError {
    /// Password verified as wrong (ZipAES verify bytes, Tombo MD5 check).
    #[error("bad password or key")]
    BadPassword,

    #[error("unsupported file: {0}")]
    UnsupportedFile(String),

    #[error("path escapes note root: {}", .0.display())]
    PathEscape(PathBuf),

    #[error("search cancelled")]
    SearchCancelled,

    #[error("text decoding failed: {0}")]
    Decode(String),

    #[error("invalid search pattern: {0}")]
    Pattern(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PtError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        PtError::UnsupportedFile(msg.into())
    }

    /// Only a wrong password is worth retrying (e.g. re-prompting the user).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PtError::BadPassword)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PtError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_password_is_recoverable() {
        assert!(PtError::BadPassword.is_recoverable());
        assert!(!PtError::unsupported("bad HMAC").is_recoverable());
        assert!(!PtError::SearchCancelled.is_recoverable());
    }

    #[test]
    fn test_io_not_found() {
        let err: PtError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_not_found());
        assert!(!PtError::BadPassword.is_not_found());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            PtError::unsupported("bad HMAC").to_string(),
            "unsupported file: bad HMAC"
        );
        assert_eq!(
            PtError::PathEscape(PathBuf::from("../etc/passwd")).to_string(),
            "path escapes note root: ../etc/passwd"
        );
    }
}
