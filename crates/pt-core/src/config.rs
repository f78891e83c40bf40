use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PtError, PtResult};

/// Default config location, relative to `$HOME`
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/ptnotes/config.toml";

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PtConfig {
    /// Root directory of the note tree
    pub note_root: Option<PathBuf>,
    /// Text encodings to try, in order, when decoding note bytes
    pub codec: Vec<String>,
    /// Extension used when saving a new encrypted note
    pub default_encryption_ext: String,
    /// Extension used when saving a new plain note
    pub default_text_ext: String,
    /// Keep a `.bak` of the previous version when overwriting a note
    pub backup: bool,
    pub log: LogConfig,
    pub merge: MergeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Diff engine: "histogram", "myers" or "ndiff"
    pub diff: String,
    /// Conflict strategy: "default", "ours", "theirs" (or ort-/resolve- forms)
    pub strategy: String,
}

impl Default for PtConfig {
    fn default() -> Self {
        Self {
            note_root: None,
            codec: vec!["utf8".into(), "cp1252".into()],
            default_encryption_ext: ".aes.zip".into(),
            default_text_ext: ".txt".into(),
            backup: true,
            log: LogConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            diff: "histogram".into(),
            strategy: "default".into(),
        }
    }
}

impl PtConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> PtResult<Self> {
        let path = expand_tilde(path);
        if !path.exists() {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
            .map_err(|e| PtError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> PtResult<Self> {
        toml::from_str(content).map_err(|e| PtError::Config(e.to_string()))
    }

    /// The note root with `~` expanded, if configured.
    pub fn note_root(&self) -> Option<PathBuf> {
        self.note_root.as_deref().map(expand_tilde)
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s == "~" || s.starts_with("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(format!("{}{}", home, &s[1..]))
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
note_root = "/home/user/notes"
codec = ["utf8", "latin1"]
default_encryption_ext = ".chi"
default_text_ext = ".md"
backup = false

[log]
level = "debug"
format = "json"

[merge]
diff = "myers"
strategy = "ort-ours"
"#;
        let config = PtConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.note_root, Some(PathBuf::from("/home/user/notes")));
        assert_eq!(config.codec, vec!["utf8", "latin1"]);
        assert_eq!(config.default_encryption_ext, ".chi");
        assert_eq!(config.default_text_ext, ".md");
        assert!(!config.backup);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
        assert_eq!(config.merge.diff, "myers");
        assert_eq!(config.merge.strategy, "ort-ours");
    }

    #[test]
    fn test_parse_defaults() {
        let config = PtConfig::from_toml("").unwrap();

        assert!(config.note_root.is_none());
        assert_eq!(config.codec, vec!["utf8", "cp1252"]);
        assert_eq!(config.default_encryption_ext, ".aes.zip");
        assert_eq!(config.default_text_ext, ".txt");
        assert!(config.backup);
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.merge.diff, "histogram");
    }

    #[test]
    fn test_parse_partial_config() {
        let config = PtConfig::from_toml("[merge]\nstrategy = \"theirs\"\n").unwrap();

        // Overridden
        assert_eq!(config.merge.strategy, "theirs");
        // Defaults
        assert_eq!(config.merge.diff, "histogram");
        assert_eq!(config.default_text_ext, ".txt");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = PtConfig::from_toml("backup = \"sometimes\"").unwrap_err();
        assert!(matches!(err, PtError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PtConfig::load(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.default_text_ext, ".txt");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "note_root = \"/srv/notes\"\n").unwrap();

        let config = PtConfig::load(&path).unwrap();
        assert_eq!(config.note_root(), Some(PathBuf::from("/srv/notes")));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = PtConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = PtConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.codec, parsed.codec);
        assert_eq!(config.default_encryption_ext, parsed.default_encryption_ext);
        assert_eq!(config.merge.diff, parsed.merge.diff);
    }

    #[test]
    fn test_expand_tilde() {
        let home = std::env::var("HOME").unwrap_or_default();
        assert_eq!(
            expand_tilde(Path::new("~/notes")),
            PathBuf::from(format!("{home}/notes"))
        );
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
        assert_eq!(expand_tilde(Path::new("rel/~x")), PathBuf::from("rel/~x"));
    }
}
