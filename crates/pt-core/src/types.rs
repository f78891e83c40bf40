use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which files a search looks at, by whether their format is encrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeEncrypted {
    /// Plain notes only
    #[default]
    No,
    /// Plain and encrypted notes
    Yes,
    /// Encrypted notes only
    Only,
}

impl IncludeEncrypted {
    /// Whether a file with the given encryption status passes this filter.
    pub fn admits(self, encrypted: bool) -> bool {
        match self {
            IncludeEncrypted::No => !encrypted,
            IncludeEncrypted::Yes => true,
            IncludeEncrypted::Only => encrypted,
        }
    }
}

impl FromStr for IncludeEncrypted {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "no" | "false" => Ok(IncludeEncrypted::No),
            "yes" | "true" => Ok(IncludeEncrypted::Yes),
            "only" => Ok(IncludeEncrypted::Only),
            other => Err(format!("expected no, yes or only, got {other:?}")),
        }
    }
}
