//! Extension → handler lookup.
//!
//! The registry is built once (see [`HandlerRegistry::global`]) and only read
//! afterwards. Custom registries can be built with [`HandlerRegistry::new`]
//! and [`HandlerRegistry::register`] before they are shared.

use std::path::Path;
use std::sync::OnceLock;

use pt_core::{PtError, PtResult};
use pt_crypto::NoteKey;

use crate::chi::TomboChi;
use crate::handler::NoteHandler;
use crate::raw::Raw;
use crate::zipaes::ZipAes;

/// Builds a handler bound to a key.
pub type HandlerFactory = fn(NoteKey) -> Box<dyn NoteHandler>;

/// One row of the handler listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerInfo {
    pub extension: String,
    pub name: &'static str,
    pub description: &'static str,
    pub encrypted: bool,
}

struct Entry {
    extension: String,
    factory: HandlerFactory,
    encrypted: bool,
}

#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<Entry>,
    raw_fallback: bool,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("extensions", &self.supported_extensions())
            .field("raw_fallback", &self.raw_fallback)
            .finish()
    }
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in formats.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(".txt", |_| Box::new(Raw));
        registry.register(".md", |_| Box::new(Raw));
        registry.register(".chi", |key| Box::new(TomboChi::new(key)));
        registry.register(".aes.zip", |key| Box::new(ZipAes::new(key)));
        registry.register(".aes256.zip", |key| Box::new(ZipAes::new(key)));
        registry
    }

    /// Treat unknown extensions as plain text instead of failing.
    pub fn with_raw_fallback(mut self) -> Self {
        self.raw_fallback = true;
        self
    }

    /// Process-wide registry holding the built-in formats.
    pub fn global() -> &'static HandlerRegistry {
        static GLOBAL: OnceLock<HandlerRegistry> = OnceLock::new();
        GLOBAL.get_or_init(HandlerRegistry::with_defaults)
    }

    /// Add (or replace) the factory for `extension`.
    pub fn register(&mut self, extension: &str, factory: HandlerFactory) {
        let extension = extension.to_lowercase();
        let encrypted = factory(NoteKey::default()).is_encrypted();
        match self.entries.iter_mut().find(|e| e.extension == extension) {
            Some(entry) => {
                entry.factory = factory;
                entry.encrypted = encrypted;
            }
            None => self.entries.push(Entry {
                extension,
                factory,
                encrypted,
            }),
        }
    }

    /// Canonical extension of `filename` as understood by this registry.
    pub fn extension_of(&self, filename: &str) -> Option<String> {
        let lower = base_name(filename).to_lowercase();
        let ext = canonical_extension(&lower)?;
        if ext == ".aes.zip" {
            return Some(ext);
        }
        // Longest registered multi-part extension wins over the last suffix
        self.entries
            .iter()
            .filter(|e| e.extension.matches('.').count() > 1 && lower.ends_with(&e.extension))
            .max_by_key(|e| e.extension.len())
            .map(|e| e.extension.clone())
            .or(Some(ext))
    }

    /// Build the handler for `filename`, bound to `key`.
    pub fn handler_for(&self, filename: &str, key: NoteKey) -> PtResult<Box<dyn NoteHandler>> {
        let ext = self.extension_of(filename);
        match ext.as_deref().and_then(|ext| self.find(ext)) {
            Some(entry) => Ok((entry.factory)(key)),
            None if self.raw_fallback => {
                tracing::debug!(filename, "no handler registered, reading as raw text");
                Ok(Box::new(Raw))
            }
            None => Err(PtError::unsupported(format!(
                "no handler for {filename:?} (extension {})",
                ext.as_deref().unwrap_or("none")
            ))),
        }
    }

    /// Whether `filename` has a known extension.
    pub fn is_supported(&self, filename: &str) -> bool {
        self.extension_of(filename)
            .is_some_and(|ext| self.find(&ext).is_some())
    }

    /// Whether `filename` maps to an encrypted format. Unknown extensions
    /// count as unencrypted.
    pub fn is_encrypted(&self, filename: &str) -> bool {
        self.extension_of(filename)
            .and_then(|ext| self.find(&ext))
            .is_some_and(|e| e.encrypted)
    }

    pub fn supported_extensions(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.extension.as_str()).collect()
    }

    /// Registered handlers in insertion order.
    pub fn entries(&self) -> Vec<HandlerInfo> {
        self.entries
            .iter()
            .map(|e| {
                let handler = (e.factory)(NoteKey::default());
                HandlerInfo {
                    extension: e.extension.clone(),
                    name: handler.name(),
                    description: handler.description(),
                    encrypted: e.encrypted,
                }
            })
            .collect()
    }

    fn find(&self, extension: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.extension == extension)
    }
}

/// Lowercased final extension of `filename`. Both WinZip AES suffixes
/// map to `.aes.zip`.
pub fn canonical_extension(filename: &str) -> Option<String> {
    let lower = base_name(filename).to_lowercase();
    if lower.ends_with(".aes256.zip") || lower.ends_with(".aes.zip") {
        return Some(".aes.zip".to_string());
    }
    let dot = lower.rfind('.')?;
    if dot == 0 {
        // dotfile
        return None;
    }
    Some(lower[dot..].to_string())
}

fn base_name(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename)
}
