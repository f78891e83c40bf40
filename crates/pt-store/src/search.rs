//! Literal or regex search across a note tree, decrypting on demand.

use std::path::{Path, PathBuf};

use pt_core::{IncludeEncrypted, PtError, PtResult};
use pt_crypto::NoteKey;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::NoteStore;

/// Lines scanned between cancellation checks within one file.
const CANCEL_CHECK_LINES: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Treat the term as a regular expression instead of a literal
    pub regex: bool,
    pub ignore_case: bool,
    pub include_encrypted: IncludeEncrypted,
    /// Match against file names only, never opening the files
    pub filename_only: bool,
    /// Stop at the first matching line of each file and report no lines
    pub files_with_matches: bool,
    /// Start/stop markers wrapped around each match in reported lines
    pub highlight: Option<(String, String)>,
    /// Restrict the search to this subdirectory of the root
    pub subdir: Option<PathBuf>,
}

/// A file with matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Relative to the store root
    pub path: PathBuf,
    /// `(line number starting at 1, line text)`; empty in filename-only and
    /// files-with-matches modes
    pub lines: Vec<(usize, String)>,
}

/// Supplies keys for encrypted notes during a search.
///
/// Any `FnMut(&Path) -> Option<NoteKey>` closure is a provider. Front-ends
/// that cache or re-prompt implement [`PasswordProvider::rejected`] as well.
pub trait PasswordProvider {
    /// Key for `path`, or `None` to skip the file.
    fn password_for(&mut self, path: &Path) -> Option<NoteKey>;

    /// The key returned for `path` turned out to be wrong.
    fn rejected(&mut self, _path: &Path) {}
}

impl<F> PasswordProvider for F
where
    F: FnMut(&Path) -> Option<NoteKey>,
{
    fn password_for(&mut self, path: &Path) -> Option<NoteKey> {
        self(path)
    }
}

impl NoteStore {
    /// Search notes for `term`, yielding one [`SearchHit`] per matching file
    /// in traversal order.
    ///
    /// Files that cannot be read because of a wrong password, an unknown
    /// format or undecodable text are logged and skipped. Filesystem errors
    /// are yielded and the search carries on if the caller keeps iterating.
    /// Once `cancel` fires the next item is [`PtError::SearchCancelled`] and
    /// the search ends.
    pub fn search<'s, P>(
        &'s self,
        term: &str,
        options: SearchOptions,
        provider: P,
        cancel: CancellationToken,
    ) -> PtResult<Search<'s>>
    where
        P: PasswordProvider + 's,
    {
        let pattern = if options.regex {
            term.to_string()
        } else {
            regex::escape(term)
        };
        let matcher = RegexBuilder::new(&pattern)
            .case_insensitive(options.ignore_case)
            .build()
            .map_err(|e| PtError::Pattern(e.to_string()))?;

        let files = self.recurse_notes(options.subdir.as_deref())?;
        debug!(term, regex = options.regex, "starting search");
        Ok(Search {
            store: self,
            files: Box::new(files),
            matcher,
            options,
            provider: Box::new(provider),
            cancel,
            finished: false,
        })
    }
}

/// Lazy search results; see [`NoteStore::search`].
pub struct Search<'s> {
    store: &'s NoteStore,
    files: Box<dyn Iterator<Item = PtResult<PathBuf>> + 's>,
    matcher: Regex,
    options: SearchOptions,
    provider: Box<dyn PasswordProvider + 's>,
    cancel: CancellationToken,
    finished: bool,
}

impl Search<'_> {
    fn scan(&mut self, relpath: &Path) -> PtResult<Option<SearchHit>> {
        let name = relpath
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        if self.options.filename_only {
            return Ok(self.matcher.is_match(name).then(|| SearchHit {
                path: relpath.to_path_buf(),
                lines: Vec::new(),
            }));
        }

        let encrypted = self.store.registry().is_encrypted(name);
        if !self.options.include_encrypted.admits(encrypted) {
            return Ok(None);
        }

        let key = if encrypted {
            match self.provider.password_for(relpath) {
                Some(key) => key,
                None => {
                    debug!(path = %relpath.display(), "no password, skipping");
                    return Ok(None);
                }
            }
        } else {
            NoteKey::default()
        };

        let text = self.store.note_text(relpath, &key)?;
        let mut lines = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if idx > 0 && idx % CANCEL_CHECK_LINES == 0 && self.cancel.is_cancelled() {
                return Err(PtError::SearchCancelled);
            }
            if !self.matcher.is_match(line) {
                continue;
            }
            if self.options.files_with_matches {
                return Ok(Some(SearchHit {
                    path: relpath.to_path_buf(),
                    lines: Vec::new(),
                }));
            }
            lines.push((idx + 1, self.highlight(line)));
        }

        Ok((!lines.is_empty()).then(|| SearchHit {
            path: relpath.to_path_buf(),
            lines,
        }))
    }

    fn highlight(&self, line: &str) -> String {
        let Some((start, stop)) = &self.options.highlight else {
            return line.to_string();
        };
        let mut out = String::with_capacity(line.len());
        let mut last = 0;
        for m in self.matcher.find_iter(line).filter(|m| !m.is_empty()) {
            out.push_str(&line[last..m.start()]);
            out.push_str(start);
            out.push_str(m.as_str());
            out.push_str(stop);
            last = m.end();
        }
        out.push_str(&line[last..]);
        out
    }
}

impl Iterator for Search<'_> {
    type Item = PtResult<SearchHit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.finished = true;
                return Some(Err(PtError::SearchCancelled));
            }
            let relpath = match self.files.next()? {
                Ok(relpath) => relpath,
                Err(e) => return Some(Err(e)),
            };

            match self.scan(&relpath) {
                Ok(Some(hit)) => return Some(Ok(hit)),
                Ok(None) => {}
                Err(PtError::BadPassword) => {
                    warn!(path = %relpath.display(), "wrong password, skipping");
                    self.provider.rejected(&relpath);
                }
                Err(e @ (PtError::UnsupportedFile(_) | PtError::Decode(_))) => {
                    warn!(path = %relpath.display(), error = %e, "unreadable note, skipping");
                }
                Err(PtError::SearchCancelled) => {
                    self.finished = true;
                    return Some(Err(PtError::SearchCancelled));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_provider() {
        let mut provider = |p: &Path| (p == Path::new("x.chi")).then(NoteKey::default);
        assert!(provider.password_for(Path::new("x.chi")).is_some());
        assert!(provider.password_for(Path::new("y.chi")).is_none());
    }

    #[test]
    fn test_rejection_is_optional() {
        let mut provider = |_: &Path| Some(NoteKey::from_password("pw"));
        provider.rejected(Path::new("a.chi"));
        assert!(provider.password_for(Path::new("a.chi")).is_some());
    }
}
