use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pt_core::{PtError, PtResult};
use pt_crypto::NoteKey;
use pt_formats::{HandlerRegistry, NoteHandler};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::codec::TextCodec;
use crate::filename::{default_filename, unique_path};
use crate::sandbox;

/// One level of a directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirContents {
    /// Subdirectory names, sorted
    pub dirs: Vec<String>,
    /// Note filenames (recognised extensions only), sorted
    pub notes: Vec<String>,
}

/// How [`NoteStore::note_contents_save`] writes a note.
pub struct SaveOptions<'a> {
    /// Encoding label for the text; the store's primary encoding if unset
    pub encoding: Option<&'a str>,
    /// Keep the previous version of an existing target as `<name>.bak`
    pub backup: bool,
    /// Builds a file stem from the text when no path is given
    pub filename_generator: &'a dyn Fn(&str) -> String,
}

impl Default for SaveOptions<'_> {
    fn default() -> Self {
        Self {
            encoding: None,
            backup: true,
            filename_generator: &default_filename,
        }
    }
}

/// A directory tree of notes.
#[derive(Debug, Clone)]
pub struct NoteStore {
    root: PathBuf,
    codec: TextCodec,
    registry: Arc<HandlerRegistry>,
}

impl NoteStore {
    /// Open the tree at `root`, which must be an existing directory.
    pub fn open(root: impl AsRef<Path>) -> PtResult<Self> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(PtError::Config(format!(
                "note root is not a directory: {}",
                root.display()
            )));
        }
        debug!(root = %root.display(), "opened note store");
        Ok(Self {
            root,
            codec: TextCodec::default(),
            registry: Arc::new(HandlerRegistry::with_defaults()),
        })
    }

    pub fn with_codec(mut self, codec: TextCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn codec(&self) -> &TextCodec {
        &self.codec
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Absolute path of `relpath`, rejected if it leaves the root.
    pub fn abspath(&self, relpath: impl AsRef<Path>) -> PtResult<PathBuf> {
        sandbox::resolve(&self.root, relpath.as_ref())
    }

    fn relative(&self, abs: &Path) -> PathBuf {
        abs.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| abs.to_path_buf())
    }

    /// Whether a filename is one the store treats as a note.
    pub fn is_note(&self, filename: &str) -> bool {
        !is_hidden(filename) && self.registry.is_supported(filename)
    }

    /// Plaintext bytes of a note.
    pub fn note_contents(&self, relpath: impl AsRef<Path>, key: &NoteKey) -> PtResult<Vec<u8>> {
        let relpath = relpath.as_ref();
        let path = self.abspath(relpath)?;
        let handler = self.registry.handler_for(&file_name(&path)?, key.clone())?;
        let mut reader = BufReader::new(File::open(&path)?);
        let plain = handler.read_from(&mut reader)?;
        debug!(
            path = %relpath.display(),
            handler = handler.name(),
            bytes = plain.len(),
            "read note"
        );
        Ok(plain)
    }

    /// Note decoded to text through the store's encodings.
    pub fn note_text(&self, relpath: impl AsRef<Path>, key: &NoteKey) -> PtResult<String> {
        let bytes = self.note_contents(relpath, key)?;
        Ok(self.codec.decode(&bytes)?.into_owned())
    }

    /// Encode `text`, write it through `handler` and atomically replace the
    /// target. Returns the path written, relative to the root.
    ///
    /// Without `relpath`, a new name is generated from the text in the root
    /// directory using the handler's default extension.
    pub fn note_contents_save(
        &self,
        text: &str,
        relpath: Option<&Path>,
        handler: &dyn NoteHandler,
        options: &SaveOptions<'_>,
    ) -> PtResult<PathBuf> {
        let target = match relpath {
            Some(relpath) => self.abspath(relpath)?,
            None => {
                let stem = (options.filename_generator)(text);
                let path = unique_path(&self.root, &stem, handler.default_extension());
                // The generator's output is untrusted too
                self.abspath(self.relative(&path))?
            }
        };
        if target == self.root {
            return Err(PtError::PathEscape(relpath.unwrap_or(Path::new("")).to_path_buf()));
        }

        let bytes = self.codec.encode(text, options.encoding)?;
        write_atomic(&target, handler, &bytes, options.backup)?;

        let rel = self.relative(&target);
        info!(path = %rel.display(), handler = handler.name(), "saved note");
        Ok(rel)
    }

    /// Subdirectories and notes directly under `relpath` (the root if `None`).
    pub fn directory_contents(&self, relpath: Option<&Path>) -> PtResult<DirContents> {
        let dir = self.abspath(relpath.unwrap_or(Path::new("")))?;
        let mut contents = DirContents::default();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if is_hidden(&name) {
                continue;
            }
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                contents.dirs.push(name);
            } else if self.is_note(&name) {
                contents.notes.push(name);
            }
        }
        contents.dirs.sort();
        contents.notes.sort();
        Ok(contents)
    }

    /// Notes under `subdir` (the root if `None`), depth-first, as paths
    /// relative to the root. Order is by filename within each directory.
    pub fn recurse_notes(
        &self,
        subdir: Option<&Path>,
    ) -> PtResult<impl Iterator<Item = PtResult<PathBuf>> + '_> {
        let start = self.abspath(subdir.unwrap_or(Path::new("")))?;
        let walker = WalkDir::new(start)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_str().map_or(true, is_hidden));

        Ok(walker.filter_map(move |entry| match entry {
            Ok(entry) => {
                let name = entry.file_name().to_str()?;
                (entry.file_type().is_file() && self.is_note(name))
                    .then(|| Ok(self.relative(entry.path())))
            }
            Err(e) => Some(Err(PtError::Io(e.into()))),
        }))
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn file_name(path: &Path) -> PtResult<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| PtError::unsupported(format!("not a note path: {}", path.display())))
}

/// Write to a temp file next to `target`, fsync, optionally link the old
/// file to `<name>.bak`, then rename over `target`. The temp file is removed
/// if anything fails before the rename, and `target` is never missing.
fn write_atomic(
    target: &Path,
    handler: &dyn NoteHandler,
    plaintext: &[u8],
    backup: bool,
) -> PtResult<()> {
    let dir = target
        .parent()
        .ok_or_else(|| PtError::unsupported(format!("no parent directory: {}", target.display())))?;
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".pt-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    handler.write_to(&mut tmp, plaintext)?;
    tmp.as_file().sync_all()?;

    if backup && target.is_file() {
        let bak = keep_backup(target)?;
        debug!(backup = %bak.display(), "kept previous version");
    }

    tmp.persist(target).map_err(|e| PtError::Io(e.error))?;

    #[cfg(unix)]
    if let Err(e) = File::open(dir).and_then(|parent| parent.sync_all()) {
        debug!(dir = %dir.display(), error = %e, "directory fsync failed");
    }
    Ok(())
}

/// Link (or copy) `target` to `target.bak`, replacing any older backup.
/// `target` itself stays in place until the new version is renamed over it.
fn keep_backup(target: &Path) -> PtResult<PathBuf> {
    let mut name = target.as_os_str().to_owned();
    name.push(".bak");
    let bak = PathBuf::from(name);
    if bak.exists() {
        std::fs::remove_file(&bak)?;
    }
    if let Err(e) = std::fs::hard_link(target, &bak) {
        debug!(error = %e, "hard link failed, copying backup");
        std::fs::copy(target, &bak)?;
    }
    Ok(bak)
}
