//! Keep resolved paths inside the note root.

use std::path::{Component, Path, PathBuf};

use pt_core::{PtError, PtResult};

/// Resolve `relpath` against `root` (already canonical) and make sure the
/// result stays under it.
///
/// The target does not have to exist: the deepest existing ancestor is
/// canonicalized (resolving symlinks) and the remaining components are
/// appended. `..` is applied lexically first, so it can never climb out
/// through a missing directory.
pub fn resolve(root: &Path, relpath: &Path) -> PtResult<PathBuf> {
    let joined = normalize(&root.join(relpath));
    let resolved = canonicalize_existing(&joined)?;
    if resolved.starts_with(root) {
        Ok(resolved)
    } else {
        tracing::warn!(
            root = %root.display(),
            path = %relpath.display(),
            resolved = %resolved.display(),
            "rejected path outside note root"
        );
        Err(PtError::PathEscape(relpath.to_path_buf()))
    }
}

/// Lexical normalization: drop `.`, apply `..`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn canonicalize_existing(path: &Path) -> PtResult<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(canonical) => {
                let mut out = canonical;
                out.extend(missing.iter().rev());
                return Ok(out);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Err(e.into());
                };
                missing.push(name);
                existing = parent;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        std::fs::create_dir(canonical.join("sub")).unwrap();
        std::fs::write(canonical.join("sub/note.txt"), "x").unwrap();
        (dir, canonical)
    }

    #[test]
    fn test_existing_and_missing_paths() {
        let (_dir, root) = root();
        assert_eq!(
            resolve(&root, Path::new("sub/note.txt")).unwrap(),
            root.join("sub/note.txt")
        );
        assert_eq!(
            resolve(&root, Path::new("sub/new/deeper.txt")).unwrap(),
            root.join("sub/new/deeper.txt")
        );
        assert_eq!(resolve(&root, Path::new("")).unwrap(), root);
        assert_eq!(resolve(&root, Path::new("./sub/../sub")).unwrap(), root.join("sub"));
    }

    #[test]
    fn test_parent_escape_rejected() {
        let (_dir, root) = root();
        for p in ["..", "../x.txt", "sub/../../x.txt", "missing/../../x"] {
            assert!(
                matches!(resolve(&root, Path::new(p)), Err(PtError::PathEscape(_))),
                "{p}"
            );
        }
    }

    #[test]
    fn test_absolute_outside_rejected() {
        let (_dir, root) = root();
        assert!(matches!(
            resolve(&root, Path::new("/etc/passwd")),
            Err(PtError::PathEscape(_))
        ));
        // Absolute paths inside the root are fine
        assert!(resolve(&root, &root.join("sub")).is_ok());
    }

    #[test]
    fn test_prefix_is_checked_per_component() {
        let parent = tempfile::tempdir().unwrap();
        let base = parent.path().canonicalize().unwrap();
        let root = base.join("notes");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(base.join("notes-other")).unwrap();
        assert!(matches!(
            resolve(&root, Path::new("../notes-other/x.txt")),
            Err(PtError::PathEscape(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (_dir, root) = root();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();
        assert!(matches!(
            resolve(&root, Path::new("link/secret.txt")),
            Err(PtError::PathEscape(_))
        ));
    }
}
