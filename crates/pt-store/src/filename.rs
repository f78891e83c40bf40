use std::path::{Path, PathBuf};

/// Longest generated file stem, in characters.
pub const MAX_STEM_CHARS: usize = 64;

const FALLBACK_STEM: &str = "untitled";

/// File stem derived from the first non-blank line of `text`.
///
/// Characters that are awkward in filenames become `_`, runs of whitespace
/// collapse to one space, and the result is capped at [`MAX_STEM_CHARS`].
pub fn default_filename(text: &str) -> String {
    let first = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");

    let mut stem = String::with_capacity(first.len().min(MAX_STEM_CHARS));
    let mut last_space = false;
    for c in first.chars() {
        if stem.chars().count() == MAX_STEM_CHARS {
            break;
        }
        if c.is_whitespace() {
            if !last_space && !stem.is_empty() {
                stem.push(' ');
            }
            last_space = true;
            continue;
        }
        last_space = false;
        if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ',' | '(' | ')' | '\'') {
            stem.push(c);
        } else {
            stem.push('_');
        }
    }

    let stem = stem.trim().trim_start_matches('.');
    if stem.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem.to_string()
    }
}

/// First of `stem+ext`, `stem_1+ext`, `stem_2+ext`, ... that does not exist
/// in `dir`.
pub fn unique_path(dir: &Path, stem: &str, ext: &str) -> PathBuf {
    let candidate = dir.join(format!("{stem}{ext}"));
    if !candidate.exists() {
        return candidate;
    }
    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_blank_line() {
        assert_eq!(default_filename("\n  \n  Shopping list \nmilk\n"), "Shopping list");
    }

    #[test]
    fn test_sanitizes() {
        assert_eq!(default_filename("a/b\\c: d?*"), "a_b_c_ d__");
        assert_eq!(default_filename("tabs\t\tand   spaces"), "tabs and spaces");
        assert_eq!(default_filename("...hidden"), "hidden");
        assert_eq!(default_filename("Café ünïcode"), "Café ünïcode");
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(default_filename(""), "untitled");
        assert_eq!(default_filename(" \n\t\n"), "untitled");
        assert_eq!(default_filename("..."), "untitled");
    }

    #[test]
    fn test_capped_length() {
        let long = "x".repeat(200);
        assert_eq!(default_filename(&long).chars().count(), MAX_STEM_CHARS);
    }

    #[test]
    fn test_unique_path() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_path(dir.path(), "note", ".txt");
        assert_eq!(first, dir.path().join("note.txt"));
        std::fs::write(&first, "").unwrap();

        let second = unique_path(dir.path(), "note", ".txt");
        assert_eq!(second, dir.path().join("note_1.txt"));
        std::fs::write(&second, "").unwrap();

        assert_eq!(
            unique_path(dir.path(), "note", ".txt"),
            dir.path().join("note_2.txt")
        );
    }
}
