use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use pt_core::{PtError, PtResult};
use serde::{Deserialize, Serialize};

use crate::histogram::{histogram, NotSuitable};
use crate::myers::myers;

pub const KEEP_TAG: &[u8; 2] = b"  ";
pub const DELETE_TAG: &[u8; 2] = b"- ";
pub const INSERT_TAG: &[u8; 2] = b"+ ";

/// One step of an edit script. Indices are line numbers (0-based) into the
/// `a` (old) and `b` (new) line sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Keep { a: usize, b: usize },
    Delete { a: usize },
    Insert { b: usize },
}

/// Which engine produces the edit script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    Myers,
    /// Served by the Myers engine
    Ndiff,
    #[default]
    Histogram,
}

impl FromStr for DiffKind {
    type Err = PtError;

    fn from_str(s: &str) -> PtResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "myers" => Ok(DiffKind::Myers),
            "ndiff" => Ok(DiffKind::Ndiff),
            "histogram" => Ok(DiffKind::Histogram),
            other => Err(PtError::Config(format!(
                "unknown diff type {other:?} (expected myers, ndiff or histogram)"
            ))),
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiffKind::Myers => "myers",
            DiffKind::Ndiff => "ndiff",
            DiffKind::Histogram => "histogram",
        })
    }
}

/// Split on `\n`, keeping terminators. A final line without a newline is
/// kept as-is; empty input has no lines.
pub fn split_lines(text: &[u8]) -> Vec<&[u8]> {
    text.split_inclusive(|&b| b == b'\n').collect()
}

/// Edit script turning `a` into `b` using the chosen engine.
pub fn diff_lines<T: Hash + Eq>(kind: DiffKind, a: &[T], b: &[T]) -> Vec<Edit> {
    match kind {
        DiffKind::Histogram => match histogram(a, b) {
            Ok(edits) => edits,
            Err(NotSuitable) => {
                tracing::debug!(
                    a_lines = a.len(),
                    b_lines = b.len(),
                    "histogram diff not suitable, falling back to myers"
                );
                myers(a, b)
            }
        },
        DiffKind::Myers | DiffKind::Ndiff => myers(a, b),
    }
}

/// Render an edit script as tagged lines (`"  "`, `"- "`, `"+ "` prefix
/// followed by the original line bytes).
pub fn tagged_lines(a: &[&[u8]], b: &[&[u8]], edits: &[Edit]) -> Vec<Vec<u8>> {
    edits
        .iter()
        .map(|edit| {
            let (tag, line) = match *edit {
                Edit::Keep { a: i, .. } => (KEEP_TAG, a[i]),
                Edit::Delete { a: i } => (DELETE_TAG, a[i]),
                Edit::Insert { b: j } => (INSERT_TAG, b[j]),
            };
            let mut out = Vec::with_capacity(2 + line.len());
            out.extend_from_slice(tag);
            out.extend_from_slice(line);
            out
        })
        .collect()
}

/// Tagged line diff of two texts.
pub fn diff(kind: DiffKind, a: &[u8], b: &[u8]) -> Vec<Vec<u8>> {
    let a = split_lines(a);
    let b = split_lines(b);
    let edits = diff_lines(kind, &a, &b);
    tagged_lines(&a, &b, &edits)
}

/// Apply tagged lines to `a`, returning the new text.
///
/// Kept and deleted lines must match `a` in order; every line of `a` must
/// be consumed.
pub fn apply_edits(a: &[u8], tagged: &[Vec<u8>]) -> PtResult<Vec<u8>> {
    let old = split_lines(a);
    let mut pos = 0;
    let mut out = Vec::with_capacity(a.len());

    for (n, line) in tagged.iter().enumerate() {
        if line.len() < 2 {
            return Err(anyhow::anyhow!("tagged line {n} has no tag").into());
        }
        let (tag, body) = line.split_at(2);
        match tag {
            t if t == INSERT_TAG => out.extend_from_slice(body),
            t if t == KEEP_TAG || t == DELETE_TAG => {
                if old.get(pos) != Some(&body) {
                    return Err(anyhow::anyhow!(
                        "tagged line {n} does not match line {pos} of the original"
                    )
                    .into());
                }
                pos += 1;
                if t == KEEP_TAG {
                    out.extend_from_slice(body);
                }
            }
            _ => return Err(anyhow::anyhow!("tagged line {n} has unknown tag {tag:?}").into()),
        }
    }

    if pos != old.len() {
        return Err(anyhow::anyhow!(
            "edit script stops at line {pos} of {} in the original",
            old.len()
        )
        .into());
    }
    Ok(out)
}
