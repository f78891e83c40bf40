//! pt-merge: line-based diff and three-way merge for note text
//!
//! Inputs are raw bytes split into lines that keep their terminators, so
//! LF and CRLF notes survive a diff/merge cycle unchanged.
//!
//! - [`myers`]: classic O(ND) shortest edit script
//! - [`histogram`]: git-style histogram diff, falling back to Myers when a
//!   region is dominated by repeated lines
//! - [`merge3`]: diff3-style merge with conflict markers

pub mod diff;
pub mod histogram;
pub mod merge3;
pub mod myers;

pub use diff::{apply_edits, diff, diff_lines, split_lines, tagged_lines, DiffKind, Edit};
pub use histogram::{common_base, histogram, NotSuitable};
pub use merge3::{merge3, Conflict, MergeResult, MergeStrategy};
pub use myers::myers;
