//! Three-way merge in the style of diff3.
//!
//! Both sides are diffed against the base. The merge walks the three
//! texts in lockstep, cutting them into chunks that are either stable
//! (all sides agree) or unstable (at least one side changed), and resolves
//! each unstable chunk on its own.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use pt_core::{PtError, PtResult};
use serde::{Deserialize, Serialize};

use crate::diff::{diff_lines, split_lines, DiffKind, Edit};
use crate::histogram::common_base;

pub const CONFLICT_START: &[u8] = b"<<<<<<< this_file\n";
/// Note the trailing space, kept for compatibility with existing merge output.
pub const CONFLICT_SEPARATOR: &[u8] = b"======= \n";
pub const CONFLICT_END: &[u8] = b">>>>>>> other_file\n";

/// How to resolve a chunk both sides changed differently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Emit conflict markers and record the conflict
    #[default]
    Default,
    /// Take this side
    Ours,
    /// Take the other side
    Theirs,
}

impl FromStr for MergeStrategy {
    type Err = PtError;

    /// Accepts `default`, `ours`, `theirs` and the `ort-*` / `resolve-*`
    /// spellings, where only the suffix matters.
    fn from_str(s: &str) -> PtResult<Self> {
        let lower = s.to_ascii_lowercase();
        let suffix = ["ort", "resolve"]
            .iter()
            .find_map(|prefix| lower.strip_prefix(prefix))
            .map(|rest| rest.strip_prefix('-').unwrap_or(rest))
            .unwrap_or(&lower);
        match suffix {
            "" | "default" => Ok(MergeStrategy::Default),
            "ours" => Ok(MergeStrategy::Ours),
            "theirs" => Ok(MergeStrategy::Theirs),
            _ => Err(PtError::Config(format!(
                "unknown merge strategy {s:?} (expected default, ours or theirs)"
            ))),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MergeStrategy::Default => "default",
            MergeStrategy::Ours => "ours",
            MergeStrategy::Theirs => "theirs",
        })
    }
}

/// Line ranges (0-based, half-open) of one unresolved chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub base: Range<usize>,
    pub this: Range<usize>,
    pub other: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub merged: Vec<u8>,
    pub conflicts: Vec<Conflict>,
}

impl MergeResult {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Merge `this` and `other`, both derived from `base`.
///
/// Without a base, the common lines of `this` and `other` stand in for it.
pub fn merge3(
    this: &[u8],
    other: &[u8],
    base: Option<&[u8]>,
    kind: DiffKind,
    strategy: MergeStrategy,
) -> MergeResult {
    let synthesized;
    let base = match base {
        Some(base) => base,
        None => {
            synthesized = common_base(this, other);
            tracing::debug!(bytes = synthesized.len(), "synthesized merge base");
            &synthesized
        }
    };

    let o = split_lines(base);
    let a = split_lines(this);
    let b = split_lines(other);

    let merger = Merger {
        a_matches: matching_lines(&diff_lines(kind, &o, &a), o.len()),
        b_matches: matching_lines(&diff_lines(kind, &o, &b), o.len()),
        o,
        a,
        b,
        strategy,
        on: 0,
        an: 0,
        bn: 0,
        merged: Vec::with_capacity(this.len().max(other.len())),
        conflicts: Vec::new(),
    };
    let result = merger.run();
    tracing::debug!(
        diff = %kind,
        strategy = %strategy,
        conflicts = result.conflicts.len(),
        "three-way merge finished"
    );
    result
}

/// `matches[i] = Some(j)` when base line `i` is kept as line `j`.
fn matching_lines(edits: &[Edit], base_len: usize) -> Vec<Option<usize>> {
    let mut matches = vec![None; base_len];
    for edit in edits {
        if let Edit::Keep { a, b } = *edit {
            matches[a] = Some(b);
        }
    }
    matches
}

struct Merger<'a> {
    o: Vec<&'a [u8]>,
    a: Vec<&'a [u8]>,
    b: Vec<&'a [u8]>,
    a_matches: Vec<Option<usize>>,
    b_matches: Vec<Option<usize>>,
    strategy: MergeStrategy,
    on: usize,
    an: usize,
    bn: usize,
    merged: Vec<u8>,
    conflicts: Vec<Conflict>,
}

impl<'a> Merger<'a> {
    fn run(mut self) -> MergeResult {
        loop {
            match self.next_mismatch() {
                None => {
                    self.emit_rest();
                    break;
                }
                Some(1) => match self.next_match() {
                    Some((o, a, b)) => self.emit(o, a, b),
                    None => {
                        self.emit_rest();
                        break;
                    }
                },
                Some(i) => self.emit(self.on + i - 1, self.an + i - 1, self.bn + i - 1),
            }
        }
        MergeResult {
            merged: self.merged,
            conflicts: self.conflicts,
        }
    }

    /// 1-based offset of the first line where the sides stop agreeing with
    /// the base, or `None` when they agree to the end.
    fn next_mismatch(&self) -> Option<usize> {
        let mut i = 1;
        while self.on + i - 1 < self.o.len()
            || self.an + i - 1 < self.a.len()
            || self.bn + i - 1 < self.b.len()
        {
            let oi = self.on + i - 1;
            let a_match = self.a_matches.get(oi).copied().flatten();
            let b_match = self.b_matches.get(oi).copied().flatten();
            if a_match != Some(self.an + i - 1) || b_match != Some(self.bn + i - 1) {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// Next base line matched on both sides.
    fn next_match(&self) -> Option<(usize, usize, usize)> {
        (self.on..self.o.len()).find_map(|oi| match (self.a_matches[oi], self.b_matches[oi]) {
            (Some(a), Some(b)) => Some((oi, a, b)),
            _ => None,
        })
    }

    fn emit_rest(&mut self) {
        self.emit(self.o.len(), self.a.len(), self.b.len());
    }

    fn emit(&mut self, oe: usize, ae: usize, be: usize) {
        let (on, an, bn) = (self.on, self.an, self.bn);
        let oc = &self.o[on..oe];
        let ac = &self.a[an..ae];
        let bc = &self.b[bn..be];

        if oc == ac {
            self.merged.extend(bc.iter().copied().flatten());
        } else if oc == bc || ac == bc {
            self.merged.extend(ac.iter().copied().flatten());
        } else if let Some(lines) = resolve_linewise(oc, ac, bc) {
            self.merged.extend(lines.into_iter().flatten());
        } else {
            match self.strategy {
                MergeStrategy::Ours => self.merged.extend(ac.iter().copied().flatten()),
                MergeStrategy::Theirs => self.merged.extend(bc.iter().copied().flatten()),
                MergeStrategy::Default => {
                    self.merged.extend_from_slice(CONFLICT_START);
                    push_block(&mut self.merged, ac);
                    self.merged.extend_from_slice(CONFLICT_SEPARATOR);
                    push_block(&mut self.merged, bc);
                    self.merged.extend_from_slice(CONFLICT_END);
                    self.conflicts.push(Conflict {
                        base: on..oe,
                        this: an..ae,
                        other: bn..be,
                    });
                }
            }
        }

        self.on = oe;
        self.an = ae;
        self.bn = be;
    }
}

/// Chunks of equal length where every line changed on at most one side
/// merge line by line.
fn resolve_linewise<'a>(
    oc: &[&'a [u8]],
    ac: &[&'a [u8]],
    bc: &[&'a [u8]],
) -> Option<Vec<&'a [u8]>> {
    if oc.len() != ac.len() || oc.len() != bc.len() {
        return None;
    }
    oc.iter()
        .zip(ac)
        .zip(bc)
        .map(|((&o, &a), &b)| {
            if o == a {
                Some(b)
            } else if o == b || a == b {
                Some(a)
            } else {
                None
            }
        })
        .collect()
}

/// Conflict sides always end on a line break so markers stay on their own
/// lines.
fn push_block(out: &mut Vec<u8>, lines: &[&[u8]]) {
    for line in lines {
        out.extend_from_slice(line);
    }
    if lines.last().is_some_and(|l| !l.ends_with(b"\n")) {
        out.push(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(this: &str, other: &str, base: &str, strategy: MergeStrategy) -> MergeResult {
        merge3(
            this.as_bytes(),
            other.as_bytes(),
            Some(base.as_bytes()),
            DiffKind::Histogram,
            strategy,
        )
    }

    #[test]
    fn test_clean_merge_of_separate_lines() {
        let r = merge("1\n2a\n3\n", "1\n2\n3b\n", "1\n2\n3\n", MergeStrategy::Default);
        assert_eq!(r.merged, b"1\n2a\n3b\n");
        assert!(r.is_clean());
    }

    #[test]
    fn test_conflict_block() {
        let r = merge("y\n", "z\n", "x\n", MergeStrategy::Default);
        assert_eq!(
            r.merged,
            b"<<<<<<< this_file\ny\n======= \nz\n>>>>>>> other_file\n"
        );
        assert_eq!(
            r.conflicts,
            vec![Conflict {
                base: 0..1,
                this: 0..1,
                other: 0..1
            }]
        );
    }

    #[test]
    fn test_strategies() {
        assert_eq!(merge("y\n", "z\n", "x\n", MergeStrategy::Ours).merged, b"y\n");
        assert_eq!(merge("y\n", "z\n", "x\n", MergeStrategy::Theirs).merged, b"z\n");
        assert!(merge("y\n", "z\n", "x\n", MergeStrategy::Ours).is_clean());
    }

    #[test]
    fn test_same_change_both_sides() {
        let r = merge("a\nB\nc\n", "a\nB\nc\n", "a\nb\nc\n", MergeStrategy::Default);
        assert_eq!(r.merged, b"a\nB\nc\n");
        assert!(r.is_clean());
    }

    #[test]
    fn test_append_on_one_side() {
        let r = merge("a\nb\n", "a\nb\nc\n", "a\nb\n", MergeStrategy::Default);
        assert_eq!(r.merged, b"a\nb\nc\n");
    }

    #[test]
    fn test_conflict_side_without_newline() {
        let r = merge("y", "z", "x", MergeStrategy::Default);
        assert_eq!(
            r.merged,
            b"<<<<<<< this_file\ny\n======= \nz\n>>>>>>> other_file\n"
        );
    }

    #[test]
    fn test_missing_base_uses_common_lines() {
        let r = merge3(
            b"head\nmine\ntail\n",
            b"head\ntail\n",
            None,
            DiffKind::Histogram,
            MergeStrategy::Default,
        );
        // base = head, tail; only this side added a line
        assert_eq!(r.merged, b"head\nmine\ntail\n");
        assert!(r.is_clean());
    }

    #[test]
    fn test_strategy_parse() {
        let cases = [
            ("default", MergeStrategy::Default),
            ("ort", MergeStrategy::Default),
            ("resolve", MergeStrategy::Default),
            ("ours", MergeStrategy::Ours),
            ("ort-ours", MergeStrategy::Ours),
            ("resolve-ours", MergeStrategy::Ours),
            ("theirs", MergeStrategy::Theirs),
            ("ORT-THEIRS", MergeStrategy::Theirs),
            ("resolve-theirs", MergeStrategy::Theirs),
        ];
        for (s, expected) in cases {
            assert_eq!(s.parse::<MergeStrategy>().unwrap(), expected, "{s}");
        }
        assert!("union".parse::<MergeStrategy>().is_err());
        assert!("ort-union".parse::<MergeStrategy>().is_err());
    }
}
