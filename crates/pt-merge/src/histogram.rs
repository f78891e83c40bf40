//! Histogram diff, after git's xhistogram.
//!
//! Each region is trimmed of its common prefix and suffix, then split
//! around the common line with the fewest occurrences on both sides.
//! Regions are processed from an explicit stack, so deep recursion on
//! large notes cannot overflow.

use std::collections::HashMap;
use std::hash::Hash;

use crate::diff::{diff_lines, split_lines, DiffKind, Edit};

/// Occurrence limit for a single line within a region.
const MAX_CHAIN_LENGTH: usize = 64;

/// The input is dominated by repeated lines; use Myers instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotSuitable;

impl std::fmt::Display for NotSuitable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "a line repeats more than {MAX_CHAIN_LENGTH} times")
    }
}

impl std::error::Error for NotSuitable {}

#[derive(Default)]
struct Record {
    count_a: usize,
    last_a: usize,
    count_b: usize,
    last_b: usize,
}

/// Half-open line ranges `a[a0..a1)` and `b[b0..b1)`.
#[derive(Clone, Copy)]
struct Region {
    a0: usize,
    a1: usize,
    b0: usize,
    b1: usize,
}

/// Edit script from `a` to `b`, or [`NotSuitable`].
pub fn histogram<T: Hash + Eq>(a: &[T], b: &[T]) -> Result<Vec<Edit>, NotSuitable> {
    let pairs = common_pairs(a, b)?;
    Ok(edits_from_pairs(a.len(), b.len(), &pairs))
}

/// The common lines of `a` and `b` (their LCS as found by the histogram
/// engine, or by Myers when histogram is not suitable), concatenated.
pub fn common_base(a: &[u8], b: &[u8]) -> Vec<u8> {
    let a_lines = split_lines(a);
    let b_lines = split_lines(b);
    diff_lines(DiffKind::Histogram, &a_lines, &b_lines)
        .into_iter()
        .filter_map(|edit| match edit {
            Edit::Keep { a, .. } => Some(a_lines[a]),
            _ => None,
        })
        .flatten()
        .copied()
        .collect()
}

/// Matched `(a_index, b_index)` pairs, strictly increasing in both.
fn common_pairs<T: Hash + Eq>(a: &[T], b: &[T]) -> Result<Vec<(usize, usize)>, NotSuitable> {
    let mut pairs = Vec::new();
    let mut regions = vec![Region {
        a0: 0,
        a1: a.len(),
        b0: 0,
        b1: b.len(),
    }];

    while let Some(mut r) = regions.pop() {
        while r.a0 < r.a1 && r.b0 < r.b1 && a[r.a0] == b[r.b0] {
            pairs.push((r.a0, r.b0));
            r.a0 += 1;
            r.b0 += 1;
        }
        while r.a0 < r.a1 && r.b0 < r.b1 && a[r.a1 - 1] == b[r.b1 - 1] {
            r.a1 -= 1;
            r.b1 -= 1;
            pairs.push((r.a1, r.b1));
        }
        if r.a0 == r.a1 || r.b0 == r.b1 {
            continue;
        }

        let Some((split_a, split_b)) = find_split(a, b, r)? else {
            continue;
        };
        pairs.push((split_a, split_b));
        regions.push(Region {
            a0: split_a + 1,
            a1: r.a1,
            b0: split_b + 1,
            b1: r.b1,
        });
        regions.push(Region {
            a0: r.a0,
            a1: split_a,
            b0: r.b0,
            b1: split_b,
        });
    }

    pairs.sort_unstable();
    Ok(pairs)
}

/// Pick the split line for a region, or `None` when the sides share no line.
fn find_split<T: Hash + Eq>(
    a: &[T],
    b: &[T],
    r: Region,
) -> Result<Option<(usize, usize)>, NotSuitable> {
    let mut table: HashMap<&T, Record> = HashMap::with_capacity(r.a1 - r.a0);
    for (i, line) in a.iter().enumerate().take(r.a1).skip(r.a0) {
        let rec = table.entry(line).or_default();
        rec.count_a += 1;
        rec.last_a = i;
        if rec.count_a > MAX_CHAIN_LENGTH {
            return Err(NotSuitable);
        }
    }

    let mut any_common = false;
    for (j, line) in b.iter().enumerate().take(r.b1).skip(r.b0) {
        if let Some(rec) = table.get_mut(line) {
            rec.count_b += 1;
            rec.last_b = j;
            any_common = true;
        }
    }
    if !any_common {
        return Ok(None);
    }

    // Right-to-left over `a` keeps ties independent of hash order
    let mut best: Option<(usize, usize, usize)> = None;
    for line in a[r.a0..r.a1].iter().rev() {
        let rec = &table[line];
        if rec.count_b == 0 || rec.count_a >= MAX_CHAIN_LENGTH {
            continue;
        }
        let score = rec.count_a + rec.count_b;
        if best.map_or(true, |(s, _, _)| score < s) {
            best = Some((score, rec.last_a, rec.last_b));
        }
    }

    match best {
        Some((_, split_a, split_b)) => Ok(Some((split_a, split_b))),
        None => Err(NotSuitable),
    }
}

fn edits_from_pairs(n: usize, m: usize, pairs: &[(usize, usize)]) -> Vec<Edit> {
    let mut edits = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    for &(pa, pb) in pairs.iter().chain(std::iter::once(&(n, m))) {
        edits.extend((i..pa).map(|a| Edit::Delete { a }));
        edits.extend((j..pb).map(|b| Edit::Insert { b }));
        if pa < n {
            edits.push(Edit::Keep { a: pa, b: pb });
            i = pa + 1;
            j = pb + 1;
        }
    }
    edits
}
