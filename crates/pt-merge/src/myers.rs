//! Myers' O(ND) difference algorithm.
//!
//! The forward pass snapshots the diagonals `-d..=d` of the `V` array before
//! every edit distance `d`, which bounds the trace at O(D²) entries; the edit
//! script is recovered by walking those snapshots backwards from `(N, M)`.
//! Deletions are emitted before insertions within a change.

use crate::diff::Edit;

/// Shortest edit script from `a` to `b`.
pub fn myers<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Edit> {
    let trace = forward(a, b);
    backtrack(&trace, a.len(), b.len())
}

/// `V[k]` (offset by `max`) holds the furthest `x` reached on diagonal `k`.
/// Snapshot `d` holds `V[-d..=d]`, indexed by `k + d`.
fn forward<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Vec<isize>> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    let mut trace = Vec::new();
    if max == 0 {
        return trace;
    }

    let mut v = vec![0isize; 2 * max as usize + 2];
    for d in 0..=max {
        trace.push(v[(max - d) as usize..=(max + d) as usize].to_vec());
        for k in (-d..=d).step_by(2) {
            let idx = (k + max) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                return trace;
            }
        }
    }
    trace
}

fn backtrack(trace: &[Vec<isize>], n: usize, m: usize) -> Vec<Edit> {
    let mut x = n as isize;
    let mut y = m as isize;
    let mut edits = Vec::with_capacity(n + m);

    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let at = |k: isize| v[(k + d) as usize];
        let k = x - y;
        let (prev_x, prev_y) = if d == 0 {
            (0, 0)
        } else {
            let prev_k = if k == -d || (k != d && at(k - 1) < at(k + 1)) {
                k + 1
            } else {
                k - 1
            };
            let prev_x = at(prev_k);
            (prev_x, prev_x - prev_k)
        };

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            edits.push(Edit::Keep {
                a: x as usize,
                b: y as usize,
            });
        }
        if d > 0 {
            if x == prev_x {
                edits.push(Edit::Insert { b: prev_y as usize });
            } else {
                edits.push(Edit::Delete { a: prev_x as usize });
            }
        }
        x = prev_x;
        y = prev_y;
    }

    edits.reverse();
    edits
}
