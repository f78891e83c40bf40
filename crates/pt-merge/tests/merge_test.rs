//! Integration tests for the diff engines and three-way merge.
//!
//! Exercises the public API the way the `pt` front-end does: texts in,
//! tagged lines or merged bytes out.

use proptest::prelude::*;
use pt_merge::{
    apply_edits, diff, diff_lines, histogram, merge3, myers, split_lines, DiffKind,
    MergeStrategy, NotSuitable,
};

const ENGINES: [DiffKind; 3] = [DiffKind::Myers, DiffKind::Ndiff, DiffKind::Histogram];

fn merge(this: &[u8], other: &[u8], base: &[u8], strategy: MergeStrategy) -> pt_merge::MergeResult {
    merge3(this, other, Some(base), DiffKind::Histogram, strategy)
}

/// Small alphabet so generated texts share plenty of lines.
fn text() -> impl Strategy<Value = Vec<u8>> {
    let line = prop::sample::select(vec!["a\n", "b\n", "c\n", "d\r\n", "e"]);
    proptest::collection::vec(line, 0..24)
        .prop_map(|lines| lines.concat().into_bytes())
}

// ── Diff ─────────────────────────────────────────────────────────────────

#[test]
fn myers_replaced_line() {
    let out = diff(DiffKind::Myers, b"a\nb\nc\n", b"a\nx\nc\n");
    let expected: Vec<Vec<u8>> = vec![
        b"  a\n".to_vec(),
        b"- b\n".to_vec(),
        b"+ x\n".to_vec(),
        b"  c\n".to_vec(),
    ];
    assert_eq!(out, expected);
}

#[test]
fn histogram_repeated_lines_fall_back_to_myers() {
    let a_text = "x\n".repeat(100);
    let b_text = "y\nx\ny\nx\ny\n";
    let a = split_lines(a_text.as_bytes());
    let b = split_lines(b_text.as_bytes());

    assert_eq!(histogram(&a, &b), Err(NotSuitable));
    assert_eq!(diff_lines(DiffKind::Histogram, &a, &b), myers(&a, &b));
    assert_eq!(
        diff(DiffKind::Histogram, a_text.as_bytes(), b_text.as_bytes()),
        diff(DiffKind::Myers, a_text.as_bytes(), b_text.as_bytes())
    );
}

#[test]
fn crlf_lines_survive_diff() {
    let a = b"one\r\ntwo\r\n";
    let b = b"one\r\n2\r\ntwo\r\n";
    for kind in ENGINES {
        let tagged = diff(kind, a, b);
        assert_eq!(tagged[1], b"+ 2\r\n".to_vec(), "{kind}");
        assert_eq!(apply_edits(a, &tagged).unwrap(), b, "{kind}");
    }
}

// ── Merge ────────────────────────────────────────────────────────────────

#[test]
fn clean_merge() {
    let r = merge(b"1\n2a\n3\n", b"1\n2\n3b\n", b"1\n2\n3\n", MergeStrategy::Default);
    assert_eq!(r.merged, b"1\n2a\n3b\n");
    assert!(r.conflicts.is_empty());
}

#[test]
fn conflict_with_each_strategy() {
    let r = merge(b"y\n", b"z\n", b"x\n", MergeStrategy::Default);
    let text = String::from_utf8(r.merged).unwrap();
    assert!(text.starts_with("<<<<<<< this_file\n"));
    assert!(text.lines().any(|l| l == "======= "));
    assert!(text.ends_with(">>>>>>> other_file\n"));
    assert_eq!(r.conflicts.len(), 1);

    assert_eq!(merge(b"y\n", b"z\n", b"x\n", MergeStrategy::Ours).merged, b"y\n");
    assert_eq!(merge(b"y\n", b"z\n", b"x\n", MergeStrategy::Theirs).merged, b"z\n");
}

#[test]
fn conflict_surrounded_by_context() {
    let base = b"head\nmiddle\ntail\n";
    let r = merge(b"head\nmine\ntail\n", b"head\ntheirs\ntail\n", base, MergeStrategy::Default);
    assert_eq!(
        r.merged,
        b"head\n<<<<<<< this_file\nmine\n======= \ntheirs\n>>>>>>> other_file\ntail\n"
    );
    assert_eq!(r.conflicts[0].base, 1..2);
    assert_eq!(r.conflicts[0].this, 1..2);
    assert_eq!(r.conflicts[0].other, 1..2);
}

#[test]
fn merge_with_every_engine() {
    for kind in ENGINES {
        let r = merge3(
            b"a\nb\nc\nd\n",
            b"a\nb\nC\nd\ne\n",
            Some(&b"a\nb\nc\nd\n"[..]),
            kind,
            MergeStrategy::Default,
        );
        assert_eq!(r.merged, b"a\nb\nC\nd\ne\n", "{kind}");
    }
}

// ── Properties ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn diff_reproduces_target(a in text(), b in text()) {
        for kind in ENGINES {
            let tagged = diff(kind, &a, &b);
            prop_assert_eq!(apply_edits(&a, &tagged).unwrap(), b.clone());
        }
    }

    #[test]
    fn merge_takes_the_only_changed_side(base in text(), changed in text()) {
        for kind in ENGINES {
            let r = merge3(&base, &changed, Some(base.as_slice()), kind, MergeStrategy::Default);
            prop_assert_eq!(&r.merged, &changed);
            prop_assert!(r.conflicts.is_empty());

            let r = merge3(&changed, &base, Some(base.as_slice()), kind, MergeStrategy::Default);
            prop_assert_eq!(&r.merged, &changed);
            prop_assert!(r.conflicts.is_empty());
        }
    }

    #[test]
    fn merge_of_identical_sides(base in text(), both in text()) {
        let r = merge3(&both, &both, Some(base.as_slice()), DiffKind::Histogram, MergeStrategy::Default);
        prop_assert_eq!(&r.merged, &both);
        prop_assert!(r.conflicts.is_empty());
    }
}
