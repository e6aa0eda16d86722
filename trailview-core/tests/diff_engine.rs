//! Properties of the LCS diff engine.

use trailview_core::diff::{diff, diff_text, stats};
use trailview_core::{DiffLine, DiffLineKind, DiffStats, EditPayload};

fn side(lines: &[DiffLine], keep: DiffLineKind) -> Vec<&str> {
    lines
        .iter()
        .filter(|l| l.kind == DiffLineKind::Context || l.kind == keep)
        .map(|l| l.content.as_str())
        .collect()
}

fn assert_round_trip(old: &[&str], new: &[&str]) {
    let lines = diff(old, new);
    assert_eq!(side(&lines, DiffLineKind::Removed).join("\n"), old.join("\n"));
    assert_eq!(side(&lines, DiffLineKind::Added).join("\n"), new.join("\n"));
}

#[test]
fn replaced_middle_line() {
    assert_eq!(
        diff(&["a", "b", "c"], &["a", "x", "c"]),
        vec![
            DiffLine::context("a", 1, 1),
            DiffLine::removed("b", 2),
            DiffLine::added("x", 2),
            DiffLine::context("c", 3, 3),
        ]
    );
}

#[test]
fn empty_old_is_all_added() {
    assert_eq!(
        diff(&[], &["a", "b"]),
        vec![DiffLine::added("a", 1), DiffLine::added("b", 2)]
    );
}

#[test]
fn empty_new_is_all_removed() {
    assert_eq!(
        diff(&["a", "b"], &[]),
        vec![DiffLine::removed("a", 1), DiffLine::removed("b", 2)]
    );
}

#[test]
fn both_empty_is_empty() {
    let empty: [&str; 0] = [];
    assert!(diff(&empty, &empty).is_empty());
}

#[test]
fn identical_inputs_are_all_context() {
    let x = ["fn main() {", "    run();", "}"];
    let lines = diff(&x, &x);
    assert_eq!(lines.len(), x.len());
    for (i, line) in lines.iter().enumerate() {
        let n = i as u32 + 1;
        assert_eq!(*line, DiffLine::context(x[i], n, n));
    }
}

#[test]
fn tie_break_lists_removal_before_addition() {
    // At an ambiguous point the backtrack emits the addition first, which
    // reads as "-old, +new" once the list is reversed.
    assert_eq!(diff(&["a"], &["b"]), vec![DiffLine::removed("a", 1), DiffLine::added("b", 1)]);

    assert_eq!(
        diff(&["x", "a"], &["a", "x"]),
        vec![
            DiffLine::removed("x", 1),
            DiffLine::context("a", 2, 1),
            DiffLine::added("x", 2),
        ]
    );
}

#[test]
fn round_trip_reconstructs_both_sides() {
    let cases: &[(&[&str], &[&str])] = &[
        (&["a", "b", "c"], &["a", "x", "c"]),
        (&["a", "b", "c", "d"], &["d", "c", "b", "a"]),
        (&["", "", "x"], &["x", "", ""]),
        (&["same", "same", "same"], &["same"]),
        (&["one"], &["one", "two", "three"]),
        (&[], &[]),
        (&["a", "b"], &[]),
    ];
    for (old, new) in cases {
        assert_round_trip(old, new);
    }
}

#[test]
fn diff_text_round_trips_trailing_newlines() {
    let old = "alpha\nbeta\n";
    let new = "alpha\ngamma\nbeta\n";
    let lines = diff_text(old, new);
    assert_eq!(side(&lines, DiffLineKind::Removed).join("\n"), old);
    assert_eq!(side(&lines, DiffLineKind::Added).join("\n"), new);
    assert_eq!(stats(&lines), DiffStats { added: 1, removed: 0 });
}

#[test]
fn line_numbers_track_each_side() {
    let lines = diff(&["a", "b", "c", "d"], &["a", "c", "e", "d"]);
    for line in &lines {
        match line.kind {
            DiffLineKind::Context => assert!(line.old_lineno.is_some() && line.new_lineno.is_some()),
            DiffLineKind::Added => assert!(line.old_lineno.is_none() && line.new_lineno.is_some()),
            DiffLineKind::Removed => assert!(line.old_lineno.is_some() && line.new_lineno.is_none()),
        }
    }
    let olds: Vec<u32> = lines.iter().filter_map(|l| l.old_lineno).collect();
    let news: Vec<u32> = lines.iter().filter_map(|l| l.new_lineno).collect();
    assert_eq!(olds, [1, 2, 3, 4]);
    assert_eq!(news, [1, 2, 3, 4]);
}

#[test]
fn edit_payload_diffs_replace_and_passes_patch_through() {
    let replace = EditPayload::Replace { old: "a\nb".to_owned(), new: "a\nc".to_owned() };
    assert_eq!(stats(&replace.diff_lines()), DiffStats { added: 1, removed: 1 });
    assert_eq!(replace.diff_cost(), 4);

    let patch = EditPayload::Patch { lines: vec![DiffLine::added("x", 7)] };
    assert_eq!(patch.diff_lines(), vec![DiffLine::added("x", 7)]);
    assert_eq!(patch.diff_cost(), 0);
}

#[test]
fn new_file_write_is_all_added() {
    let write = EditPayload::Replace { old: String::new(), new: "a\nb".to_owned() };
    assert_eq!(write.diff_lines(), vec![DiffLine::added("a", 1), DiffLine::added("b", 2)]);
    assert_eq!(stats(&write.diff_lines()), DiffStats { added: 2, removed: 0 });
    assert_eq!(write.diff_cost(), 0);

    let delete = diff_text("x\ny", "");
    assert_eq!(delete, vec![DiffLine::removed("x", 1), DiffLine::removed("y", 2)]);
    assert!(diff_text("", "").is_empty());
}

mod prop {
    use super::*;
    use proptest::prelude::*;

    /// Short lines over a tiny alphabet, so old and new share many lines.
    fn arb_lines() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec("[ab]{0,2}", 0..12)
    }

    fn numbers(lines: &[DiffLine], pick: fn(&DiffLine) -> Option<u32>) -> Vec<u32> {
        lines.iter().filter_map(pick).collect()
    }

    proptest! {
        #[test]
        fn both_sides_reconstruct(old in arb_lines(), new in arb_lines()) {
            let lines = diff(&old, &new);
            prop_assert_eq!(side(&lines, DiffLineKind::Removed), old.iter().map(String::as_str).collect::<Vec<_>>());
            prop_assert_eq!(side(&lines, DiffLineKind::Added), new.iter().map(String::as_str).collect::<Vec<_>>());

            let expect_old: Vec<u32> = (1..=old.len() as u32).collect();
            let expect_new: Vec<u32> = (1..=new.len() as u32).collect();
            prop_assert_eq!(numbers(&lines, |l| l.old_lineno), expect_old);
            prop_assert_eq!(numbers(&lines, |l| l.new_lineno), expect_new);

            let s = stats(&lines);
            let context = lines.len() - s.added - s.removed;
            prop_assert_eq!(s.added, new.len() - context);
            prop_assert_eq!(s.removed, old.len() - context);
        }

        #[test]
        fn identical_input_is_all_context(lines in arb_lines()) {
            let out = diff(&lines, &lines);
            prop_assert_eq!(out.len(), lines.len());
            for (idx, line) in out.iter().enumerate() {
                let n = idx as u32 + 1;
                prop_assert_eq!(line, &DiffLine::context(lines[idx].as_str(), n, n));
            }
            prop_assert_eq!(stats(&out), DiffStats { added: 0, removed: 0 });
        }

        #[test]
        fn text_diff_reconstructs_both_texts(old in "[ab\n]{0,16}", new in "[ab\n]{0,16}") {
            let lines = diff_text(&old, &new);
            prop_assert_eq!(side(&lines, DiffLineKind::Removed).join("\n"), old);
            prop_assert_eq!(side(&lines, DiffLineKind::Added).join("\n"), new);
        }
    }
}
