//! Line diff engine for edit-type tool calls.
//!
//! [`diff`] is a plain longest-common-subsequence diff: an `(m+1) × (n+1)`
//! dynamic-programming table followed by a backtrack from the bottom-right
//! corner. It is O(m·n) in time and space and performs no truncation; bounding
//! what gets shown is done by [`preview`], which sits on top of it.
//!
//! # Tie-break
//!
//! When backtracking hits two equally long subsequences, the engine emits the
//! added line before the removed one. Because the backtrack walks bottom-to-top
//! and is reversed at the end, the final top-down output lists the removal
//! first and the addition right after it, e.g. `["a"] -> ["b"]` renders as
//! `-a`, `+b`. The output must stay byte-for-byte deterministic, so this order
//! is part of the contract and is covered by tests.

use similar::{ChangeTag, TextDiff};

use crate::types::{DiffLine, DiffLineKind, DiffStats};

/// Number of diff lines shown for a collapsed edit.
pub const COLLAPSED_PREVIEW_LINES: usize = 30;

/// Upper bound on diff lines shown for an expanded edit.
pub const EXPANDED_PREVIEW_LINES: usize = 200;

/// Computes an ordered unified diff between two line sequences.
///
/// Context lines carry both line numbers, added lines only the new-side number,
/// removed lines only the old-side number. Line numbers are 1-based.
pub fn diff<S: AsRef<str>>(old: &[S], new: &[S]) -> Vec<DiffLine> {
    let m = old.len();
    let n = new.len();
    let width = n + 1;

    // Row-major (m+1) × (n+1) table; row 0 and column 0 stay zero.
    let mut dp = vec![0u32; (m + 1) * width];
    for i in 1..=m {
        for j in 1..=n {
            dp[i * width + j] = if old[i - 1].as_ref() == new[j - 1].as_ref() {
                dp[(i - 1) * width + (j - 1)] + 1
            } else {
                dp[(i - 1) * width + j].max(dp[i * width + (j - 1)])
            };
        }
    }

    let mut lines = Vec::with_capacity(m + n);
    let (mut i, mut j) = (m, n);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && old[i - 1].as_ref() == new[j - 1].as_ref() {
            lines.push(DiffLine::context(old[i - 1].as_ref(), i as u32, j as u32));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || dp[i * width + (j - 1)] >= dp[(i - 1) * width + j]) {
            lines.push(DiffLine::added(new[j - 1].as_ref(), j as u32));
            j -= 1;
        } else {
            lines.push(DiffLine::removed(old[i - 1].as_ref(), i as u32));
            i -= 1;
        }
    }

    lines.reverse();
    lines
}

/// Splits a text into diff lines.
///
/// The empty text has no lines (a new file is all additions); otherwise the
/// text is split on `'\n'`, so a trailing newline yields a final empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.split('\n').collect()
    }
}

/// Diffs two texts line by line.
///
/// Joining the context+removed lines with `'\n'` gives back `old` exactly and
/// context+added gives back `new` (see [`split_lines`]).
pub fn diff_text(old: &str, new: &str) -> Vec<DiffLine> {
    diff(&split_lines(old), &split_lines(new))
}

/// Counts added and removed lines.
pub fn stats(lines: &[DiffLine]) -> DiffStats {
    lines.iter().fold(DiffStats::default(), |mut acc, line| {
        match line.kind {
            DiffLineKind::Added => acc.added += 1,
            DiffLineKind::Removed => acc.removed += 1,
            DiffLineKind::Context => {}
        }
        acc
    })
}

/// Returns the slice of `lines` to show and how many lines are hidden.
///
/// Collapsed edits show the first [`COLLAPSED_PREVIEW_LINES`]; expanded edits
/// show up to [`EXPANDED_PREVIEW_LINES`].
pub fn preview(lines: &[DiffLine], expanded: bool) -> (&[DiffLine], usize) {
    let limit = if expanded { EXPANDED_PREVIEW_LINES } else { COLLAPSED_PREVIEW_LINES };
    let shown = lines.len().min(limit);
    (&lines[..shown], lines.len() - shown)
}

/// A run of text within one side of a changed line pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSegment {
    pub text: String,
    /// `true` when this run differs from the other side.
    pub emphasized: bool,
}

/// Computes word-level emphasis for a removed/added line pair.
///
/// Returns the segments of the old line and the segments of the new line.
/// Unchanged words appear on both sides with `emphasized = false`.
pub fn inline_emphasis(old_line: &str, new_line: &str) -> (Vec<InlineSegment>, Vec<InlineSegment>) {
    let diff = TextDiff::from_words(old_line, new_line);
    let mut old_segments = Vec::new();
    let mut new_segments = Vec::new();

    for change in diff.iter_all_changes() {
        let text = change.value().to_owned();
        match change.tag() {
            ChangeTag::Delete => old_segments.push(InlineSegment { text, emphasized: true }),
            ChangeTag::Insert => new_segments.push(InlineSegment { text, emphasized: true }),
            ChangeTag::Equal => {
                old_segments.push(InlineSegment { text: text.clone(), emphasized: false });
                new_segments.push(InlineSegment { text, emphasized: false });
            }
        }
    }
    (old_segments, new_segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dp_table_is_not_truncated() {
        let old: Vec<String> = (0..300).map(|i| format!("line {i}")).collect();
        let mut new = old.clone();
        new[150] = "changed".to_owned();
        let lines = diff(&old, &new);
        assert_eq!(lines.len(), 301);
        assert_eq!(stats(&lines), DiffStats { added: 1, removed: 1 });
    }

    #[test]
    fn preview_hides_the_tail() {
        let old: Vec<String> = Vec::new();
        let new: Vec<String> = (0..250).map(|i| i.to_string()).collect();
        let lines = diff(&old, &new);

        let (shown, hidden) = preview(&lines, false);
        assert_eq!(shown.len(), COLLAPSED_PREVIEW_LINES);
        assert_eq!(hidden, 220);

        let (shown, hidden) = preview(&lines, true);
        assert_eq!(shown.len(), EXPANDED_PREVIEW_LINES);
        assert_eq!(hidden, 50);

        let (shown, hidden) = preview(&lines[..10], false);
        assert_eq!(shown.len(), 10);
        assert_eq!(hidden, 0);
    }

    #[test]
    fn inline_emphasis_marks_changed_words_only() {
        let (old, new) = inline_emphasis("let x = 1;", "let x = 2;");
        let old_text: String = old.iter().map(|s| s.text.as_str()).collect();
        let new_text: String = new.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(old_text, "let x = 1;");
        assert_eq!(new_text, "let x = 2;");
        assert!(old.iter().any(|s| s.emphasized && s.text.contains('1')));
        assert!(new.iter().any(|s| s.emphasized && s.text.contains('2')));
        assert!(old.iter().filter(|s| s.emphasized).all(|s| !s.text.contains("let")));
    }
}
