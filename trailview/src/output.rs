//! Plain-text rendering of the owner state to stdout.
//!
//! This is a line-oriented view for terminals and pipes: a header for the
//! selected session, the visible tail of its transcript, and a bounded
//! preview of each edit's diff. Changed words inside an adjacent
//! removed/added pair are marked git-style as `[-old-]` / `{+new+}`.

use std::io::{self, Write};

use trailview_core::diff::{self, InlineSegment};
use trailview_core::{DiffLine, DiffLineKind, Message, Role, TranscriptParser, TranscriptStore};

use crate::app::App;
use crate::sync::{SessionRef, SyncPhase};
use crate::watcher::Watcher;

/// Prints the session list, marking the selected one.
pub fn render_sessions(
    out: &mut impl Write,
    sessions: &[SessionRef],
    selected: Option<usize>,
) -> io::Result<()> {
    for (idx, session) in sessions.iter().enumerate() {
        let marker = if Some(idx) == selected { '*' } else { ' ' };
        writeln!(out, "{marker} {idx:>3}  {}  {}", session.id, session.path.display())?;
    }
    Ok(())
}

/// Prints the selected session's header and visible messages.
pub fn render_transcript<S, P, W>(out: &mut impl Write, app: &App<S, P, W>) -> io::Result<()>
where
    S: TranscriptStore,
    P: TranscriptParser,
    W: Watcher,
{
    let Some(session) = app.sync.session() else {
        return writeln!(out, "(no session selected; type `list` or `open N`)");
    };
    let messages = app.sync.messages();
    let status = match (app.sync.is_loading(), app.sync.phase()) {
        (true, _) => "loading",
        (false, SyncPhase::Resyncing) => "syncing",
        _ => "live",
    };
    writeln!(out, "== {} [{}] {} messages", session.id, status, messages.len())?;
    if let Some(prompt) = app.sync.last_prompt() {
        writeln!(out, "   last prompt: {}", first_line(prompt))?;
    }

    let total = messages.len();
    if app.viewport.has_more(total) {
        let hidden = total - app.viewport.displayed_count().min(total);
        writeln!(out, "   ... {hidden} older messages (`more` to show)")?;
    }

    for message in app.viewport.visible(messages) {
        writeln!(out, "{}", message_header(message))?;
        if message.edit.is_none() {
            continue;
        }
        match app.diff_for(&message.id) {
            Some(cached) => {
                let s = cached.stats;
                writeln!(out, "    +{} -{}", s.added, s.removed)?;
                for line in diff_preview(&cached.lines, app.is_expanded(&message.id)) {
                    writeln!(out, "    {line}")?;
                }
            }
            None if app.is_diff_pending(&message.id) => writeln!(out, "    (computing diff)")?,
            None => {}
        }
    }
    out.flush()
}

fn message_header(message: &Message) -> String {
    let time = message.timestamp.format("%H:%M:%S");
    let images = match message.images.len() {
        0 => String::new(),
        n => format!(" [{n} image{}]", if n == 1 { "" } else { "s" }),
    };
    match (&message.role, &message.tool) {
        (Role::Tool, Some(tool)) => {
            let state = if tool.in_progress { " (running)" } else { "" };
            format!("[{time}] tool {}{state}: {}{images}", tool.name, first_line(&message.content))
        }
        (role, _) => {
            let who = match role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            format!("[{time}] {who}: {}{images}", first_line(&message.content))
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Formats the preview of a diff, one string per output line.
///
/// The last line reports how many diff lines the preview hides.
pub fn diff_preview(lines: &[DiffLine], expanded: bool) -> Vec<String> {
    let (shown, hidden) = diff::preview(lines, expanded);
    let mut out = Vec::with_capacity(shown.len() + 1);

    let mut idx = 0;
    while idx < shown.len() {
        let line = &shown[idx];
        let paired = shown.get(idx + 1).filter(|next| {
            line.kind == DiffLineKind::Removed && next.kind == DiffLineKind::Added
        });
        match paired {
            Some(added) => {
                let (old, new) = diff::inline_emphasis(&line.content, &added.content);
                out.push(gutter(line, &mark_segments(&old, "[-", "-]")));
                out.push(gutter(added, &mark_segments(&new, "{+", "+}")));
                idx += 2;
            }
            None => {
                out.push(gutter(line, &line.content));
                idx += 1;
            }
        }
    }

    if hidden > 0 {
        out.push(format!("... {hidden} more lines"));
    }
    out
}

fn gutter(line: &DiffLine, text: &str) -> String {
    let num = |n: Option<u32>| n.map(|n| n.to_string()).unwrap_or_default();
    format!("{:>4} {:>4} {} {}", num(line.old_lineno), num(line.new_lineno), line.marker(), text)
}

fn mark_segments(segments: &[InlineSegment], open: &str, close: &str) -> String {
    segments
        .iter()
        .map(|seg| {
            if seg.emphasized {
                format!("{open}{}{close}", seg.text)
            } else {
                seg.text.clone()
            }
        })
        .collect()
}
