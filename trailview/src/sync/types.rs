//! Owned data types passed between the coordinator and its background tasks.
//!
//! Everything here is `Send` and free of borrowed lifetimes so results can
//! travel from tokio worker tasks back to the owner loop inside `AppEvent`.

use std::path::{Path, PathBuf};

use trailview_core::{Message, SyncError};

/// A selectable session: its id and the log file backing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRef {
    pub id: String,
    pub path: PathBuf,
}

impl SessionRef {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { id: id.into(), path: path.into() }
    }

    /// Uses the log's file stem as the session id (`<uuid>.jsonl` → `<uuid>`).
    pub fn from_path(path: &Path) -> Self {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::new(id, path)
    }
}

/// Identifies which selection a background result was computed for.
///
/// `epoch` is bumped on every session change, so a ticket only matches while
/// the selection it was issued under is still current, even if the same
/// session is selected again later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub session_id: String,
}

/// A message list plus the last prompt, as read back from the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub messages: Vec<Message>,
    pub last_prompt: Option<String>,
}

/// Results delivered to the owner loop by background sync tasks.
#[derive(Debug)]
pub enum SyncEvent {
    /// Phase A: cached contents, read before the log is re-parsed.
    Cached { ticket: Ticket, snapshot: Snapshot },
    /// Phase B: outcome of parse, merge and re-read.
    Parsed { ticket: Ticket, outcome: Result<Snapshot, SyncError> },
}

impl SyncEvent {
    pub fn ticket(&self) -> &Ticket {
        match self {
            SyncEvent::Cached { ticket, .. } | SyncEvent::Parsed { ticket, .. } => ticket,
        }
    }
}

/// Lifecycle of the selected session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nothing selected.
    #[default]
    Idle,
    /// First authoritative parse not finished yet.
    Loading,
    /// Published state matches the last completed parse.
    Ready,
    /// A change-triggered re-parse is in flight.
    Resyncing,
}

/// Returned by the coordinator whenever the published message list was swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Published {
    pub old_total: usize,
    pub new_total: usize,
    /// First publish for this selection: the list was replaced, not appended to.
    pub first: bool,
}
