//! Event bus for trailview.
//!
//! Operator commands, file-change notifications, and background-task results are
//! normalised into a single `AppEvent` enum and sent over a tokio unbounded MPSC
//! channel. The owner loop in `main.rs` is the only receiver and the only place
//! where state is mutated.

use std::path::PathBuf;
use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::diffs::types::DiffResultPayload;
use crate::sync::SyncEvent;

/// All events the owner loop can receive from any source.
#[derive(Debug)]
#[non_exhaustive]
pub enum AppEvent {
    /// A command typed on stdin.
    Command(Command),
    /// A watched session log was written to or extended.
    FileChanged(PathBuf),
    /// Result of a background load or resync.
    Sync(Box<SyncEvent>),
    /// Result from the diff worker pool.
    DiffResult(Box<DiffResultPayload>),
    /// Quit request.
    Quit,
}

/// Operator commands read from stdin, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Select the next session.
    Next,
    /// Select the previous session.
    Prev,
    /// Select the session at this (0-based) index.
    Open(usize),
    /// Page one more batch of older messages into view.
    More,
    /// Toggle the expanded diff preview for a message id.
    Diff(String),
    /// Force a re-parse of the current session log.
    Resync,
    /// List the known sessions.
    List,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let word = parts.next().unwrap_or_default();
        let arg = parts.next();
        match (word, arg) {
            ("next" | "n", None) => Ok(Command::Next),
            ("prev" | "p", None) => Ok(Command::Prev),
            ("open" | "o", Some(idx)) => {
                idx.parse().map(Command::Open).map_err(|_| format!("not a session index: {idx}"))
            }
            ("more" | "m", None) => Ok(Command::More),
            ("diff" | "d", Some(id)) => Ok(Command::Diff(id.to_owned())),
            ("resync" | "r", None) => Ok(Command::Resync),
            ("list" | "ls", None) => Ok(Command::List),
            ("quit" | "q", None) => Ok(Command::Quit),
            _ => Err(format!("unknown command: {}", s.trim())),
        }
    }
}

/// Holds the sender and receiver ends of the unified event channel.
///
/// The sender (`tx`) is cloned and distributed to background producers;
/// the receiver (`rx`) is owned by the owner loop.
pub struct EventHandler {
    pub tx: mpsc::UnboundedSender<AppEvent>,
    pub rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    /// Creates a new `EventHandler` with a fresh unbounded channel.
    ///
    /// Producers are bounded by human typing speed, OS-coalesced file events and
    /// one result per dispatched task, and the owner loop does no blocking work,
    /// so the channel does not need backpressure.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the task that turns stdin lines into `AppEvent::Command`s.
///
/// Unparseable lines are logged and dropped. At end of input the task exits
/// without sending `Quit`, so `trailview < /dev/null` keeps following its logs
/// until it is signalled.
pub fn spawn_input_task(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => {
                        if tx.send(AppEvent::Command(command)).is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::warn!("{err}"),
                },
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%err, "stdin read failed");
                    break;
                }
            }
        }
    });
}
