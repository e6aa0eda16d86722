//! Test doubles shared by the binary's unit tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use trailview_core::{EditPayload, Message, ParseError, ParseResult, Role, TranscriptParser};

use crate::event::AppEvent;
use crate::sync::SyncEvent;
use crate::watcher::Watcher;

/// Parser returning whatever was last `set` for a path.
#[derive(Default)]
pub struct ScriptedParser {
    results: Mutex<HashMap<PathBuf, ParseResult>>,
    pub failing: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedParser {
    pub fn set(&self, path: impl Into<PathBuf>, result: ParseResult) {
        self.results.lock().unwrap().insert(path.into(), result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TranscriptParser for ScriptedParser {
    fn parse_all(&self, path: &Path) -> Result<ParseResult, ParseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ParseError::Malformed { path: path.to_path_buf(), lines: 1 });
        }
        Ok(self.results.lock().unwrap().get(path).cloned().unwrap_or_default())
    }
}

/// Watcher that only counts starts and stops.
#[derive(Clone, Default)]
pub struct CountingWatcher {
    pub started: Arc<AtomicUsize>,
    pub stopped: Arc<AtomicUsize>,
}

impl CountingWatcher {
    pub fn live(&self) -> usize {
        self.started.load(Ordering::SeqCst) - self.stopped.load(Ordering::SeqCst)
    }
}

pub struct FakeHandle;

impl Watcher for CountingWatcher {
    type Handle = FakeHandle;

    fn start(&self, _path: &Path) -> FakeHandle {
        self.started.fetch_add(1, Ordering::SeqCst);
        FakeHandle
    }

    fn stop(&self, _handle: FakeHandle) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn message(id: &str, secs: i64, content: &str) -> Message {
    Message {
        id: id.to_owned(),
        timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        role: Role::Assistant,
        content: content.to_owned(),
        tool: None,
        images: Vec::new(),
        edit: None,
    }
}

pub fn edit_message(id: &str, secs: i64, old: &str, new: &str) -> Message {
    Message {
        role: Role::Tool,
        edit: Some(EditPayload::Replace { old: old.to_owned(), new: new.to_owned() }),
        ..message(id, secs, "Edit")
    }
}

/// `count` assistant messages `m0..` with ascending timestamps.
pub fn transcript(count: usize, prompt: &str) -> ParseResult {
    ParseResult {
        messages: (0..count).map(|i| message(&format!("m{i}"), i as i64, "hi")).collect(),
        last_user_prompt: Some(prompt.to_owned()),
    }
}

/// Waits for the next event matching `pick`, skipping others.
pub async fn next_matching<T>(
    rx: &mut UnboundedReceiver<AppEvent>,
    mut pick: impl FnMut(AppEvent) -> Option<T>,
) -> T {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within 5s")
            .expect("event channel closed");
        if let Some(found) = pick(event) {
            return found;
        }
    }
}

pub async fn next_sync(rx: &mut UnboundedReceiver<AppEvent>) -> SyncEvent {
    next_matching(rx, |event| match event {
        AppEvent::Sync(sync) => Some(*sync),
        _ => None,
    })
    .await
}
