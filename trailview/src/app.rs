//! Central application state for trailview.
//!
//! `App` owns everything the owner loop mutates: the session list and
//! selection, the sync coordinator, the viewport and the diff cache. Every
//! `AppEvent` goes through [`App::handle`]; nothing else writes to this state.
//! Rendering lives in `output` and only reads it.

use std::collections::{HashMap, HashSet};

use trailview_core::{DiffLine, DiffStats, EditPayload, TranscriptParser, TranscriptStore};

use crate::diffs::types::{DiffRequest, DiffResultPayload};
use crate::diffs::worker::DiffWorkerPool;
use crate::event::{AppEvent, Command};
use crate::sync::{Published, SessionRef, SyncCoordinator, SyncEvent};
use crate::viewport::Viewport;
use crate::watcher::Watcher;

/// What the owner loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing visible changed.
    Idle,
    /// The transcript view changed and should be printed.
    Redraw,
    /// The operator asked for the session list.
    ListSessions,
    Quit,
}

/// A computed diff together with the payload it was computed from.
#[derive(Debug, Clone)]
pub struct CachedDiff {
    payload: EditPayload,
    pub lines: Vec<DiffLine>,
    pub stats: DiffStats,
}

#[derive(Debug, Clone)]
struct PendingDiff {
    seq: u64,
    payload: EditPayload,
}

pub struct App<S, P, W: Watcher> {
    pub sessions: Vec<SessionRef>,
    selected: Option<usize>,
    pub sync: SyncCoordinator<S, P, W>,
    pub viewport: Viewport,
    diffs: HashMap<String, CachedDiff>,
    /// Latest pool request per message id that has not come back yet.
    pending: HashMap<String, PendingDiff>,
    next_seq: u64,
    expanded: HashSet<String>,
    pool: Option<DiffWorkerPool>,
    inline_diff_limit: usize,
}

impl<S, P, W> App<S, P, W>
where
    S: TranscriptStore,
    P: TranscriptParser,
    W: Watcher,
{
    /// `pool` may be `None`, in which case every edit is diffed inline.
    pub fn new(
        sessions: Vec<SessionRef>,
        sync: SyncCoordinator<S, P, W>,
        viewport: Viewport,
        pool: Option<DiffWorkerPool>,
        inline_diff_limit: usize,
    ) -> Self {
        Self {
            sessions,
            selected: None,
            sync,
            viewport,
            diffs: HashMap::new(),
            pending: HashMap::new(),
            next_seq: 0,
            expanded: HashSet::new(),
            pool,
            inline_diff_limit,
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Selects the session at `idx` and starts loading it.
    pub fn select(&mut self, idx: usize) -> Outcome {
        let Some(session) = self.sessions.get(idx).cloned() else {
            tracing::warn!(idx, sessions = self.sessions.len(), "no such session");
            return Outcome::Idle;
        };
        self.selected = Some(idx);
        if !self.sync.load_if_needed(session) {
            return Outcome::Idle;
        }
        self.viewport.reset();
        self.diffs.clear();
        self.pending.clear();
        self.expanded.clear();
        Outcome::Redraw
    }

    pub fn handle(&mut self, event: AppEvent) -> Outcome {
        match event {
            AppEvent::Command(command) => self.handle_command(command),
            AppEvent::FileChanged(path) => {
                self.sync.on_file_changed(&path);
                Outcome::Idle
            }
            AppEvent::Sync(sync) => self.apply_sync(*sync),
            AppEvent::DiffResult(payload) => self.apply_diff(*payload),
            AppEvent::Quit => Outcome::Quit,
        }
    }

    fn handle_command(&mut self, command: Command) -> Outcome {
        match command {
            Command::Next => match self.selected {
                Some(idx) if idx + 1 < self.sessions.len() => self.select(idx + 1),
                Some(_) => Outcome::Idle,
                None => self.select(0),
            },
            Command::Prev => match self.selected {
                Some(idx) if idx > 0 => self.select(idx - 1),
                _ => Outcome::Idle,
            },
            Command::Open(idx) => self.select(idx),
            Command::More => {
                let total = self.sync.messages().len();
                if !self.viewport.has_more(total) {
                    return Outcome::Idle;
                }
                self.viewport.load_more(total);
                self.request_visible_diffs();
                Outcome::Redraw
            }
            Command::Diff(id) => {
                if !self.expanded.remove(&id) {
                    self.expanded.insert(id);
                }
                Outcome::Redraw
            }
            Command::Resync => {
                self.sync.resync();
                Outcome::Idle
            }
            Command::List => Outcome::ListSessions,
            Command::Quit => Outcome::Quit,
        }
    }

    fn apply_sync(&mut self, event: SyncEvent) -> Outcome {
        let was_loading = self.sync.is_loading();
        match self.sync.apply(event) {
            Some(published) => {
                self.on_published(published);
                Outcome::Redraw
            }
            // A failed first load still needs the "loading" marker cleared.
            None if was_loading && !self.sync.is_loading() => Outcome::Redraw,
            None => Outcome::Idle,
        }
    }

    fn on_published(&mut self, published: Published) {
        if published.first {
            self.viewport.reset();
        } else {
            self.viewport.on_messages_changed(published.old_total, published.new_total);
        }
        self.request_visible_diffs();
    }

    fn apply_diff(&mut self, result: DiffResultPayload) -> Outcome {
        if result.epoch != self.sync.epoch() {
            tracing::debug!(message = %result.message_id, epoch = result.epoch, "discarding stale diff");
            return Outcome::Idle;
        }
        // A newer request for this message may be in flight; only its result counts.
        match self.pending.get(&result.message_id) {
            Some(pending) if pending.seq == result.seq => {}
            _ => {
                tracing::debug!(message = %result.message_id, seq = result.seq, "discarding superseded diff");
                return Outcome::Idle;
            }
        }
        let Some(PendingDiff { payload, .. }) = self.pending.remove(&result.message_id) else {
            return Outcome::Idle;
        };
        let visible = self.is_visible(&result.message_id);
        self.diffs.insert(
            result.message_id,
            CachedDiff { payload, lines: result.lines, stats: result.stats },
        );
        if visible {
            Outcome::Redraw
        } else {
            Outcome::Idle
        }
    }

    fn is_visible(&self, message_id: &str) -> bool {
        self.viewport.visible(self.sync.messages()).iter().any(|m| m.id == message_id)
    }

    /// Makes sure every visible edit has a diff, computed or on its way.
    ///
    /// Small edits are diffed right here; edits whose LCS table exceeds the
    /// inline limit go to the pool. A cached diff is reused only while the
    /// message still carries the payload it was computed from.
    pub fn request_visible_diffs(&mut self) {
        let epoch = self.sync.epoch();
        let mut inline = Vec::new();
        let mut queued = Vec::new();

        for message in self.viewport.visible(self.sync.messages()) {
            let Some(payload) = &message.edit else {
                continue;
            };
            if self.diffs.get(&message.id).is_some_and(|d| &d.payload == payload)
                || self.pending.get(&message.id).is_some_and(|p| &p.payload == payload)
            {
                continue;
            }
            if self.pool.is_some() && payload.diff_cost() > self.inline_diff_limit {
                queued.push((message.id.clone(), payload.clone()));
            } else {
                inline.push((message.id.clone(), payload.clone()));
            }
        }

        for (id, payload) in inline {
            let lines = payload.diff_lines();
            let stats = trailview_core::diff::stats(&lines);
            self.pending.remove(&id);
            self.diffs.insert(id, CachedDiff { payload, lines, stats });
        }

        for (id, payload) in queued {
            let Some(pool) = &self.pool else { break };
            self.next_seq += 1;
            let seq = self.next_seq;
            let request =
                DiffRequest { epoch, message_id: id.clone(), seq, payload: payload.clone() };
            if pool.submit(request) {
                tracing::debug!(message = %id, seq, cost = payload.diff_cost(), "queued large diff");
                self.pending.insert(id, PendingDiff { seq, payload });
            }
        }
    }

    pub fn diff_for(&self, message_id: &str) -> Option<&CachedDiff> {
        self.diffs.get(message_id)
    }

    pub fn is_diff_pending(&self, message_id: &str) -> bool {
        self.pending.contains_key(message_id)
    }

    pub fn is_expanded(&self, message_id: &str) -> bool {
        self.expanded.contains(message_id)
    }

    /// Stops the watch and invalidates in-flight work before exit.
    pub fn shutdown(&mut self) {
        self.sync.dispose();
        self.pending.clear();
        // Joins the workers.
        self.pool.take();
    }
}
