//! Session-scoped message storage.
//!
//! [`TranscriptStore`] is the seam between the sync coordinator and whatever
//! keeps parsed transcripts around between runs. Two implementations ship:
//! [`crate::db::SqliteStore`] for persistent storage and [`MemoryStore`] for
//! tests and throwaway runs.
//!
//! Every method is scoped to one session id; no call may observe or modify
//! another session's rows.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::types::{Message, ParseResult, SessionInfo};

/// Storage for parsed transcripts, shared across sessions.
///
/// Methods return `Send` futures so they can run on background tokio tasks.
pub trait TranscriptStore: Send + Sync + 'static {
    /// Merges a full parse of a session log into storage.
    ///
    /// Idempotent: syncing the same result twice leaves the store unchanged.
    /// The result is authoritative, so messages absent from it are removed.
    fn sync_from_parse_result(
        &self,
        session_id: &str,
        result: &ParseResult,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns the session's messages in canonical (timestamp) order.
    fn read_messages(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;

    /// Returns the session summary, or `None` if the session was never synced.
    fn read_session_info(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<SessionInfo>, StoreError>> + Send;

    /// Whether the store already holds data for the session.
    fn has_data(&self, session_id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

#[derive(Debug, Clone)]
struct SessionRecord {
    messages: Vec<Message>,
    last_prompt: Option<String>,
    updated_at: i64,
}

/// In-process store backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sessions<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, SessionRecord>) -> T,
    ) -> Result<T, StoreError> {
        let mut sessions = self.sessions.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&mut sessions))
    }
}

impl TranscriptStore for MemoryStore {
    async fn sync_from_parse_result(
        &self,
        session_id: &str,
        result: &ParseResult,
    ) -> Result<(), StoreError> {
        let mut messages = result.messages.clone();
        messages.sort_by_key(|m| m.timestamp);
        let record = SessionRecord {
            messages,
            last_prompt: result.last_user_prompt.clone(),
            updated_at: crate::db::now_secs(),
        };
        self.with_sessions(|sessions| {
            sessions.insert(session_id.to_owned(), record);
        })
    }

    async fn read_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        self.with_sessions(|sessions| {
            sessions.get(session_id).map(|r| r.messages.clone()).unwrap_or_default()
        })
    }

    async fn read_session_info(&self, session_id: &str) -> Result<Option<SessionInfo>, StoreError> {
        self.with_sessions(|sessions| {
            sessions.get(session_id).map(|r| SessionInfo {
                session_id: session_id.to_owned(),
                last_prompt: r.last_prompt.clone(),
                message_count: r.messages.len(),
                updated_at: r.updated_at,
            })
        })
    }

    async fn has_data(&self, session_id: &str) -> Result<bool, StoreError> {
        self.with_sessions(|sessions| sessions.contains_key(session_id))
    }
}
