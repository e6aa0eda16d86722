//! Background halves of the load sequence.
//!
//! These run on tokio tasks and never touch coordinator state. Each one ends
//! by sending exactly one `SyncEvent::Parsed` for its ticket, success or
//! failure, which is what lets the owner clear the loading flag on every path.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use trailview_core::{StoreError, SyncError, TranscriptParser, TranscriptStore};

use crate::event::AppEvent;
use crate::sync::types::{Snapshot, SyncEvent, Ticket};

/// Phase A (only on a cache hit) followed by Phase B.
pub(crate) async fn load_sequence<S, P>(
    store: Arc<S>,
    parser: Arc<P>,
    ticket: Ticket,
    path: PathBuf,
    events: UnboundedSender<AppEvent>,
) where
    S: TranscriptStore,
    P: TranscriptParser,
{
    match store.has_data(&ticket.session_id).await {
        Ok(true) => match read_snapshot(&*store, &ticket.session_id).await {
            Ok(snapshot) => {
                let cached = SyncEvent::Cached { ticket: ticket.clone(), snapshot };
                let _ = events.send(AppEvent::Sync(Box::new(cached)));
            }
            Err(err) => {
                tracing::warn!(session = %ticket.session_id, %err, "cached read failed; waiting for parse");
            }
        },
        Ok(false) => {
            tracing::debug!(session = %ticket.session_id, "no cached transcript");
        }
        Err(err) => {
            tracing::warn!(session = %ticket.session_id, %err, "cache probe failed");
        }
    }

    authoritative(store, parser, ticket, path, events).await;
}

/// Phase B: parse the whole log, merge it into the store, read it back.
pub(crate) async fn authoritative<S, P>(
    store: Arc<S>,
    parser: Arc<P>,
    ticket: Ticket,
    path: PathBuf,
    events: UnboundedSender<AppEvent>,
) where
    S: TranscriptStore,
    P: TranscriptParser,
{
    let outcome = parse_and_merge(&*store, parser, &ticket.session_id, path).await;
    let _ = events.send(AppEvent::Sync(Box::new(SyncEvent::Parsed { ticket, outcome })));
}

async fn parse_and_merge<S, P>(
    store: &S,
    parser: Arc<P>,
    session_id: &str,
    path: PathBuf,
) -> Result<Snapshot, SyncError>
where
    S: TranscriptStore,
    P: TranscriptParser,
{
    // Parsing is blocking file I/O plus JSON decoding: keep it off the async workers.
    let result = tokio::task::spawn_blocking(move || parser.parse_all(&path))
        .await
        .map_err(|err| SyncError::Worker(err.to_string()))??;

    store.sync_from_parse_result(session_id, &result).await?;
    Ok(read_snapshot(store, session_id).await?)
}

async fn read_snapshot<S: TranscriptStore>(store: &S, session_id: &str) -> Result<Snapshot, StoreError> {
    let messages = store.read_messages(session_id).await?;
    let last_prompt = store.read_session_info(session_id).await?.and_then(|info| info.last_prompt);
    Ok(Snapshot { messages, last_prompt })
}
