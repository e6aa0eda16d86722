//! Owned data types for the diff worker threads.
//!
//! Requests and results are fully owned and `Send` so they can cross from the
//! owner loop to the pool threads and back without borrowing session state.

use trailview_core::{DiffLine, DiffStats, EditPayload};

/// One edit to diff, sent from the owner loop to the pool.
#[derive(Debug, Clone)]
pub struct DiffRequest {
    /// Sync epoch the request was issued under; results from older epochs are dropped.
    pub epoch: u64,
    /// Id of the tool message carrying the edit.
    pub message_id: String,
    /// Distinguishes successive requests for the same message.
    pub seq: u64,
    pub payload: EditPayload,
}

/// Result sent back to the owner loop.
///
/// Carried inside `AppEvent::DiffResult(Box<DiffResultPayload>)`. Using `Box`
/// keeps the enum variant small on the channel, since a diff of a large file
/// can hold thousands of lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResultPayload {
    pub epoch: u64,
    pub message_id: String,
    /// Copied from the request; only the latest request for a message is applied.
    pub seq: u64,
    /// The rendered diff in display order.
    pub lines: Vec<DiffLine>,
    pub stats: DiffStats,
}

impl DiffResultPayload {
    /// Diffs `request` on the calling thread.
    pub fn compute(request: DiffRequest) -> Self {
        let lines = request.payload.diff_lines();
        let stats = trailview_core::diff::stats(&lines);
        Self { epoch: request.epoch, message_id: request.message_id, seq: request.seq, lines, stats }
    }
}
