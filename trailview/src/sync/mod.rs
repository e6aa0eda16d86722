//! Live synchronisation of the selected session's transcript.
//!
//! [`SyncCoordinator`] owns the published message list and is driven from the
//! owner loop. Background halves of each load live in `tasks` and report back
//! through `AppEvent::Sync`.

pub mod coordinator;
mod tasks;
pub mod types;

pub use coordinator::{SessionSyncState, SyncCoordinator};
pub use types::{Published, SessionRef, Snapshot, SyncEvent, SyncPhase, Ticket};
