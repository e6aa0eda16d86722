//! Background diffing for large edits.
//!
//! Small edits are diffed inline on the owner loop. Edits whose LCS table would
//! be large are handed to a [`worker::DiffWorkerPool`]: a few named OS threads
//! pulling [`types::DiffRequest`]s off a shared `crossbeam_channel` and sending
//! results back as `AppEvent::DiffResult`.
pub mod types;
pub mod worker;
