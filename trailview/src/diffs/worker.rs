//! Thread pool that computes large diffs off the owner loop.
//!
//! All communication is via channels: `DiffRequest` in over a crossbeam MPMC
//! channel shared by every worker, `AppEvent::DiffResult` out over the owner's
//! tokio channel. Workers exit when the request sender is dropped.

use std::io;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::mpsc::UnboundedSender;

use crate::diffs::types::{DiffRequest, DiffResultPayload};
use crate::event::AppEvent;

/// Owns the worker threads and the sending half of the request channel.
///
/// Dropping the pool closes the channel and joins every worker, so no thread
/// outlives the owner loop.
pub struct DiffWorkerPool {
    tx: Option<Sender<DiffRequest>>,
    workers: Vec<JoinHandle<()>>,
}

impl DiffWorkerPool {
    /// Starts `workers` threads (at least one) reporting to `event_tx`.
    pub fn spawn(workers: usize, event_tx: UnboundedSender<AppEvent>) -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut handles = Vec::with_capacity(workers.max(1));
        for idx in 0..workers.max(1) {
            let rx = rx.clone();
            let event_tx = event_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("diff-worker-{idx}"))
                .spawn(move || diff_worker_loop(rx, event_tx))?;
            handles.push(handle);
        }
        tracing::debug!(workers = handles.len(), "diff worker pool started");
        Ok(Self { tx: Some(tx), workers: handles })
    }

    /// Queues a request. Returns `false` if the pool has shut down.
    pub fn submit(&self, request: DiffRequest) -> bool {
        match &self.tx {
            Some(tx) => tx.send(request).is_ok(),
            None => false,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for DiffWorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker's `for` loop.
        self.tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("diff worker panicked");
            }
        }
    }
}

/// Body of each worker thread: diff requests until the channel closes.
pub fn diff_worker_loop(rx: Receiver<DiffRequest>, event_tx: UnboundedSender<AppEvent>) {
    for request in rx {
        tracing::trace!(message = %request.message_id, "diffing edit");
        let payload = DiffResultPayload::compute(request);
        if event_tx.send(AppEvent::DiffResult(Box::new(payload))).is_err() {
            // Owner loop is gone; nothing left to report to.
            break;
        }
    }
}
