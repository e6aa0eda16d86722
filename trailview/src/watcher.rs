//! File watching for session logs.
//!
//! The coordinator only needs `start` / `stop`, so the OS event source sits
//! behind the [`Watcher`] trait. [`NotifyWatcher`] uses the `notify` crate's
//! recommended backend for the platform (inotify, kqueue, FSEvents or
//! ReadDirectoryChangesW) and forwards write activity to the owner loop as
//! `AppEvent::FileChanged`.

use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::mpsc::UnboundedSender;

use crate::event::AppEvent;

/// Starts and stops watches on single files.
pub trait Watcher {
    /// Owns the OS resources of one watch. Dropping it releases them.
    type Handle: Send;

    /// Begins watching `path`. Never fails: when the path is missing or the OS
    /// refuses the watch, an inert handle is returned and no events arrive.
    fn start(&self, path: &Path) -> Self::Handle;

    /// Cancels the watch and releases its OS resources before returning.
    fn stop(&self, handle: Self::Handle);
}

/// A live or inert watch created by [`NotifyWatcher`].
pub struct WatchHandle {
    inner: Option<ActiveWatch>,
}

struct ActiveWatch {
    watcher: RecommendedWatcher,
    path: PathBuf,
}

impl WatchHandle {
    pub fn inert() -> Self {
        Self { inner: None }
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.as_ref().map(|w| w.path.as_path())
    }
}

/// [`Watcher`] backed by `notify`, reporting to the owner's event channel.
pub struct NotifyWatcher {
    events: UnboundedSender<AppEvent>,
}

impl NotifyWatcher {
    pub fn new(events: UnboundedSender<AppEvent>) -> Self {
        Self { events }
    }
}

impl Watcher for NotifyWatcher {
    type Handle = WatchHandle;

    fn start(&self, path: &Path) -> WatchHandle {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "not watching missing log");
            return WatchHandle::inert();
        }

        let tx = self.events.clone();
        let watched = path.to_path_buf();
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) if is_write(&event.kind) => {
                let _ = tx.send(AppEvent::FileChanged(watched.clone()));
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(%err, "file watch error"),
        };

        let mut watcher = match RecommendedWatcher::new(handler, Config::default()) {
            Ok(watcher) => watcher,
            Err(err) => {
                tracing::warn!(%err, "file watcher unavailable; live updates disabled");
                return WatchHandle::inert();
            }
        };
        if let Err(err) = watcher.watch(path, RecursiveMode::NonRecursive) {
            tracing::warn!(path = %path.display(), %err, "cannot watch log; live updates disabled");
            return WatchHandle::inert();
        }

        tracing::debug!(path = %path.display(), "watching log");
        WatchHandle { inner: Some(ActiveWatch { watcher, path: path.to_path_buf() }) }
    }

    fn stop(&self, mut handle: WatchHandle) {
        if let Some(mut active) = handle.inner.take() {
            if let Err(err) = active.watcher.unwatch(&active.path) {
                tracing::debug!(%err, "unwatch failed; dropping watcher anyway");
            }
            tracing::debug!(path = %active.path.display(), "stopped watching log");
            // `active` drops here, closing the backend's descriptor and thread.
        }
    }
}

/// Write or extend activity. Renames, metadata and access events do not count.
pub fn is_write(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use notify::event::{AccessKind, AccessMode, CreateKind, DataChange, MetadataKind, RenameMode};

    use super::*;

    #[test]
    fn only_data_changes_count_as_writes() {
        assert!(is_write(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(is_write(&EventKind::Modify(ModifyKind::Data(DataChange::Size))));
        assert!(is_write(&EventKind::Modify(ModifyKind::Any)));

        assert!(!is_write(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))));
        assert!(!is_write(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))));
        assert!(!is_write(&EventKind::Access(AccessKind::Close(AccessMode::Write))));
        assert!(!is_write(&EventKind::Create(CreateKind::File)));
    }

    #[test]
    fn missing_path_yields_inert_handle() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let watcher = NotifyWatcher::new(tx);
        let dir = tempfile::TempDir::new().unwrap();

        let handle = watcher.start(&dir.path().join("nope.jsonl"));
        assert!(!handle.is_active());
        assert!(handle.path().is_none());
        watcher.stop(handle);
    }

    #[tokio::test]
    async fn appends_are_reported_until_stopped() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let watcher = NotifyWatcher::new(tx);
        let mut file = tempfile::NamedTempFile::new().unwrap();

        let handle = watcher.start(file.path());
        assert!(handle.is_active());
        assert_eq!(handle.path(), Some(file.path()));

        writeln!(file, "{{}}").unwrap();
        file.flush().unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no change event within 5s")
            .unwrap();
        match event {
            AppEvent::FileChanged(path) => assert_eq!(path, file.path()),
            other => panic!("unexpected event {other:?}"),
        }

        watcher.stop(handle);
    }
}
