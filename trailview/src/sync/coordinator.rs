use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use trailview_core::{Message, TranscriptParser, TranscriptStore};

use crate::event::AppEvent;
use crate::sync::tasks;
use crate::sync::types::{Published, SessionRef, Snapshot, SyncEvent, SyncPhase, Ticket};
use crate::watcher::Watcher;

/// Everything the owner knows about the selected session.
///
/// Created when a session is selected and dropped (watch stopped first) when
/// another one is selected or the coordinator is disposed.
pub struct SessionSyncState<H> {
    pub session: SessionRef,
    pub messages: Vec<Message>,
    pub last_prompt: Option<String>,
    pub loading: bool,
    pub phase: SyncPhase,
    watch: Option<H>,
    published: bool,
    in_flight: usize,
}

impl<H> SessionSyncState<H> {
    fn new(session: SessionRef, watch: H) -> Self {
        Self {
            session,
            messages: Vec::new(),
            last_prompt: None,
            loading: true,
            phase: SyncPhase::Loading,
            watch: Some(watch),
            published: false,
            in_flight: 0,
        }
    }

    /// Swaps in a whole new list; readers never see a partial one.
    fn publish(&mut self, snapshot: Snapshot) -> Published {
        let old_total = self.messages.len();
        let first = !self.published;
        self.messages = snapshot.messages;
        self.last_prompt = snapshot.last_prompt;
        self.published = true;
        Published { old_total, new_total: self.messages.len(), first }
    }

    fn differs_from(&self, snapshot: &Snapshot) -> bool {
        self.messages != snapshot.messages || self.last_prompt != snapshot.last_prompt
    }
}

/// Keeps the selected session's message list in step with its log file.
///
/// Lives on the owner loop. Loads and resyncs are dispatched to background
/// tasks whose results come back as [`SyncEvent`]s through [`apply`]; only
/// results whose ticket matches the current epoch are applied.
///
/// [`apply`]: SyncCoordinator::apply
pub struct SyncCoordinator<S, P, W: Watcher> {
    store: Arc<S>,
    parser: Arc<P>,
    watcher: W,
    events: UnboundedSender<AppEvent>,
    epoch: u64,
    state: Option<SessionSyncState<W::Handle>>,
}

impl<S, P, W> SyncCoordinator<S, P, W>
where
    S: TranscriptStore,
    P: TranscriptParser,
    W: Watcher,
{
    pub fn new(store: Arc<S>, parser: Arc<P>, watcher: W, events: UnboundedSender<AppEvent>) -> Self {
        Self { store, parser, watcher, events, epoch: 0, state: None }
    }

    /// Selects `session` and starts loading it, unless it is already selected.
    ///
    /// Returns `true` if a load sequence was dispatched. The previous watch is
    /// stopped before the new one starts, so at most one watch is ever live.
    pub fn load_if_needed(&mut self, session: SessionRef) -> bool {
        if self.state.as_ref().is_some_and(|s| s.session == session) {
            return false;
        }

        self.teardown();
        self.epoch += 1;
        let ticket = Ticket { epoch: self.epoch, session_id: session.id.clone() };
        let path = session.path.clone();

        let watch = self.watcher.start(&path);
        let mut state = SessionSyncState::new(session, watch);
        state.in_flight = 1;
        self.state = Some(state);

        tracing::info!(session = %ticket.session_id, epoch = ticket.epoch, "loading session");
        tokio::spawn(tasks::load_sequence(
            Arc::clone(&self.store),
            Arc::clone(&self.parser),
            ticket,
            path,
            self.events.clone(),
        ));
        true
    }

    /// Handles a change notification; ignored unless `path` is the watched log.
    pub fn on_file_changed(&mut self, path: &Path) -> bool {
        match &self.state {
            Some(state) if state.session.path == path => self.resync(),
            _ => {
                tracing::trace!(path = %path.display(), "change for unselected log ignored");
                false
            }
        }
    }

    /// Re-parses the selected session's log regardless of cache state.
    pub fn resync(&mut self) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        state.in_flight += 1;
        if state.phase == SyncPhase::Ready {
            state.phase = SyncPhase::Resyncing;
        }

        let ticket = Ticket { epoch: self.epoch, session_id: state.session.id.clone() };
        tracing::debug!(session = %ticket.session_id, "resyncing session");
        tokio::spawn(tasks::authoritative(
            Arc::clone(&self.store),
            Arc::clone(&self.parser),
            ticket,
            state.session.path.clone(),
            self.events.clone(),
        ));
        true
    }

    /// Applies a background result on the owner.
    ///
    /// Returns `Some` when the published list was swapped. Stale results are
    /// dropped without touching state.
    pub fn apply(&mut self, event: SyncEvent) -> Option<Published> {
        if !self.is_current(event.ticket()) {
            tracing::debug!(
                session = %event.ticket().session_id,
                epoch = event.ticket().epoch,
                current = self.epoch,
                "discarding stale sync result"
            );
            return None;
        }
        let state = self.state.as_mut()?;

        match event {
            SyncEvent::Cached { snapshot, .. } => {
                // An authoritative result may already be on screen; never replace it with cache.
                if state.published {
                    return None;
                }
                state.loading = false;
                tracing::debug!(session = %state.session.id, messages = snapshot.messages.len(), "published cached transcript");
                Some(state.publish(snapshot))
            }
            SyncEvent::Parsed { outcome, .. } => {
                state.in_flight = state.in_flight.saturating_sub(1);
                state.loading = false;
                if state.in_flight == 0 {
                    state.phase = SyncPhase::Ready;
                }
                match outcome {
                    Ok(snapshot) if !state.published || state.differs_from(&snapshot) => {
                        tracing::debug!(session = %state.session.id, messages = snapshot.messages.len(), "published parsed transcript");
                        Some(state.publish(snapshot))
                    }
                    Ok(_) => None,
                    Err(err) => {
                        tracing::warn!(session = %state.session.id, %err, "sync failed; keeping last published transcript");
                        None
                    }
                }
            }
        }
    }

    /// Stops the watch and forgets the selection. Pending results become stale.
    pub fn dispose(&mut self) {
        self.teardown();
        self.epoch += 1;
    }

    fn teardown(&mut self) {
        if let Some(mut state) = self.state.take() {
            if let Some(watch) = state.watch.take() {
                self.watcher.stop(watch);
            }
        }
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.epoch == self.epoch
            && self.state.as_ref().is_some_and(|s| s.session.id == ticket.session_id)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn session(&self) -> Option<&SessionRef> {
        self.state.as_ref().map(|s| &s.session)
    }

    /// The published message list (empty when nothing is selected).
    pub fn messages(&self) -> &[Message] {
        self.state.as_ref().map(|s| s.messages.as_slice()).unwrap_or_default()
    }

    pub fn last_prompt(&self) -> Option<&str> {
        self.state.as_ref().and_then(|s| s.last_prompt.as_deref())
    }

    pub fn is_loading(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.loading)
    }

    pub fn phase(&self) -> SyncPhase {
        self.state.as_ref().map(|s| s.phase).unwrap_or_default()
    }
}

impl<S, P, W: Watcher> Drop for SyncCoordinator<S, P, W> {
    fn drop(&mut self) {
        if let Some(watch) = self.state.as_mut().and_then(|s| s.watch.take()) {
            self.watcher.stop(watch);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use trailview_core::MemoryStore;

    use super::*;
    use crate::testing::{next_sync, transcript, CountingWatcher, ScriptedParser};

    type TestCoordinator = SyncCoordinator<MemoryStore, ScriptedParser, CountingWatcher>;

    struct Harness {
        coordinator: TestCoordinator,
        store: Arc<MemoryStore>,
        parser: Arc<ScriptedParser>,
        watcher: CountingWatcher,
        rx: UnboundedReceiver<AppEvent>,
    }

    fn harness() -> Harness {
        let (tx, rx) = unbounded_channel();
        let store = Arc::new(MemoryStore::new());
        let parser = Arc::new(ScriptedParser::default());
        let watcher = CountingWatcher::default();
        let coordinator =
            SyncCoordinator::new(Arc::clone(&store), Arc::clone(&parser), watcher.clone(), tx);
        Harness { coordinator, store, parser, watcher, rx }
    }

    fn session(name: &str) -> SessionRef {
        SessionRef::new(name, format!("/logs/{name}.jsonl"))
    }

    #[tokio::test]
    async fn cache_miss_publishes_after_parse() {
        let mut h = harness();
        h.parser.set("/logs/a.jsonl", transcript(2, "fix it"));

        assert!(h.coordinator.load_if_needed(session("a")));
        assert!(h.coordinator.is_loading());
        assert_eq!(h.coordinator.phase(), SyncPhase::Loading);

        let event = next_sync(&mut h.rx).await;
        assert!(matches!(event, SyncEvent::Parsed { .. }));
        let published = h.coordinator.apply(event).unwrap();
        assert_eq!(published, Published { old_total: 0, new_total: 2, first: true });

        assert!(!h.coordinator.is_loading());
        assert_eq!(h.coordinator.phase(), SyncPhase::Ready);
        assert_eq!(h.coordinator.messages().len(), 2);
        assert_eq!(h.coordinator.last_prompt(), Some("fix it"));
    }

    #[tokio::test]
    async fn load_is_a_no_op_for_the_selected_session() {
        let mut h = harness();
        assert!(h.coordinator.load_if_needed(session("a")));
        assert!(!h.coordinator.load_if_needed(session("a")));

        let event = next_sync(&mut h.rx).await;
        h.coordinator.apply(event);
        assert_eq!(h.parser.calls(), 1);
        assert_eq!(h.coordinator.epoch(), 1);
        assert_eq!(h.watcher.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_hit_publishes_first_and_identical_parse_does_not_republish() {
        let mut h = harness();
        let result = transcript(3, "again");
        h.store.sync_from_parse_result("a", &result).await.unwrap();
        h.parser.set("/logs/a.jsonl", result);

        h.coordinator.load_if_needed(session("a"));

        let cached = next_sync(&mut h.rx).await;
        assert!(matches!(cached, SyncEvent::Cached { .. }));
        let published = h.coordinator.apply(cached).unwrap();
        assert!(published.first);
        assert_eq!(published.new_total, 3);
        assert!(!h.coordinator.is_loading());
        assert_eq!(h.coordinator.phase(), SyncPhase::Loading);

        let parsed = next_sync(&mut h.rx).await;
        assert!(matches!(parsed, SyncEvent::Parsed { .. }));
        assert_eq!(h.coordinator.apply(parsed), None);
        assert_eq!(h.coordinator.phase(), SyncPhase::Ready);
        assert_eq!(h.coordinator.messages().len(), 3);
    }

    #[tokio::test]
    async fn results_for_a_replaced_session_are_discarded() {
        let mut h = harness();
        h.parser.set("/logs/a.jsonl", transcript(5, "a"));
        h.parser.set("/logs/b.jsonl", transcript(1, "b"));

        h.coordinator.load_if_needed(session("a"));
        h.coordinator.load_if_needed(session("b"));

        let mut publishes = 0;
        for _ in 0..2 {
            let event = next_sync(&mut h.rx).await;
            if h.coordinator.apply(event).is_some() {
                publishes += 1;
            }
        }

        assert_eq!(publishes, 1);
        assert_eq!(h.coordinator.session().map(|s| s.id.as_str()), Some("b"));
        assert_eq!(h.coordinator.messages().len(), 1);
        assert_eq!(h.coordinator.last_prompt(), Some("b"));
    }

    #[tokio::test]
    async fn revisiting_a_session_discards_the_earlier_visit() {
        let mut h = harness();
        h.parser.set("/logs/a.jsonl", transcript(2, "a"));

        h.coordinator.load_if_needed(session("a"));
        h.coordinator.load_if_needed(session("b"));
        h.coordinator.load_if_needed(session("a"));
        assert_eq!(h.coordinator.epoch(), 3);

        let mut applied_epochs = Vec::new();
        for _ in 0..3 {
            let event = next_sync(&mut h.rx).await;
            let epoch = event.ticket().epoch;
            if h.coordinator.apply(event).is_some() {
                applied_epochs.push(epoch);
            }
        }
        assert_eq!(applied_epochs, vec![3]);
    }

    #[tokio::test]
    async fn appended_messages_republish_as_non_first() {
        let mut h = harness();
        h.parser.set("/logs/a.jsonl", transcript(2, "a"));
        h.coordinator.load_if_needed(session("a"));
        let event = next_sync(&mut h.rx).await;
        h.coordinator.apply(event);

        h.parser.set("/logs/a.jsonl", transcript(3, "a"));
        assert!(h.coordinator.on_file_changed(Path::new("/logs/a.jsonl")));
        assert_eq!(h.coordinator.phase(), SyncPhase::Resyncing);

        let event = next_sync(&mut h.rx).await;
        let published = h.coordinator.apply(event).unwrap();
        assert_eq!(published, Published { old_total: 2, new_total: 3, first: false });
        assert_eq!(h.coordinator.phase(), SyncPhase::Ready);
    }

    #[tokio::test]
    async fn failed_resync_keeps_published_state() {
        let mut h = harness();
        h.parser.set("/logs/a.jsonl", transcript(4, "keep"));
        h.coordinator.load_if_needed(session("a"));
        let event = next_sync(&mut h.rx).await;
        h.coordinator.apply(event);
        let before = h.coordinator.messages().to_vec();

        h.parser.failing.store(true, Ordering::SeqCst);
        assert!(h.coordinator.resync());
        let event = next_sync(&mut h.rx).await;
        assert!(matches!(&event, SyncEvent::Parsed { outcome: Err(_), .. }));
        assert_eq!(h.coordinator.apply(event), None);

        assert_eq!(h.coordinator.messages(), before.as_slice());
        assert_eq!(h.coordinator.last_prompt(), Some("keep"));
        assert!(!h.coordinator.is_loading());
        assert_eq!(h.coordinator.phase(), SyncPhase::Ready);
    }

    #[tokio::test]
    async fn failed_first_load_clears_loading() {
        let mut h = harness();
        h.parser.failing.store(true, Ordering::SeqCst);
        h.coordinator.load_if_needed(session("a"));

        let event = next_sync(&mut h.rx).await;
        assert_eq!(h.coordinator.apply(event), None);
        assert!(!h.coordinator.is_loading());
        assert!(h.coordinator.messages().is_empty());
    }

    #[tokio::test]
    async fn phase_waits_for_every_outstanding_resync() {
        let mut h = harness();
        h.parser.set("/logs/a.jsonl", transcript(1, "a"));
        h.coordinator.load_if_needed(session("a"));
        let event = next_sync(&mut h.rx).await;
        h.coordinator.apply(event);

        h.coordinator.resync();
        h.coordinator.resync();
        let first = next_sync(&mut h.rx).await;
        h.coordinator.apply(first);
        assert_eq!(h.coordinator.phase(), SyncPhase::Resyncing);
        let second = next_sync(&mut h.rx).await;
        h.coordinator.apply(second);
        assert_eq!(h.coordinator.phase(), SyncPhase::Ready);
    }

    #[tokio::test]
    async fn at_most_one_watch_is_live() {
        let mut h = harness();
        for name in ["a", "b", "c", "b"] {
            h.coordinator.load_if_needed(session(name));
            assert_eq!(h.watcher.live(), 1);
        }
        assert_eq!(h.watcher.stopped.load(Ordering::SeqCst), 3);

        h.coordinator.dispose();
        assert_eq!(h.watcher.live(), 0);
        assert!(h.coordinator.session().is_none());
        assert_eq!(h.coordinator.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn dispose_makes_pending_results_stale() {
        let mut h = harness();
        h.parser.set("/logs/a.jsonl", transcript(2, "a"));
        h.coordinator.load_if_needed(session("a"));
        h.coordinator.dispose();

        let event = next_sync(&mut h.rx).await;
        assert_eq!(h.coordinator.apply(event), None);
        assert!(h.coordinator.messages().is_empty());
    }

    #[tokio::test]
    async fn file_changes_for_other_paths_are_ignored() {
        let mut h = harness();
        assert!(!h.coordinator.on_file_changed(Path::new("/logs/a.jsonl")));
        assert!(!h.coordinator.resync());

        h.coordinator.load_if_needed(session("a"));
        let event = next_sync(&mut h.rx).await;
        h.coordinator.apply(event);

        assert!(!h.coordinator.on_file_changed(Path::new("/logs/other.jsonl")));
        assert!(h.coordinator.on_file_changed(Path::new("/logs/a.jsonl")));
        let event = next_sync(&mut h.rx).await;
        h.coordinator.apply(event);
        assert_eq!(h.parser.calls(), 2);
    }
}
