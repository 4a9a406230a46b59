// Debounced autosave scheduler.
//
// Coalesces rapid edits to the same document into a single delayed write.
// Each document owns at most one armed timer; a new edit cancels it and
// re-arms with the latest payload, so intermediate states inside the window
// are never written. Explicit saves cancel the timer and write immediately.
//
//   Idle --schedule--> Armed --fire/cancel--> Idle
//   Armed --schedule--> Armed (timer reset, payload replaced)
//
// A fired timer leaves the slot map before its write starts; `settle` waits
// for such in-flight writes to finish.
//
// There is no retry state. A failed write returns the slot to Idle and is
// reported on the event channel; the next edit re-arms.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use idox_common::types::{Document, DocumentPatch};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::AutosaveConfig;
use crate::error::Notice;
use crate::store::{DocumentStore, StoreError};

/// Opaque handle for one armed timer. Only the scheduler interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

/// A save waiting for its debounce window to elapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub document_id: Uuid,
    pub content: String,
    pub title: Option<String>,
    pub armed_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    /// Fired by the debounce timer.
    Debounced,
    /// Requested directly through `flush`.
    Explicit,
}

/// Outcome of a write, reported for both triggers.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveEvent {
    Saved { document_id: Uuid, trigger: SaveTrigger, document: Document },
    Failed { document_id: Uuid, trigger: SaveTrigger, message: String },
}

impl SaveEvent {
    pub fn document_id(&self) -> Uuid {
        match self {
            Self::Saved { document_id, .. } | Self::Failed { document_id, .. } => *document_id,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }

    pub fn notice(&self) -> Notice {
        match self {
            Self::Saved { .. } => Notice::info("Auto-saved", "All changes saved."),
            Self::Failed { message, .. } => Notice::destructive("Failed to save document", message),
        }
    }
}

struct ArmedSlot {
    token: TimerToken,
    request: PendingSave,
    timer: JoinHandle<()>,
}

struct SchedulerInner<S> {
    store: S,
    window: Duration,
    slots: Mutex<HashMap<Uuid, ArmedSlot>>,
    next_token: AtomicU64,
    in_flight: AtomicUsize,
    settled: Notify,
    events: mpsc::UnboundedSender<SaveEvent>,
}

/// Counts one debounced write as in flight until dropped.
struct InFlight<'a, S: DocumentStore>(&'a SchedulerInner<S>);

impl<S: DocumentStore> Drop for InFlight<'_, S> {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.settled.notify_waiters();
        }
    }
}

impl<S: DocumentStore> SchedulerInner<S> {
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<Uuid, ArmedSlot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remove the armed slot for `document_id`, aborting its timer.
    fn disarm(&self, document_id: Uuid) -> Option<PendingSave> {
        let slot = self.lock_slots().remove(&document_id)?;
        slot.timer.abort();
        Some(slot.request)
    }

    async fn fire(&self, document_id: Uuid, token: TimerToken) {
        let request = {
            let mut slots = self.lock_slots();
            let current = slots.get(&document_id).is_some_and(|slot| slot.token == token);
            if !current {
                None
            } else {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                slots.remove(&document_id).map(|slot| (slot.request, InFlight(self)))
            }
        };

        let Some((request, _in_flight)) = request else {
            trace!(doc_id = %document_id, ?token, "stale autosave timer ignored");
            return;
        };
        let _ = self.persist(request, SaveTrigger::Debounced).await;
    }

    async fn persist(
        &self,
        request: PendingSave,
        trigger: SaveTrigger,
    ) -> Result<Document, StoreError> {
        let document_id = request.document_id;
        let patch = DocumentPatch::content(request.content, request.title, Utc::now());
        let result = self.store.update(document_id, patch).await;

        let event = match &result {
            Ok(document) => {
                info!(doc_id = %document_id, ?trigger, "document saved");
                SaveEvent::Saved { document_id, trigger, document: document.clone() }
            }
            Err(error) => {
                warn!(doc_id = %document_id, ?trigger, %error, "document save failed");
                SaveEvent::Failed { document_id, trigger, message: error.to_string() }
            }
        };
        if self.events.send(event).is_err() {
            trace!(doc_id = %document_id, "save event receiver dropped");
        }
        result
    }
}

/// Owns one cancellable timer slot per document.
///
/// Must be used from within a tokio runtime. Dropping the scheduler cancels
/// every armed timer without firing it.
pub struct SaveScheduler<S: DocumentStore> {
    inner: Arc<SchedulerInner<S>>,
}

impl<S: DocumentStore> SaveScheduler<S> {
    pub fn new(store: S, config: &AutosaveConfig) -> (Self, mpsc::UnboundedReceiver<SaveEvent>) {
        Self::with_window(store, config.window())
    }

    pub fn with_window(store: S, window: Duration) -> (Self, mpsc::UnboundedReceiver<SaveEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SchedulerInner {
            store,
            window,
            slots: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            in_flight: AtomicUsize::new(0),
            settled: Notify::new(),
            events,
        });
        (Self { inner }, events_rx)
    }

    pub fn window(&self) -> Duration {
        self.inner.window
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Arm (or re-arm) the document's timer with the latest content.
    ///
    /// A `None` title keeps the title of the pending request it replaces.
    pub fn schedule(
        &self,
        document_id: Uuid,
        content: impl Into<String>,
        title: Option<String>,
    ) -> TimerToken {
        let token = TimerToken(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
        let mut slots = self.inner.lock_slots();

        let title = match slots.remove(&document_id) {
            Some(previous) => {
                previous.timer.abort();
                trace!(doc_id = %document_id, "autosave re-armed, previous payload superseded");
                title.or(previous.request.title)
            }
            None => title,
        };

        let request =
            PendingSave { document_id, content: content.into(), title, armed_at: Instant::now() };
        let inner = Arc::clone(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(inner.window).await;
            inner.fire(document_id, token).await;
        });
        slots.insert(document_id, ArmedSlot { token, request, timer });
        debug!(doc_id = %document_id, ?token, window_ms = self.inner.window.as_millis() as u64, "autosave armed");
        token
    }

    /// Explicit save: cancel any pending timer and write now.
    ///
    /// A `None` title keeps the title of a cancelled pending request.
    pub async fn flush(
        &self,
        document_id: Uuid,
        content: impl Into<String>,
        title: Option<String>,
    ) -> Result<Document, StoreError> {
        let pending_title = self.inner.disarm(document_id).and_then(|pending| pending.title);
        let request = PendingSave {
            document_id,
            content: content.into(),
            title: title.or(pending_title),
            armed_at: Instant::now(),
        };
        self.inner.persist(request, SaveTrigger::Explicit).await
    }

    /// Drop the document's armed timer without firing it.
    pub fn cancel(&self, document_id: Uuid) -> bool {
        let cancelled = self.inner.disarm(document_id).is_some();
        if cancelled {
            debug!(doc_id = %document_id, "autosave cancelled");
        }
        cancelled
    }

    /// Drop every armed timer without firing. Returns how many were armed.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<ArmedSlot> = self.inner.lock_slots().drain().map(|(_, slot)| slot).collect();
        for slot in &drained {
            slot.timer.abort();
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "all autosave timers cancelled");
        }
        drained.len()
    }

    pub fn is_armed(&self, document_id: Uuid) -> bool {
        self.inner.lock_slots().contains_key(&document_id)
    }

    pub fn armed_count(&self) -> usize {
        self.inner.lock_slots().len()
    }

    pub fn pending(&self, document_id: Uuid) -> Option<PendingSave> {
        self.inner.lock_slots().get(&document_id).map(|slot| slot.request.clone())
    }

    /// Debounced writes whose timer fired but whose store call has not
    /// returned yet.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no debounced write is in flight. Armed timers are not
    /// waited for; `cancel_all` or an explicit flush handles those.
    pub async fn settle(&self) {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// When the document's armed timer is due to fire.
    pub fn deadline(&self, document_id: Uuid) -> Option<Instant> {
        self.pending(document_id).map(|pending| pending.armed_at + self.inner.window)
    }
}

impl<S: DocumentStore> Drop for SaveScheduler<S> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use idox_common::types::DocumentContent;

    const WINDOW: Duration = Duration::from_millis(2_000);

    fn seeded_store() -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let id = Uuid::new_v4();
        let now = Utc::now();
        store.seed(Document {
            id,
            title: "Draft".into(),
            content: DocumentContent::html("", now),
            owner_id: "owner".into(),
            is_public: false,
            share_code: None,
            password_hash: None,
            created_at: now,
            updated_at: now,
        });
        (store, id)
    }

    fn written_contents(store: &MemoryStore) -> Vec<(String, Option<String>)> {
        store
            .updates()
            .into_iter()
            .map(|(_, patch)| (patch.content.map(|c| c.html).unwrap_or_default(), patch.title))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_last_write() {
        let (store, id) = seeded_store();
        let (scheduler, mut events) = SaveScheduler::with_window(store.clone(), WINDOW);

        scheduler.schedule(id, "a", None);
        tokio::time::sleep(Duration::from_millis(500)).await;
        scheduler.schedule(id, "b", None);
        assert_eq!(scheduler.armed_count(), 1);

        let event = events.recv().await.expect("save event");
        assert!(event.is_saved());
        assert_eq!(written_contents(&store), vec![("b".to_string(), None)]);
        assert!(!scheduler.is_armed(id));
    }

    #[tokio::test(start_paused = true)]
    async fn re_arming_resets_the_timer() {
        let (store, id) = seeded_store();
        let (scheduler, _events) = SaveScheduler::with_window(store.clone(), WINDOW);

        scheduler.schedule(id, "a", None);
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        scheduler.schedule(id, "ab", None);

        // 2000ms after the first edit, only 500ms after the second.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(store.updates().is_empty());
        assert!(scheduler.is_armed(id));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(written_contents(&store), vec![("ab".to_string(), None)]);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_waits_for_in_flight_write() {
        let (store, id) = seeded_store();
        store.set_update_delay(Duration::from_millis(5_000));
        let (scheduler, mut events) = SaveScheduler::with_window(store.clone(), WINDOW);

        scheduler.schedule(id, "typed", None);
        tokio::time::sleep(WINDOW + Duration::from_millis(10)).await;
        assert!(!scheduler.is_armed(id));
        assert_eq!(scheduler.in_flight_count(), 1);
        assert!(events.try_recv().is_err());

        scheduler.settle().await;
        assert_eq!(scheduler.in_flight_count(), 0);
        assert!(events.try_recv().expect("save event after settle").is_saved());
        assert_eq!(written_contents(&store), vec![("typed".to_string(), None)]);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_returns_at_once_when_idle() {
        let (store, id) = seeded_store();
        let (scheduler, _events) = SaveScheduler::with_window(store, WINDOW);
        scheduler.schedule(id, "armed only", None);
        scheduler.settle().await;
        assert!(scheduler.is_armed(id));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_window_writes_nothing() {
        let (store, id) = seeded_store();
        let (scheduler, _events) = SaveScheduler::with_window(store.clone(), WINDOW);

        scheduler.schedule(id, "a", None);
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));

        tokio::time::sleep(WINDOW * 2).await;
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_scheduler_cancels_armed_timers() {
        let (store, id) = seeded_store();
        let (scheduler, _events) = SaveScheduler::with_window(store.clone(), WINDOW);

        scheduler.schedule(id, "a", None);
        drop(scheduler);

        tokio::time::sleep(WINDOW * 2).await;
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_flush_cancels_pending_timer() {
        let (store, id) = seeded_store();
        let (scheduler, mut events) = SaveScheduler::with_window(store.clone(), WINDOW);

        scheduler.schedule(id, "a", None);
        let saved = scheduler.flush(id, "a", Some("T".into())).await.unwrap();
        assert_eq!(saved.title, "T");
        assert!(!scheduler.is_armed(id));

        tokio::time::sleep(WINDOW * 2).await;
        assert_eq!(written_contents(&store), vec![("a".to_string(), Some("T".to_string()))]);

        match events.recv().await.expect("save event") {
            SaveEvent::Saved { trigger, .. } => assert_eq!(trigger, SaveTrigger::Explicit),
            other => panic!("expected saved event, got {other:?}"),
        }
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_keeps_title_of_cancelled_request() {
        let (store, id) = seeded_store();
        let (scheduler, _events) = SaveScheduler::with_window(store.clone(), WINDOW);

        scheduler.schedule(id, "a", Some("Renamed".into()));
        scheduler.flush(id, "ab", None).await.unwrap();
        assert_eq!(
            written_contents(&store),
            vec![("ab".to_string(), Some("Renamed".to_string()))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_without_title_keeps_pending_title() {
        let (store, id) = seeded_store();
        let (scheduler, mut events) = SaveScheduler::with_window(store.clone(), WINDOW);

        scheduler.schedule(id, "a", Some("New title".into()));
        scheduler.schedule(id, "ab", None);
        assert_eq!(scheduler.pending(id).unwrap().title.as_deref(), Some("New title"));

        events.recv().await.expect("save event");
        assert_eq!(
            written_contents(&store),
            vec![("ab".to_string(), Some("New title".to_string()))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_is_reported_and_not_retried() {
        let (store, id) = seeded_store();
        store.set_fail_writes(true);
        let (scheduler, mut events) = SaveScheduler::with_window(store.clone(), WINDOW);

        scheduler.schedule(id, "a", None);
        let event = events.recv().await.expect("failure event");
        assert!(matches!(
            &event,
            SaveEvent::Failed { trigger: SaveTrigger::Debounced, .. }
        ));
        assert!(event.notice().is_error());
        assert!(!scheduler.is_armed(id));

        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(store.write_calls(), 1);

        // The next edit re-arms and tries again.
        store.set_fail_writes(false);
        scheduler.schedule(id, "ab", None);
        assert!(events.recv().await.expect("save event").is_saved());
        assert_eq!(written_contents(&store), vec![("ab".to_string(), None)]);
    }

    #[tokio::test(start_paused = true)]
    async fn documents_are_debounced_independently() {
        let (store, first) = seeded_store();
        let second = Uuid::new_v4();
        let now = Utc::now();
        store.seed(Document {
            id: second,
            title: "Other".into(),
            content: DocumentContent::html("", now),
            owner_id: "owner".into(),
            is_public: false,
            share_code: None,
            password_hash: None,
            created_at: now,
            updated_at: now,
        });
        let (scheduler, mut events) = SaveScheduler::with_window(store.clone(), WINDOW);

        scheduler.schedule(first, "one", None);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        scheduler.schedule(second, "two", None);
        assert_eq!(scheduler.armed_count(), 2);

        let first_event = events.recv().await.unwrap();
        assert_eq!(first_event.document_id(), first);
        assert!(scheduler.is_armed(second));

        let second_event = events.recv().await.unwrap();
        assert_eq!(second_event.document_id(), second);
        assert_eq!(scheduler.armed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_reports_armed_count() {
        let (store, id) = seeded_store();
        let (scheduler, _events) = SaveScheduler::with_window(store.clone(), WINDOW);
        scheduler.schedule(id, "a", None);
        scheduler.schedule(Uuid::new_v4(), "b", None);
        assert_eq!(scheduler.cancel_all(), 2);
        assert_eq!(scheduler.cancel_all(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_tracks_latest_schedule() {
        let (store, id) = seeded_store();
        let (scheduler, _events) = SaveScheduler::with_window(store, WINDOW);
        assert!(scheduler.deadline(id).is_none());

        let start = Instant::now();
        scheduler.schedule(id, "a", None);
        assert_eq!(scheduler.deadline(id), Some(start + WINDOW));

        tokio::time::sleep(Duration::from_millis(300)).await;
        scheduler.schedule(id, "b", None);
        assert_eq!(scheduler.deadline(id), Some(start + Duration::from_millis(300) + WINDOW));
    }

    #[test]
    fn config_window_feeds_scheduler() {
        let (scheduler, _events) =
            SaveScheduler::new(MemoryStore::new(), &AutosaveConfig::with_millis(750));
        assert_eq!(scheduler.window(), Duration::from_millis(750));

        let (clamped, _events) =
            SaveScheduler::new(MemoryStore::new(), &AutosaveConfig::with_millis(1));
        assert_eq!(clamped.window(), Duration::from_millis(100));
    }
}
