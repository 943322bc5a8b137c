//! Transaction coordinator for the session's single implicit transaction
//!
//! A session has exactly one transaction open at any time. It ends with
//! `commit` or `rollback`, and the next statement starts a new one.
//!
//! The TransactionCoordinator ties the three pieces of transaction state
//! together:
//! - the table store's snapshot
//! - the surrogate journal (upgrades and invalidations)
//! - the buffered structural-change events
//!
//! On commit the events are released to subscribers; on rollback they are
//! discarded and every surrogate upgraded in the transaction goes back to
//! being in construction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chronicle_core::{
    BufferedPublisher, ObjectKind, SurrogateCache, UpdateEvent, UpdateEventPublisher,
    UpdateEventSubscriber,
};
use chronicle_storage::MemoryStore;
use tracing::{debug, info};

/// Transaction coordinator for the database
///
/// # Memory Ordering
///
/// The metric counters use Relaxed ordering: they are purely observational
/// and synchronize nothing else.
pub struct TransactionCoordinator {
    /// Event buffer, released on commit
    publisher: Arc<dyn UpdateEventPublisher>,
    /// Total commits - uses Relaxed ordering
    total_committed: AtomicU64,
    /// Total rollbacks - uses Relaxed ordering
    total_rolled_back: AtomicU64,
    /// Events delivered to subscribers - uses Relaxed ordering
    events_released: AtomicU64,
    /// Events dropped by rollbacks - uses Relaxed ordering
    events_discarded: AtomicU64,
}

impl TransactionCoordinator {
    /// Coordinator with an in-process buffered publisher
    pub fn new() -> Self {
        Self::with_publisher(Arc::new(BufferedPublisher::new()))
    }

    /// Coordinator over an external publisher
    pub fn with_publisher(publisher: Arc<dyn UpdateEventPublisher>) -> Self {
        Self {
            publisher,
            total_committed: AtomicU64::new(0),
            total_rolled_back: AtomicU64::new(0),
            events_released: AtomicU64::new(0),
            events_discarded: AtomicU64::new(0),
        }
    }

    /// Queue a structural change until the transaction ends
    pub fn publish(&self, event: UpdateEvent) {
        debug!(target: "chronicle::txn", event = %event, "event queued");
        self.publisher.publish(event);
    }

    /// Register a subscriber for some object kinds (all kinds when empty)
    pub fn subscribe(&self, kinds: &[ObjectKind], subscriber: Arc<dyn UpdateEventSubscriber>) {
        self.publisher.subscribe(kinds, subscriber);
    }

    /// Number of events waiting for the end of the transaction
    pub fn pending_events(&self) -> usize {
        self.publisher.pending()
    }

    /// Commit the store and the surrogate journal, then release events
    ///
    /// Returns the number of events delivered.
    pub fn commit(&self, store: &MemoryStore, cache: &SurrogateCache) -> usize {
        let writes = store.commit();
        cache.commit();
        let released = self.publisher.release();
        self.total_committed.fetch_add(1, Ordering::Relaxed);
        self.events_released
            .fetch_add(released as u64, Ordering::Relaxed);
        info!(target: "chronicle::txn", writes, events = released, "Transaction committed");
        released
    }

    /// Undo store writes and surrogate upgrades, then drop queued events
    ///
    /// Returns the number of events discarded.
    pub fn rollback(&self, store: &MemoryStore, cache: &SurrogateCache) -> usize {
        let writes = store.rollback();
        let restored = cache.rollback();
        let discarded = self.publisher.clear();
        self.total_rolled_back.fetch_add(1, Ordering::Relaxed);
        self.events_discarded
            .fetch_add(discarded as u64, Ordering::Relaxed);
        info!(
            target: "chronicle::txn",
            writes,
            surrogates = restored,
            events = discarded,
            "Transaction rolled back"
        );
        discarded
    }

    /// Get transaction metrics
    pub fn metrics(&self) -> TransactionMetrics {
        TransactionMetrics {
            total_committed: self.total_committed.load(Ordering::Relaxed),
            total_rolled_back: self.total_rolled_back.load(Ordering::Relaxed),
            events_released: self.events_released.load(Ordering::Relaxed),
            events_discarded: self.events_discarded.load(Ordering::Relaxed),
            pending_events: self.publisher.pending() as u64,
        }
    }
}

impl Default for TransactionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Transaction metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionMetrics {
    /// Total number of commits
    pub total_committed: u64,
    /// Total number of rollbacks
    pub total_rolled_back: u64,
    /// Events delivered to subscribers
    pub events_released: u64,
    /// Events discarded by rollbacks
    pub events_discarded: u64,
    /// Events queued in the open transaction
    pub pending_events: u64,
}

impl TransactionMetrics {
    /// Total transactions that ended (committed + rolled back)
    pub fn total_completed(&self) -> u64 {
        self.total_committed + self.total_rolled_back
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::{ObjectId, StoreId, UpdateEventOperation};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<UpdateEvent>>);

    impl UpdateEventSubscriber for Recorder {
        fn notify(&self, event: &UpdateEvent) {
            self.0.lock().push(event.clone());
        }
    }

    fn event() -> UpdateEvent {
        UpdateEvent::new(ObjectKind::Chronicle, UpdateEventOperation::Create, None)
    }

    #[test]
    fn test_coordinator_new() {
        let coordinator = TransactionCoordinator::new();
        let metrics = coordinator.metrics();
        assert_eq!(metrics.total_completed(), 0);
        assert_eq!(metrics.pending_events, 0);
    }

    #[test]
    fn test_commit_releases_events() {
        let coordinator = TransactionCoordinator::new();
        let recorder = Arc::new(Recorder::default());
        coordinator.subscribe(&[], recorder.clone());
        let store = MemoryStore::new();
        let cache = SurrogateCache::new(StoreId::new());

        coordinator.publish(event());
        coordinator.publish(event());
        assert!(recorder.0.lock().is_empty());
        assert_eq!(coordinator.commit(&store, &cache), 2);
        assert_eq!(recorder.0.lock().len(), 2);

        let metrics = coordinator.metrics();
        assert_eq!(metrics.total_committed, 1);
        assert_eq!(metrics.events_released, 2);
    }

    #[test]
    fn test_rollback_discards_events_and_upgrades() {
        let coordinator = TransactionCoordinator::new();
        let recorder = Arc::new(Recorder::default());
        coordinator.subscribe(&[ObjectKind::Chronicle], recorder.clone());
        let store = MemoryStore::new();
        let cache = SurrogateCache::new(StoreId::new());

        let surrogate = cache.in_construction(ObjectKind::Chronicle);
        cache.upgrade(&surrogate, ObjectId::new(7).unwrap()).unwrap();
        coordinator.publish(event());

        assert_eq!(coordinator.rollback(&store, &cache), 1);
        assert!(surrogate.is_in_construction());
        assert!(recorder.0.lock().is_empty());
        assert_eq!(coordinator.metrics().events_discarded, 1);
        assert_eq!(coordinator.commit(&store, &cache), 0);
    }
}
