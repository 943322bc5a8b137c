//! Surrogate identity handles and the surrogate cache
//!
//! A [`Surrogate`] is the identity every in-memory object carries: the store it
//! belongs to, its [`ObjectKind`], and its internal id once assigned. Clones of
//! a surrogate share one cell, so upgrading a handle that is still in
//! construction is observed by every holder.
//!
//! ## Lifecycle
//!
//! ```text
//! InConstruction --upgrade--> Assigned --invalidate--> Invalidated
//!        ^                       |
//!        +------ rollback -------+
//! ```
//!
//! The [`SurrogateCache`] hands out one surrogate per persisted row and keeps a
//! journal of upgrades and invalidations made during the current transaction so
//! that rollback can restore the pre-transaction state.

use crate::error::{Error, Result};
use crate::types::{ObjectId, ObjectKind, StoreId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    InConstruction,
    Assigned(ObjectId),
    Invalidated(ObjectId),
}

struct Cell {
    store: StoreId,
    kind: ObjectKind,
    slot: Mutex<Slot>,
}

/// Shared, upgrade-once identity handle
#[derive(Clone)]
pub struct Surrogate {
    cell: Arc<Cell>,
}

impl Surrogate {
    /// New handle for an object not yet persisted
    pub fn in_construction(store: StoreId, kind: ObjectKind) -> Self {
        Self::with_slot(store, kind, Slot::InConstruction)
    }

    fn with_slot(store: StoreId, kind: ObjectKind, slot: Slot) -> Self {
        Surrogate {
            cell: Arc::new(Cell {
                store,
                kind,
                slot: Mutex::new(slot),
            }),
        }
    }

    /// Store this surrogate belongs to
    pub fn store(&self) -> StoreId {
        self.cell.store
    }

    /// Kind of the object
    pub fn kind(&self) -> ObjectKind {
        self.cell.kind
    }

    /// Internal id, failing for handles in construction or invalidated
    pub fn id(&self) -> Result<ObjectId> {
        match *self.cell.slot.lock() {
            Slot::Assigned(id) => Ok(id),
            Slot::InConstruction => Err(Error::identity(self.kind(), "object is in construction")),
            Slot::Invalidated(id) => Err(Error::identity(
                self.kind(),
                format!("object {} was deleted", id),
            )),
        }
    }

    /// Internal id when assigned
    pub fn assigned_id(&self) -> Option<ObjectId> {
        match *self.cell.slot.lock() {
            Slot::Assigned(id) => Some(id),
            _ => None,
        }
    }

    /// True until the first successful upgrade
    pub fn is_in_construction(&self) -> bool {
        *self.cell.slot.lock() == Slot::InConstruction
    }

    /// True once the owning row was deleted
    pub fn is_invalidated(&self) -> bool {
        matches!(*self.cell.slot.lock(), Slot::Invalidated(_))
    }

    /// True if both handles share the same cell
    pub fn same_instance(&self, other: &Surrogate) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    fn upgrade(&self, id: ObjectId) -> Result<()> {
        let mut slot = self.cell.slot.lock();
        match *slot {
            Slot::InConstruction => {
                *slot = Slot::Assigned(id);
                Ok(())
            }
            Slot::Assigned(current) => Err(Error::identity(
                self.kind(),
                format!("already assigned id {}, cannot upgrade to {}", current, id),
            )),
            Slot::Invalidated(old) => Err(Error::identity(
                self.kind(),
                format!("object {} was deleted", old),
            )),
        }
    }

    fn invalidate(&self) -> Option<ObjectId> {
        let mut slot = self.cell.slot.lock();
        match *slot {
            Slot::Assigned(id) => {
                *slot = Slot::Invalidated(id);
                Some(id)
            }
            _ => None,
        }
    }

    fn set_slot(&self, value: Slot) {
        *self.cell.slot.lock() = value;
    }
}

impl PartialEq for Surrogate {
    fn eq(&self, other: &Self) -> bool {
        if self.same_instance(other) {
            return true;
        }
        if self.store() != other.store() || self.kind() != other.kind() {
            return false;
        }
        match (self.assigned_id(), other.assigned_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Surrogate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = *self.cell.slot.lock();
        match slot {
            Slot::InConstruction => write!(f, "Surrogate({}, in construction)", self.kind()),
            Slot::Assigned(id) => write!(f, "Surrogate({}, {})", self.kind(), id),
            Slot::Invalidated(id) => write!(f, "Surrogate({}, {} invalidated)", self.kind(), id),
        }
    }
}

// =============================================================================
// Surrogate Cache
// =============================================================================

enum JournalEntry {
    Upgraded(Surrogate),
    Invalidated(Surrogate, ObjectId),
}

/// One surrogate per persisted row, plus a transaction journal
///
/// The cache is owned by one session. `assign` returns the same instance for
/// the same `(kind, id)` for as long as the row is alive.
pub struct SurrogateCache {
    store: StoreId,
    entries: Mutex<HashMap<(ObjectKind, ObjectId), Surrogate>>,
    journal: Mutex<Vec<JournalEntry>>,
}

impl SurrogateCache {
    /// Create an empty cache for a store
    pub fn new(store: StoreId) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Store served by this cache
    pub fn store(&self) -> StoreId {
        self.store
    }

    /// New in-construction surrogate for this store
    pub fn in_construction(&self, kind: ObjectKind) -> Surrogate {
        Surrogate::in_construction(self.store, kind)
    }

    /// Surrogate of a persisted row
    pub fn assign(&self, kind: ObjectKind, id: ObjectId) -> Surrogate {
        let mut entries = self.entries.lock();
        entries
            .entry((kind, id))
            .or_insert_with(|| Surrogate::with_slot(self.store, kind, Slot::Assigned(id)))
            .clone()
    }

    /// Assign an id to an in-construction surrogate, exactly once
    pub fn upgrade(&self, surrogate: &Surrogate, id: ObjectId) -> Result<()> {
        if surrogate.store() != self.store {
            return Err(Error::identity(
                surrogate.kind(),
                "surrogate belongs to another store",
            ));
        }
        surrogate.upgrade(id)?;
        self.entries
            .lock()
            .insert((surrogate.kind(), id), surrogate.clone());
        self.journal
            .lock()
            .push(JournalEntry::Upgraded(surrogate.clone()));
        debug!(target: "chronicle::identity", kind = %surrogate.kind(), id = id.get(), "upgraded surrogate");
        Ok(())
    }

    /// Permanently retire the surrogate of a deleted row
    pub fn invalidate(&self, surrogate: &Surrogate) {
        if let Some(id) = surrogate.invalidate() {
            self.entries.lock().remove(&(surrogate.kind(), id));
            self.journal
                .lock()
                .push(JournalEntry::Invalidated(surrogate.clone(), id));
        }
    }

    /// Forget the journal after a commit
    pub fn commit(&self) {
        self.journal.lock().clear();
    }

    /// Undo every upgrade and invalidation of the current transaction
    ///
    /// Returns the number of surrogates restored.
    pub fn rollback(&self) -> usize {
        let journal = std::mem::take(&mut *self.journal.lock());
        let restored = journal.len();
        let mut entries = self.entries.lock();
        for entry in journal.into_iter().rev() {
            match entry {
                JournalEntry::Upgraded(surrogate) => {
                    if let Some(id) = surrogate.assigned_id() {
                        entries.remove(&(surrogate.kind(), id));
                    }
                    surrogate.set_slot(Slot::InConstruction);
                }
                JournalEntry::Invalidated(surrogate, id) => {
                    surrogate.set_slot(Slot::Assigned(id));
                    entries.insert((surrogate.kind(), id), surrogate);
                }
            }
        }
        restored
    }

    /// Number of cached surrogates
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> ObjectId {
        ObjectId::new(raw).unwrap()
    }

    #[test]
    fn test_assign_returns_same_instance() {
        let cache = SurrogateCache::new(StoreId::new());
        let a = cache.assign(ObjectKind::Schema, id(5));
        let b = cache.assign(ObjectKind::Schema, id(5));
        assert!(a.same_instance(&b));
        assert_eq!(a, b);
        assert_ne!(a, cache.assign(ObjectKind::Property, id(5)));
    }

    #[test]
    fn test_upgrade_visible_to_all_clones() {
        let cache = SurrogateCache::new(StoreId::new());
        let first = cache.in_construction(ObjectKind::Chronicle);
        let second = first.clone();
        assert!(first.is_in_construction());
        assert!(second.is_in_construction());
        assert!(matches!(second.id(), Err(Error::Identity { .. })));

        cache.upgrade(&first, id(12)).unwrap();
        assert_eq!(second.id().unwrap(), id(12));
        assert!(cache.assign(ObjectKind::Chronicle, id(12)).same_instance(&second));
    }

    #[test]
    fn test_upgrade_only_once() {
        let cache = SurrogateCache::new(StoreId::new());
        let s = cache.in_construction(ObjectKind::Series);
        cache.upgrade(&s, id(1)).unwrap();
        let err = cache.upgrade(&s, id(2)).unwrap_err();
        assert!(matches!(err, Error::Identity { kind: ObjectKind::Series, .. }));
        assert_eq!(s.id().unwrap(), id(1));
    }

    #[test]
    fn test_upgrade_rejects_foreign_store() {
        let cache = SurrogateCache::new(StoreId::new());
        let foreign = Surrogate::in_construction(StoreId::new(), ObjectKind::Schema);
        assert!(cache.upgrade(&foreign, id(3)).is_err());
        assert!(foreign.is_in_construction());
    }

    #[test]
    fn test_in_construction_surrogates_only_equal_themselves() {
        let cache = SurrogateCache::new(StoreId::new());
        let a = cache.in_construction(ObjectKind::Schema);
        let b = cache.in_construction(ObjectKind::Schema);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_invalidate_is_permanent_until_rollback() {
        let cache = SurrogateCache::new(StoreId::new());
        let s = cache.assign(ObjectKind::Property, id(9));
        cache.invalidate(&s);
        assert!(s.is_invalidated());
        assert!(s.id().is_err());
        assert!(!cache.assign(ObjectKind::Property, id(9)).same_instance(&s));
    }

    #[test]
    fn test_rollback_restores_construction_state() {
        let cache = SurrogateCache::new(StoreId::new());
        let created = cache.in_construction(ObjectKind::Chronicle);
        cache.upgrade(&created, id(4)).unwrap();
        let deleted = cache.assign(ObjectKind::Schema, id(2));
        cache.invalidate(&deleted);

        assert_eq!(cache.rollback(), 2);
        assert!(created.is_in_construction());
        assert_eq!(deleted.id().unwrap(), id(2));
        assert!(cache.assign(ObjectKind::Schema, id(2)).same_instance(&deleted));
    }

    #[test]
    fn test_commit_clears_journal() {
        let cache = SurrogateCache::new(StoreId::new());
        let s = cache.in_construction(ObjectKind::Chronicle);
        cache.upgrade(&s, id(4)).unwrap();
        cache.commit();
        assert_eq!(cache.rollback(), 0);
        assert_eq!(s.id().unwrap(), id(4));
    }
}
