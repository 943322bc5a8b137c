//! MemoryStore: single-transaction table store
//!
//! Holds the [`Tables`] of one session behind a `parking_lot::Mutex`.
//!
//! # Transactions
//!
//! - The first successful write after a commit or rollback snapshots the tables
//! - `commit()` drops the snapshot
//! - `rollback()` restores it, keeping the id sequences so ids are never reused
//!
//! Each `write` call is atomic on its own: if the closure fails, every
//! statement it ran is undone before the error is returned.

use parking_lot::Mutex;
use tracing::debug;

use crate::tables::Tables;

#[derive(Debug, Default)]
struct Inner {
    tables: Tables,
    snapshot: Option<Tables>,
    writes: usize,
}

/// Table store with one implicit transaction
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a read-only closure over the tables
    ///
    /// The closure must not call back into the store.
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.tables)
    }

    /// Run a closure that may write, undoing its statements if it fails
    pub fn write<R, E>(&self, f: impl FnOnce(&mut Tables) -> Result<R, E>) -> Result<R, E> {
        let mut inner = self.inner.lock();
        let before = inner.tables.clone();
        match f(&mut inner.tables) {
            Ok(result) => {
                if inner.snapshot.is_none() {
                    inner.snapshot = Some(before);
                }
                inner.writes += 1;
                Ok(result)
            }
            Err(e) => {
                let sequences = std::mem::take(&mut inner.tables.sequences);
                inner.tables = before;
                inner.tables.sequences = sequences;
                Err(e)
            }
        }
    }

    /// True if writes happened since the last commit or rollback
    pub fn has_pending(&self) -> bool {
        self.inner.lock().snapshot.is_some()
    }

    /// Make pending writes permanent, returning how many write calls they were
    pub fn commit(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.snapshot = None;
        let writes = std::mem::take(&mut inner.writes);
        debug!(target: "chronicle::txn", writes, "store commit");
        writes
    }

    /// Discard pending writes, returning how many write calls were undone
    pub fn rollback(&self) -> usize {
        let mut inner = self.inner.lock();
        let writes = std::mem::take(&mut inner.writes);
        if let Some(snapshot) = inner.snapshot.take() {
            let sequences = std::mem::take(&mut inner.tables.sequences);
            inner.tables = snapshot;
            inner.tables.sequences = sequences;
        }
        debug!(target: "chronicle::txn", writes, "store rollback");
        writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::rows::SchemaNameRow;
    use chronicle_core::ObjectKind;

    fn insert_schema(store: &MemoryStore, label: &str) -> Result<chronicle_core::ObjectId, StoreError> {
        store.write(|tables| {
            let id = tables.next_id(ObjectKind::Schema);
            tables.insert_schema(SchemaNameRow {
                id,
                parent: None,
                label: label.to_string(),
            })?;
            Ok(id)
        })
    }

    #[test]
    fn test_rollback_restores_rows_but_not_sequences() {
        let store = MemoryStore::new();
        let first = insert_schema(&store, "A").unwrap();
        store.commit();

        let second = insert_schema(&store, "B").unwrap();
        assert!(store.has_pending());
        assert_eq!(store.rollback(), 1);

        assert!(store.read(|t| t.schema_by_label("B").is_none()));
        assert!(store.read(|t| t.schema(first).is_some()));
        let third = insert_schema(&store, "B").unwrap();
        assert!(third > second);
    }

    #[test]
    fn test_failed_write_is_undone() {
        let store = MemoryStore::new();
        insert_schema(&store, "A").unwrap();
        let result: Result<(), StoreError> = store.write(|tables| {
            let id = tables.next_id(ObjectKind::Schema);
            tables.insert_schema(SchemaNameRow { id, parent: None, label: "C".to_string() })?;
            let id = tables.next_id(ObjectKind::Schema);
            tables.insert_schema(SchemaNameRow { id, parent: None, label: "A".to_string() })?;
            Ok(())
        });
        assert!(matches!(result, Err(StoreError::UniqueViolation { .. })));
        assert!(store.read(|t| t.schema_by_label("C").is_none()));
    }

    #[test]
    fn test_commit_keeps_rows() {
        let store = MemoryStore::new();
        insert_schema(&store, "A").unwrap();
        assert_eq!(store.commit(), 1);
        assert!(!store.has_pending());
        assert_eq!(store.rollback(), 0);
        assert!(store.read(|t| t.schema_by_label("A").is_some()));
    }
}
