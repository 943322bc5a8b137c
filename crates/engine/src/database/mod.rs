//! Database session and its lifecycle
//!
//! A [`Database`] owns everything one backend session needs:
//! - the table store and its single implicit transaction
//! - the surrogate cache
//! - the transaction coordinator with its event buffer
//! - the naming policy
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --first use--> Open --close()--> Closed
//! ```
//!
//! Construction registers the database name process-wide; a second session
//! with the same name cannot be constructed until the first is closed or
//! dropped. The first operation opens the session, bootstrapping the built-in
//! catalog entries. A closed session rejects every operation.

pub mod config;
mod registry;

pub use config::{DatabaseConfig, CONFIG_FILE_NAME};
pub use registry::{is_registered, OPEN_SESSIONS};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

use chronicle_core::{
    DottedNamingPolicy, Error, ObjectId, ObjectKind, Result, StoreId, SurrogateCache,
    UpdateEvent, UpdateEventPublisher, UpdateEventSubscriber,
};
use chronicle_schema::{
    BuiltIns, Scanner, BUILTIN_PROPERTIES, BUILTIN_VALUE_TYPES, NUMERIC_VALUE_TYPE,
};
use chronicle_storage::{MemoryStore, PropertyRow, Tables, ValueTypeRow};
use tracing::{info, warn};

use crate::coordinator::{TransactionCoordinator, TransactionMetrics};
use crate::loader::Loader;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, nothing read or written yet
    Uninitialized,
    /// Built-ins bootstrapped, accepting operations
    Open,
    /// Closed; every operation fails
    Closed,
}

// ============================================================================
// Database Struct
// ============================================================================

/// One backend session
///
/// All facades (catalog, schemas, chronicles, series) hold an
/// `Arc<Database>` and run their statements through it.
///
/// # Example
///
/// ```text
/// use chronicle_engine::{Database, DatabaseConfig, ChronicleStore};
///
/// let db = Database::new(DatabaseConfig::named("prices"))?;
/// let chronicles = ChronicleStore::new(db.clone());
/// let mut fx = chronicles.new_chronicle(None, "fx", "Currencies", None)?;
/// chronicles.apply(&mut fx)?;
/// db.commit()?;
/// ```
pub struct Database {
    /// Configuration the session was constructed from
    config: DatabaseConfig,

    /// Chronicle name splitting and checking
    naming: DottedNamingPolicy,

    /// Tables with snapshot rollback
    store: MemoryStore,

    /// One surrogate per persisted row, plus the transaction journal
    cache: SurrogateCache,

    /// Commit/rollback orchestration and event buffering
    coordinator: TransactionCoordinator,

    /// Lifecycle state
    state: Mutex<SessionState>,

    /// Reserved properties, loaded when the session opens
    builtins: OnceCell<Arc<BuiltIns>>,
}

impl Database {
    /// Construct a session with an in-process event publisher
    ///
    /// # Errors
    ///
    /// `Configuration` if the config is invalid or a session with the same
    /// name is already constructed.
    pub fn new(config: DatabaseConfig) -> Result<Arc<Self>> {
        Self::build(config, TransactionCoordinator::new())
    }

    /// Construct a session releasing its events through `publisher`
    pub fn with_publisher(
        config: DatabaseConfig,
        publisher: Arc<dyn UpdateEventPublisher>,
    ) -> Result<Arc<Self>> {
        Self::build(config, TransactionCoordinator::with_publisher(publisher))
    }

    /// Construct a session from the `chronicle.toml` in a directory
    ///
    /// Creates the directory and a default config file if needed.
    pub fn from_config_dir<P: AsRef<Path>>(dir: P) -> Result<Arc<Self>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::Configuration(format!(
                "Failed to create config directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        DatabaseConfig::write_default_if_missing(&config_path)?;
        let config = DatabaseConfig::from_file(&config_path)?;
        Self::new(config)
    }

    fn build(config: DatabaseConfig, coordinator: TransactionCoordinator) -> Result<Arc<Self>> {
        config.validate()?;
        registry::register(&config.name)?;
        info!(target: "chronicle::session", name = %config.name, "Database constructed");
        Ok(Arc::new(Self {
            naming: config.naming_policy(),
            store: MemoryStore::new(),
            cache: SurrogateCache::new(StoreId::new()),
            coordinator,
            state: Mutex::new(SessionState::Uninitialized),
            builtins: OnceCell::new(),
            config,
        }))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Configuration of this session
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Database name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Identity of the underlying store
    pub fn store_id(&self) -> StoreId {
        self.cache.store()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Naming policy for chronicle names
    pub fn naming(&self) -> &DottedNamingPolicy {
        &self.naming
    }

    /// True if the open transaction has writes or queued events
    pub fn has_pending_changes(&self) -> bool {
        self.store.has_pending() || self.coordinator.pending_events() > 0
    }

    /// Get transaction metrics
    pub fn metrics(&self) -> TransactionMetrics {
        self.coordinator.metrics()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the session now instead of on first use
    pub fn open(&self) -> Result<()> {
        self.ensure_open()
    }

    fn ensure_open(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            SessionState::Open => Ok(()),
            SessionState::Closed => Err(Error::InvalidOperation(format!(
                "database {} is closed",
                self.config.name
            ))),
            SessionState::Uninitialized => {
                self.bootstrap()?;
                *state = SessionState::Open;
                info!(target: "chronicle::session", name = %self.config.name, "Database opened");
                Ok(())
            }
        }
    }

    /// Insert the built-in catalog entries missing from the store
    fn bootstrap(&self) -> Result<()> {
        let inserted = self.store.write(|tables| -> Result<usize> {
            let mut inserted = 0;
            for builtin in BUILTIN_VALUE_TYPES.iter() {
                let id = reserved_id(builtin.id)?;
                if tables.value_type(id).is_some() {
                    continue;
                }
                tables.insert_value_type(ValueTypeRow {
                    id,
                    label: builtin.name.to_string(),
                    restricted: builtin.restricted,
                    external_representation: builtin.scanner.external().to_string(),
                })?;
                for (value, description) in builtin.values {
                    tables.insert_value(id, value, description)?;
                }
                inserted += 1;
            }
            if tables.value_type_by_label(NUMERIC_VALUE_TYPE).is_none() {
                insert_numeric(tables)?;
                inserted += 1;
            }
            for builtin in BUILTIN_PROPERTIES.iter() {
                let id = reserved_id(builtin.id)?;
                if tables.property(id).is_some() {
                    continue;
                }
                tables.insert_property(PropertyRow {
                    id,
                    value_type: reserved_id(builtin.value_type)?,
                    label: builtin.name.to_string(),
                })?;
                inserted += 1;
            }
            Ok(inserted)
        })?;
        self.store.commit();

        let builtins = self
            .store
            .read(|tables| Loader::new(tables, &self.cache).builtins())?;
        self.builtins.get_or_init(|| Arc::new(builtins));
        info!(target: "chronicle::session", inserted, "Built-in catalog ready");
        Ok(())
    }

    /// Make the open transaction permanent
    ///
    /// Returns the number of events released to subscribers.
    pub fn commit(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.coordinator.commit(&self.store, &self.cache))
    }

    /// Undo the open transaction
    ///
    /// Every surrogate upgraded since the last commit is in construction
    /// again. Returns the number of events discarded.
    pub fn rollback(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.coordinator.rollback(&self.store, &self.cache))
    }

    /// Close the session, rolling back uncommitted changes
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state == SessionState::Closed {
            return Ok(());
        }
        if self.has_pending_changes() {
            warn!(
                target: "chronicle::session",
                name = %self.config.name,
                "Closing with uncommitted changes, rolling back"
            );
            self.coordinator.rollback(&self.store, &self.cache);
        }
        *state = SessionState::Closed;
        registry::unregister(&self.config.name);
        info!(target: "chronicle::session", name = %self.config.name, "Database closed");
        Ok(())
    }

    /// Register a subscriber for some object kinds (all kinds when empty)
    pub fn subscribe(&self, kinds: &[ObjectKind], subscriber: Arc<dyn UpdateEventSubscriber>) {
        self.coordinator.subscribe(kinds, subscriber);
    }

    // ========================================================================
    // Statement plumbing for the facades
    // ========================================================================

    pub(crate) fn builtins(&self) -> Result<Arc<BuiltIns>> {
        self.ensure_open()?;
        self.builtins
            .get()
            .cloned()
            .ok_or_else(|| Error::InvalidOperation("built-in catalog not loaded".to_string()))
    }

    pub(crate) fn cache(&self) -> &SurrogateCache {
        &self.cache
    }

    /// Run read-only statements
    pub(crate) fn read<R>(&self, f: impl FnOnce(&Tables) -> Result<R>) -> Result<R> {
        self.ensure_open()?;
        self.store.read(f)
    }

    /// Run statements atomically within the open transaction
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Tables) -> Result<R>) -> Result<R> {
        self.ensure_open()?;
        self.store.write(f)
    }

    pub(crate) fn publish(&self, event: UpdateEvent) {
        self.coordinator.publish(event);
    }
}

fn reserved_id(raw: u32) -> Result<ObjectId> {
    ObjectId::new(raw).ok_or_else(|| Error::InvalidOperation("reserved id 0".to_string()))
}

fn insert_numeric(tables: &mut Tables) -> Result<()> {
    let id = tables.next_id(ObjectKind::ValueType);
    tables.insert_value_type(ValueTypeRow {
        id,
        label: NUMERIC_VALUE_TYPE.to_string(),
        restricted: false,
        external_representation: Scanner::Number.external().to_string(),
    })?;
    Ok(())
}

impl Drop for Database {
    fn drop(&mut self) {
        if *self.state.get_mut() != SessionState::Closed {
            registry::unregister(&self.config.name);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DatabaseConfig {
        DatabaseConfig::named(format!("db-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_lazy_open_bootstraps_builtins() {
        let db = Database::new(config()).unwrap();
        assert_eq!(db.state(), SessionState::Uninitialized);

        let builtins = db.builtins().unwrap();
        assert_eq!(db.state(), SessionState::Open);
        assert_eq!(builtins.name.name(), "Name");
        assert!(builtins.series_type.is_builtin());
        assert!(!db.has_pending_changes());

        let numeric = db
            .read(|tables| Ok(tables.value_type_by_label(NUMERIC_VALUE_TYPE).map(|row| row.id)))
            .unwrap()
            .unwrap();
        assert!(!numeric.is_magic());
    }

    #[test]
    fn test_duplicate_name_rejected_until_closed() {
        let config = config();
        let db = Database::new(config.clone()).unwrap();
        assert!(matches!(
            Database::new(config.clone()),
            Err(Error::Configuration(_))
        ));
        db.close().unwrap();
        assert!(!is_registered(&config.name));
        let again = Database::new(config).unwrap();
        assert_eq!(again.state(), SessionState::Uninitialized);
    }

    #[test]
    fn test_drop_unregisters() {
        let config = config();
        drop(Database::new(config.clone()).unwrap());
        assert!(!is_registered(&config.name));
    }

    #[test]
    fn test_closed_session_rejects_operations() {
        let db = Database::new(config()).unwrap();
        db.open().unwrap();
        db.close().unwrap();
        db.close().unwrap();
        assert_eq!(db.state(), SessionState::Closed);
        assert!(matches!(db.commit(), Err(Error::InvalidOperation(_))));
        assert!(db.read(|_| Ok(())).is_err());
    }

    #[test]
    fn test_from_config_dir_writes_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let name = format!("dir-{}", uuid::Uuid::new_v4());
        std::fs::write(&path, format!("name = \"{}\"\n", name)).unwrap();

        let db = Database::from_config_dir(dir.path()).unwrap();
        assert_eq!(db.name(), name);
        assert_eq!(db.config().top_chronicle, "bt");
    }

    #[test]
    fn test_close_rolls_back_pending_writes() {
        let db = Database::new(config()).unwrap();
        db.write(|tables| insert_numeric_copy(tables)).unwrap();
        assert!(db.has_pending_changes());
        db.close().unwrap();
        assert_eq!(db.metrics().total_rolled_back, 1);
    }

    fn insert_numeric_copy(tables: &mut Tables) -> Result<()> {
        let id = tables.next_id(ObjectKind::ValueType);
        tables.insert_value_type(ValueTypeRow {
            id,
            label: "numeric2".to_string(),
            restricted: false,
            external_representation: "NUMBER".to_string(),
        })?;
        Ok(())
    }
}
