//! Shared test utilities for the engine integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::sync::Arc;

use chronicle_engine::{
    Catalog, Chronicle, ChronicleStore, Database, DatabaseConfig, Property, Schema, SchemaStore,
    SeriesStore, UpdateEvent, UpdateEventSubscriber, ValueType,
};
use parking_lot::Mutex;

// ============================================================================
// TestDb
// ============================================================================

/// A session under a unique name with every facade
pub struct TestDb {
    pub db: Arc<Database>,
    pub catalog: Catalog,
    pub schemas: SchemaStore,
    pub chronicles: ChronicleStore,
    pub series: SeriesStore,
}

impl TestDb {
    pub fn new() -> Self {
        let name = format!("test-{}", uuid::Uuid::new_v4());
        Self::with_config(DatabaseConfig::named(name))
    }

    pub fn with_config(config: DatabaseConfig) -> Self {
        let db = Database::new(config).expect("database");
        Self {
            catalog: Catalog::new(db.clone()),
            schemas: SchemaStore::new(db.clone()),
            chronicles: ChronicleStore::new(db.clone()),
            series: SeriesStore::new(db.clone()),
            db,
        }
    }

    /// Unrestricted text value type, created on first use
    pub fn text(&self) -> Arc<ValueType> {
        self.catalog
            .value_type("text")
            .or_else(|_| self.catalog.create_value_type("text", false, "TEXT"))
            .expect("text value type")
    }

    pub fn text_property(&self, name: &str) -> Property {
        self.catalog
            .create_property(name, &self.text())
            .expect("property")
    }

    /// Applied schema with numeric series named after `series`, numbered from 1
    pub fn series_schema(&self, name: &str, base: Option<&Schema>, series: &[&str]) -> Schema {
        let mut schema = self.schemas.new_schema(name, base).expect("schema");
        for (nr, series_name) in (1..).zip(series) {
            schema.add_series(nr).unwrap();
            schema.set_series_name(nr, series_name).unwrap();
            schema.set_series_type(nr, "numeric").unwrap();
            schema.set_series_time_domain(nr, "daily").unwrap();
        }
        self.schemas.apply(&mut schema).expect("apply");
        schema
    }

    /// Applied chronicle
    pub fn chronicle(&self, parent: Option<&Chronicle>, name: &str, schema: Option<&Schema>) -> Chronicle {
        let mut chronicle = self
            .chronicles
            .new_chronicle(parent, name, name, schema)
            .expect("chronicle");
        self.chronicles.apply(&mut chronicle).expect("apply chronicle");
        chronicle
    }
}

// ============================================================================
// Recorder
// ============================================================================

/// Subscriber keeping every event it is handed
#[derive(Default)]
pub struct Recorder {
    seen: Mutex<Vec<UpdateEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<UpdateEvent> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}

impl UpdateEventSubscriber for Recorder {
    fn notify(&self, event: &UpdateEvent) {
        self.seen.lock().push(event.clone());
    }
}
