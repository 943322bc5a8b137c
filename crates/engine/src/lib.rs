//! Backend engine for the chronicle store
//!
//! This crate ties the lower layers together:
//! - Database: one session with its lifecycle and configuration
//! - Transaction coordination: commit/rollback of tables, surrogates and events
//! - Update policy: usage checks run before destructive mutations
//! - Facades: catalog, schemas, chronicles and series
//!
//! The engine is the only component that knows about:
//! - Turning rows back into model objects
//! - Which dependents block which mutation
//! - When events are released

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod database;
mod loader;
mod policy;
pub mod primitives;

pub use coordinator::{TransactionCoordinator, TransactionMetrics};
pub use database::{Database, DatabaseConfig, SessionState, CONFIG_FILE_NAME};
pub use primitives::{
    AttributeValue, Catalog, Chronicle, ChronicleStore, SchemaStore, Series, SeriesStore,
};

pub use chronicle_core::{
    BufferedPublisher, Error, ObjectId, ObjectKind, Result, Surrogate, UpdateEvent,
    UpdateEventOperation, UpdateEventPublisher, UpdateEventSubscriber,
};
pub use chronicle_schema::{
    ComponentChange, Property, ResolvedSchema, Schema, SchemaDiff, SeriesDefinition, ValueType,
};
