//! Chronicle store - hierarchical metadata store backend
//!
//! Chronicles form a named tree. Each chronicle follows a schema describing
//! the attributes and numbered series it may carry; schemas inherit from a
//! base and may erase what they inherit. Attribute values are typed through
//! a catalog of properties and value types.
//!
//! # Quick Start
//!
//! ```ignore
//! use chronicle_store::{Catalog, ChronicleStore, Database, DatabaseConfig, SchemaStore};
//!
//! let db = Database::new(DatabaseConfig::named("prices"))?;
//! let catalog = Catalog::new(db.clone());
//! let text = catalog.create_value_type("text", false, "TEXT")?;
//! let ticker = catalog.create_property("Ticker", &text)?;
//!
//! let schemas = SchemaStore::new(db.clone());
//! let mut equity = schemas.new_schema("Equity", None)?;
//! equity.add_attribute(0, 1)?;
//! equity.set_attribute_property(0, 1, &ticker)?;
//! schemas.apply(&mut equity)?;
//!
//! let chronicles = ChronicleStore::new(db.clone());
//! let mut acme = chronicles.new_chronicle(None, "acme", "Acme Corp", Some(&equity))?;
//! chronicles.apply(&mut acme)?;
//! chronicles.set_attribute(&acme, &ticker, "ACM", None)?;
//! db.commit()?;
//! ```
//!
//! # Architecture
//!
//! - `chronicle-core`: identifiers, surrogates, errors, events, naming
//! - `chronicle-storage`: tables with statement-level constraints and rollback
//! - `chronicle-schema`: catalog model, schemas, resolution and diffs
//! - `chronicle-engine`: the session, usage checks and the facades

// Re-export the public API from chronicle-engine
pub use chronicle_engine::*;
