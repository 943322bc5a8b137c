//! Storage layer for the chronicle store
//!
//! This crate implements the persisted layout as in-process tables:
//! - Row types, one per table (chronicle, series, property, value type,
//!   enumerated values, attribute values, schema names, schema items)
//! - Tables: statement-level operations enforcing unique and foreign keys
//! - MemoryStore: one implicit transaction with snapshot rollback
//! - Observations: the minimal numeric value store consumed by series
//!
//! Policy decisions (who may delete what) live in the engine. The tables only
//! refuse statements a relational store would refuse.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod memory;
pub mod rows;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use rows::{
    AttributeValueRow, ChronicleRow, PropertyRow, SchemaItemRow, SchemaNameRow, SeriesRow,
    ValueTypeRow,
};
pub use tables::Tables;
