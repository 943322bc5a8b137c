//! Schema model for the chronicle store
//!
//! This crate holds everything that can be reasoned about without a store:
//! - ValueType / Scanner: value domains and their text scanners
//! - Property: named, typed attribute kinds
//! - AttributeDefinition / SeriesDefinition: schema components
//! - Schema: editable own components over a base chain
//! - Resolver: inheritance, erasure and cycle-tolerant merging
//! - Diff: minimal component changes against the persisted state
//! - Built-ins: the reserved catalog entries behind series-level attributes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod builtin;
pub mod diff;
pub mod property;
pub mod resolver;
pub mod schema;
pub mod series;
pub mod value_type;

#[cfg(test)]
mod testing;

pub use attribute::{AttributeDefinition, ComponentKey};
pub use builtin::{
    BuiltIns, BuiltinProperty, BuiltinValueType, BUILTIN_PROPERTIES, BUILTIN_VALUE_TYPES,
    NUMERIC_VALUE_TYPE, TIME_DOMAINS,
};
pub use diff::{diff, ComponentChange, SchemaDiff};
pub use property::Property;
pub use resolver::{resolve, resolve_unchecked, ComponentTable, ResolvedSchema};
pub use schema::{PersistedState, Schema};
pub use series::SeriesDefinition;
pub use value_type::{Scanner, ValueType};
