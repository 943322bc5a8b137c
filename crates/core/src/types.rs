//! Core types for the chronicle store
//!
//! This module defines the identifiers every other crate builds on:
//! - ObjectKind: the five kinds of persisted objects
//! - ObjectId: positive store-assigned internal identifier
//! - StoreId: identity of one store instance, part of every surrogate
//! - The magic attribute numbers and the built-in id threshold

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Attribute number carrying a series' own name and description
pub const MAGIC_NAME_NR: u32 = 1;
/// Attribute number carrying a series' value type
pub const MAGIC_TYPE_NR: u32 = 2;
/// Attribute number carrying a series' time domain
pub const MAGIC_TIME_DOMAIN_NR: u32 = 3;
/// Attribute number carrying a series' sparsity flag
pub const MAGIC_SPARSITY_NR: u32 = 4;
/// Catalog entries with ids at or below this threshold are built-in
pub const MAX_MAGIC_NR: u32 = 4;

/// Kind of a persisted object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Node of the naming tree
    Chronicle,
    /// Numbered data slot of a chronicle
    Series,
    /// Typed attribute definition
    Property,
    /// Value domain of a property
    ValueType,
    /// Inheritable structural description
    Schema,
}

impl ObjectKind {
    /// All kinds, in a stable order
    pub const ALL: [ObjectKind; 5] = [
        ObjectKind::Chronicle,
        ObjectKind::Series,
        ObjectKind::Property,
        ObjectKind::ValueType,
        ObjectKind::Schema,
    ];

    /// Lowercase display label
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Chronicle => "chronicle",
            ObjectKind::Series => "series",
            ObjectKind::Property => "property",
            ObjectKind::ValueType => "value type",
            ObjectKind::Schema => "schema",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Store-assigned internal identifier
///
/// Always positive. Zero is never a valid id, so it cannot stand in for
/// "not yet assigned"; that state lives in the surrogate instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Smallest valid id
    pub const FIRST: ObjectId = ObjectId(1);

    /// Wrap a raw id, rejecting zero
    pub fn new(raw: u32) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(ObjectId(raw))
        }
    }

    /// Raw value
    pub fn get(&self) -> u32 {
        self.0
    }

    /// True for built-in catalog ids
    pub fn is_magic(&self) -> bool {
        self.0 <= MAX_MAGIC_NR
    }

    /// The following id
    pub fn next(&self) -> ObjectId {
        ObjectId(self.0 + 1)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one store instance
///
/// Surrogates from different stores never compare equal, even when their
/// internal ids coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreId(Uuid);

impl StoreId {
    /// Create a new random store identity
    pub fn new() -> Self {
        StoreId(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StoreId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_rejects_zero() {
        assert!(ObjectId::new(0).is_none());
        assert_eq!(ObjectId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn test_object_id_magic_threshold() {
        assert!(ObjectId::new(MAX_MAGIC_NR).unwrap().is_magic());
        assert!(!ObjectId::new(MAX_MAGIC_NR + 1).unwrap().is_magic());
    }

    #[test]
    fn test_store_ids_are_distinct() {
        assert_ne!(StoreId::new(), StoreId::new());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ObjectKind::ValueType.to_string(), "value type");
        assert_eq!(ObjectKind::ALL.len(), 5);
    }
}
