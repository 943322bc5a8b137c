//! Error types for the chronicle store
//!
//! This module defines the error taxonomy shared by every crate of the store.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Lower layers (the table store) keep their own error types and convert into
//! [`Error::Storage`], keeping the original error reachable through
//! [`std::error::Error::source`].

use crate::types::ObjectKind;
use thiserror::Error;

/// Result type alias for chronicle store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed lower-level cause carried by [`Error::Storage`]
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for the chronicle store
#[derive(Debug, Error)]
pub enum Error {
    /// An object still in construction (or already deleted) was used where a
    /// persisted identifier is required
    #[error("{kind} has no valid identity: {reason}")]
    Identity {
        /// Kind of the object whose surrogate was used
        kind: ObjectKind,
        /// What went wrong
        reason: String,
    },

    /// Lookup by name or surrogate found nothing
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Kind of object looked up
        kind: ObjectKind,
        /// Name or identifier used for the lookup
        name: String,
    },

    /// A schema component is not defined
    #[error("component ({series}, {attribute}) not defined in schema {schema}")]
    NotDefined {
        /// Schema name
        schema: String,
        /// Series number (0 for chronicle-level attributes)
        series: u32,
        /// Attribute number
        attribute: u32,
    },

    /// A schema component is incomplete or clashes with another one
    #[error("incomplete definition: {0}")]
    IncompleteDefinition(String),

    /// A schema already owns a component with the same key
    #[error("schema {schema} already has component ({series}, {attribute})")]
    DuplicateComponent {
        /// Schema name
        schema: String,
        /// Series number
        series: u32,
        /// Attribute number
        attribute: u32,
    },

    /// A destructive or narrowing mutation was rejected because dependents exist
    #[error("{kind} {name} is in use by {count} dependent(s)")]
    InUse {
        /// Kind of the object that would have been mutated
        kind: ObjectKind,
        /// Name of that object
        name: String,
        /// Number of dependents found
        count: usize,
    },

    /// Mutation of a built-in catalog entry
    #[error("{kind} {name} is built-in and cannot be modified")]
    Protected {
        /// Kind of the built-in object
        kind: ObjectKind,
        /// Its name
        name: String,
    },

    /// A value was rejected by a value type
    #[error("invalid value {value:?} for value type {value_type}: {reason}")]
    InvalidValue {
        /// Name of the value type doing the check
        value_type: String,
        /// The offending value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid operation or state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Session configuration or lifecycle error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure reported by the table store
    #[error("storage error ({context}): {source}")]
    Storage {
        /// Statement or table involved
        context: String,
        /// Original store error
        #[source]
        source: BoxedCause,
    },
}

impl Error {
    /// Build an [`Error::NotFound`]
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Build an [`Error::InUse`]
    pub fn in_use(kind: ObjectKind, name: impl Into<String>, count: usize) -> Self {
        Error::InUse {
            kind,
            name: name.into(),
            count,
        }
    }

    /// Build an [`Error::Protected`]
    pub fn protected(kind: ObjectKind, name: impl Into<String>) -> Self {
        Error::Protected {
            kind,
            name: name.into(),
        }
    }

    /// Build an [`Error::Identity`]
    pub fn identity(kind: ObjectKind, reason: impl Into<String>) -> Self {
        Error::Identity {
            kind,
            reason: reason.into(),
        }
    }

    /// Wrap a lower-level error
    pub fn storage(context: impl Into<String>, source: impl Into<BoxedCause>) -> Self {
        Error::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Dependent count of an [`Error::InUse`], `None` for other variants
    pub fn in_use_count(&self) -> Option<usize> {
        match self {
            Error::InUse { count, .. } => Some(*count),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display_in_use() {
        let err = Error::in_use(ObjectKind::Property, "Ticker", 3);
        let msg = err.to_string();
        assert!(msg.contains("property Ticker"));
        assert!(msg.contains("3 dependent"));
        assert_eq!(err.in_use_count(), Some(3));
    }

    #[test]
    fn test_error_display_not_defined() {
        let err = Error::NotDefined {
            schema: "S".to_string(),
            series: 1,
            attribute: 7,
        };
        assert_eq!(
            err.to_string(),
            "component (1, 7) not defined in schema S"
        );
        assert_eq!(err.in_use_count(), None);
    }

    #[test]
    fn test_storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = Error::storage("insert chronicle", io);
        assert!(err.to_string().contains("insert chronicle"));
        assert!(err.source().is_some());
    }
}
