//! Statement-level errors of the table store
//!
//! Each variant corresponds to a constraint a relational store would enforce.
//! They convert into [`chronicle_core::Error::Storage`] with the table as
//! context and the original error as source.

use thiserror::Error;

/// Result type alias for table statements
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Constraint violations raised by table statements
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A row with the same unique key exists
    #[error("unique constraint violated on {table}: {key}")]
    UniqueViolation {
        /// Table name
        table: &'static str,
        /// Offending key
        key: String,
    },

    /// The addressed row does not exist
    #[error("no row in {table} for {key}")]
    RowNotFound {
        /// Table name
        table: &'static str,
        /// Missing key
        key: String,
    },

    /// A referenced row is missing, or a referencing row still exists
    #[error("foreign key violated on {table}: {key} ({detail})")]
    ForeignKey {
        /// Table name
        table: &'static str,
        /// Key of the row being written or deleted
        key: String,
        /// Which reference failed
        detail: String,
    },
}

impl StoreError {
    /// Table the failing statement addressed
    pub fn table(&self) -> &'static str {
        match self {
            StoreError::UniqueViolation { table, .. }
            | StoreError::RowNotFound { table, .. }
            | StoreError::ForeignKey { table, .. } => table,
        }
    }
}

impl From<StoreError> for chronicle_core::Error {
    fn from(e: StoreError) -> Self {
        chronicle_core::Error::storage(e.table(), e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_conversion_keeps_source() {
        let err: chronicle_core::Error = StoreError::UniqueViolation {
            table: "schema_name",
            key: "S".to_string(),
        }
        .into();
        assert!(err.to_string().contains("schema_name"));
        let source = err.source().unwrap();
        assert!(source.to_string().contains("unique constraint"));
    }
}
