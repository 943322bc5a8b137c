//! Properties: named, typed attribute definitions

use std::sync::Arc;

use chronicle_core::{Result, Surrogate};

use crate::value_type::ValueType;

/// A named attribute definition bound to a value type
#[derive(Debug, Clone)]
pub struct Property {
    surrogate: Surrogate,
    name: String,
    value_type: Arc<ValueType>,
}

impl Property {
    /// Create a property
    pub fn new(surrogate: Surrogate, name: impl Into<String>, value_type: Arc<ValueType>) -> Self {
        Self {
            surrogate,
            name: name.into(),
            value_type,
        }
    }

    /// Identity handle
    pub fn surrogate(&self) -> &Surrogate {
        &self.surrogate
    }

    /// Name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value type
    pub fn value_type(&self) -> &Arc<ValueType> {
        &self.value_type
    }

    /// True for reserved catalog entries
    pub fn is_builtin(&self) -> bool {
        self.surrogate
            .assigned_id()
            .map(|id| id.is_magic())
            .unwrap_or(false)
    }

    /// Whether attribute definitions using this property need a default value
    pub fn requires_value(&self) -> bool {
        !self.value_type.accepts_anything()
    }

    /// Check and canonicalize a value through the value type
    pub fn scan(&self, value: &str) -> Result<String> {
        self.value_type.scan(value)
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.surrogate == other.surrogate
    }
}
