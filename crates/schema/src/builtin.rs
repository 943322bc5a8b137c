//! Built-in catalog entries
//!
//! Series-level attributes (name, value type, time domain, sparsity) are
//! ordinary attribute definitions using reserved properties. Their ids are at
//! or below [`MAX_MAGIC_NR`](chronicle_core::MAX_MAGIC_NR) and match the
//! magic attribute numbers.

use chronicle_core::{MAGIC_NAME_NR, MAGIC_SPARSITY_NR, MAGIC_TIME_DOMAIN_NR, MAGIC_TYPE_NR};

use crate::property::Property;
use crate::value_type::Scanner;

/// Definition of a reserved value type
#[derive(Debug, Clone, Copy)]
pub struct BuiltinValueType {
    /// Reserved id
    pub id: u32,
    /// Name
    pub name: &'static str,
    /// Whether values are enumerated
    pub restricted: bool,
    /// Scanner
    pub scanner: Scanner,
    /// Enumerated values with descriptions
    pub values: &'static [(&'static str, &'static str)],
}

/// Definition of a reserved property
#[derive(Debug, Clone, Copy)]
pub struct BuiltinProperty {
    /// Reserved id, equal to the series-level attribute number it serves
    pub id: u32,
    /// Name
    pub name: &'static str,
    /// Id of its value type
    pub value_type: u32,
}

/// Value type of series observations
pub const NUMERIC_VALUE_TYPE: &str = "numeric";

/// Time domains a series may use
pub const TIME_DOMAINS: [(&str, &str); 6] = [
    ("daily", "Daily"),
    ("workday", "Working days"),
    ("monthly", "Monthly"),
    ("quarterly", "Quarterly"),
    ("yearly", "Yearly"),
    ("datetime", "Date and time"),
];

/// Reserved value types
pub const BUILTIN_VALUE_TYPES: [BuiltinValueType; 4] = [
    BuiltinValueType {
        id: MAGIC_NAME_NR,
        name: "name",
        restricted: false,
        scanner: Scanner::Name,
        values: &[],
    },
    BuiltinValueType {
        id: MAGIC_TYPE_NR,
        name: "type",
        restricted: true,
        scanner: Scanner::Name,
        values: &[(NUMERIC_VALUE_TYPE, "Numeric series")],
    },
    BuiltinValueType {
        id: MAGIC_TIME_DOMAIN_NR,
        name: "timedomain",
        restricted: true,
        scanner: Scanner::Name,
        values: &TIME_DOMAINS,
    },
    BuiltinValueType {
        id: MAGIC_SPARSITY_NR,
        name: "boolean",
        restricted: false,
        scanner: Scanner::Boolean,
        values: &[],
    },
];

/// Reserved properties
pub const BUILTIN_PROPERTIES: [BuiltinProperty; 4] = [
    BuiltinProperty {
        id: MAGIC_NAME_NR,
        name: "Name",
        value_type: MAGIC_NAME_NR,
    },
    BuiltinProperty {
        id: MAGIC_TYPE_NR,
        name: "Type",
        value_type: MAGIC_TYPE_NR,
    },
    BuiltinProperty {
        id: MAGIC_TIME_DOMAIN_NR,
        name: "Domain",
        value_type: MAGIC_TIME_DOMAIN_NR,
    },
    BuiltinProperty {
        id: MAGIC_SPARSITY_NR,
        name: "Sparsity",
        value_type: MAGIC_SPARSITY_NR,
    },
];

/// Loaded reserved properties used by series-level edits
#[derive(Debug, Clone)]
pub struct BuiltIns {
    /// Series name
    pub name: Property,
    /// Series value type
    pub series_type: Property,
    /// Series time domain
    pub time_domain: Property,
    /// Series sparsity
    pub sparsity: Property,
}

impl BuiltIns {
    /// Reserved property serving a series-level attribute number
    pub fn for_attribute(&self, attribute_nr: u32) -> Option<&Property> {
        match attribute_nr {
            MAGIC_NAME_NR => Some(&self.name),
            MAGIC_TYPE_NR => Some(&self.series_type),
            MAGIC_TIME_DOMAIN_NR => Some(&self.time_domain),
            MAGIC_SPARSITY_NR => Some(&self.sparsity),
            _ => None,
        }
    }
}
