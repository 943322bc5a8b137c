//! Value types and their scanners
//!
//! A [`ValueType`] names a value domain. Its [`Scanner`] turns external text
//! into the canonical text stored for attribute values and schema defaults.
//! Restricted value types additionally limit values to an enumeration, each
//! value carrying a description.

use std::collections::BTreeMap;
use std::fmt;

use chronicle_core::{Error, ObjectKind, Result, Surrogate};

/// Parser behind a value type, named by its external representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scanner {
    /// Any text
    Text,
    /// Letters, digits, `_` and `-`
    Name,
    /// Finite floating point number
    Number,
    /// Signed integer
    Integer,
    /// `true` or `false`
    Boolean,
}

impl Scanner {
    /// Scanner for an external representation such as `"TEXT"`
    pub fn from_external(external: &str) -> Result<Self> {
        match external {
            "TEXT" => Ok(Scanner::Text),
            "NAME" => Ok(Scanner::Name),
            "NUMBER" => Ok(Scanner::Number),
            "INTEGER" => Ok(Scanner::Integer),
            "BOOLEAN" => Ok(Scanner::Boolean),
            other => Err(Error::not_found(
                ObjectKind::ValueType,
                format!("scanner {}", other),
            )),
        }
    }

    /// External representation persisted with the value type
    pub fn external(&self) -> &'static str {
        match self {
            Scanner::Text => "TEXT",
            Scanner::Name => "NAME",
            Scanner::Number => "NUMBER",
            Scanner::Integer => "INTEGER",
            Scanner::Boolean => "BOOLEAN",
        }
    }

    /// Canonical form of `value`, or the reason it is rejected
    pub fn scan(&self, value: &str) -> std::result::Result<String, String> {
        match self {
            Scanner::Text => Ok(value.to_string()),
            Scanner::Name => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Err("empty name".to_string())
                } else if trimmed
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                {
                    Ok(trimmed.to_string())
                } else {
                    Err("only letters, digits, '_' and '-' are allowed".to_string())
                }
            }
            Scanner::Number => match value.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n.to_string()),
                Ok(_) => Err("not a finite number".to_string()),
                Err(e) => Err(e.to_string()),
            },
            Scanner::Integer => value
                .trim()
                .parse::<i64>()
                .map(|n| n.to_string())
                .map_err(|e| e.to_string()),
            Scanner::Boolean => match value.trim().to_ascii_lowercase().as_str() {
                "true" => Ok("true".to_string()),
                "false" => Ok("false".to_string()),
                _ => Err("expected true or false".to_string()),
            },
        }
    }
}

impl fmt::Display for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.external())
    }
}

/// Named value domain with an optional enumeration
#[derive(Debug, Clone)]
pub struct ValueType {
    surrogate: Surrogate,
    name: String,
    restricted: bool,
    scanner: Scanner,
    values: BTreeMap<String, String>,
}

impl ValueType {
    /// Create a value type without enumerated values
    pub fn new(surrogate: Surrogate, name: impl Into<String>, restricted: bool, scanner: Scanner) -> Self {
        Self {
            surrogate,
            name: name.into(),
            restricted,
            scanner,
            values: BTreeMap::new(),
        }
    }

    /// Replace the enumeration
    pub fn with_values<I, V, D>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (V, D)>,
        V: Into<String>,
        D: Into<String>,
    {
        self.values = values
            .into_iter()
            .map(|(v, d)| (v.into(), d.into()))
            .collect();
        self
    }

    /// Identity handle
    pub fn surrogate(&self) -> &Surrogate {
        &self.surrogate
    }

    /// Name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether values are limited to the enumeration
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    /// Scanner
    pub fn scanner(&self) -> Scanner {
        self.scanner
    }

    /// Enumerated values and descriptions, ordered by value
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Description of an enumerated value
    pub fn value_description(&self, value: &str) -> Option<&str> {
        self.values.get(value).map(String::as_str)
    }

    /// True for reserved catalog entries
    pub fn is_builtin(&self) -> bool {
        self.surrogate
            .assigned_id()
            .map(|id| id.is_magic())
            .unwrap_or(false)
    }

    /// Unrestricted text accepts anything, including no value at all
    pub fn accepts_anything(&self) -> bool {
        self.scanner == Scanner::Text && !self.restricted
    }

    /// Check and canonicalize a value, ignoring the enumeration
    pub fn scan_format(&self, value: &str) -> Result<String> {
        self.scanner.scan(value).map_err(|reason| self.invalid(value, reason))
    }

    /// Check and canonicalize a value
    pub fn scan(&self, value: &str) -> Result<String> {
        let scanned = self.scan_format(value)?;
        if self.restricted && !self.values.contains_key(&scanned) {
            return Err(self.invalid(value, "not one of the allowed values"));
        }
        Ok(scanned)
    }

    fn invalid(&self, value: &str, reason: impl Into<String>) -> Error {
        Error::InvalidValue {
            value_type: self.name.clone(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.surrogate == other.surrogate
    }
}
