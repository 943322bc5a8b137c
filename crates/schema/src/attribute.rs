//! Attribute definitions: the components of a schema
//!
//! A component is keyed by `(series_nr, number)`. Series number 0 holds
//! chronicle-level attributes; a positive series number groups the attributes
//! of one series, whose own name lives at
//! [`MAGIC_NAME_NR`](chronicle_core::MAGIC_NAME_NR).

use chronicle_core::MAGIC_NAME_NR;

use crate::property::Property;

/// Schema component key: `(series_nr, attribute_nr)`
pub type ComponentKey = (u32, u32);

/// One schema component, concrete or erasing
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    series_nr: u32,
    number: u32,
    property: Option<Property>,
    value: Option<String>,
    description: Option<String>,
    erasing: bool,
}

impl AttributeDefinition {
    /// Empty concrete definition
    pub fn new(series_nr: u32, number: u32) -> Self {
        Self {
            series_nr,
            number,
            property: None,
            value: None,
            description: None,
            erasing: false,
        }
    }

    /// Tombstone cancelling an inherited component
    pub fn erasing(series_nr: u32, number: u32) -> Self {
        Self {
            erasing: true,
            ..Self::new(series_nr, number)
        }
    }

    /// Concrete definition with all fields set
    pub fn concrete(
        series_nr: u32,
        number: u32,
        property: Property,
        value: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            series_nr,
            number,
            property: Some(property),
            value,
            description,
            erasing: false,
        }
    }

    /// Series number, 0 for chronicle-level attributes
    pub fn series_nr(&self) -> u32 {
        self.series_nr
    }

    /// Attribute number
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Component key
    pub fn key(&self) -> ComponentKey {
        (self.series_nr, self.number)
    }

    /// Property, absent while incomplete or when erasing
    pub fn property(&self) -> Option<&Property> {
        self.property.as_ref()
    }

    /// Default value
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// True for tombstones
    pub fn is_erasing(&self) -> bool {
        self.erasing
    }

    /// True for the component carrying a series' own name
    pub fn is_series_header(&self) -> bool {
        self.series_nr > 0 && self.number == MAGIC_NAME_NR
    }

    /// Erasing, or has a property and a default when the property needs one
    pub fn is_complete(&self) -> bool {
        if self.erasing {
            return true;
        }
        match &self.property {
            Some(property) => self.value.is_some() || !property.requires_value(),
            None => false,
        }
    }

    /// Same persisted content: erasure flag, property, value and description
    pub fn content_eq(&self, other: &AttributeDefinition) -> bool {
        self.key() == other.key()
            && self.erasing == other.erasing
            && self.property == other.property
            && self.value == other.value
            && self.description == other.description
    }

    pub(crate) fn set_property(&mut self, property: Property) {
        self.property = Some(property);
        self.erasing = false;
    }

    pub(crate) fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    pub(crate) fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_type::{Scanner, ValueType};
    use chronicle_core::{ObjectKind, StoreId, Surrogate};
    use std::sync::Arc;

    fn property(scanner: Scanner) -> Property {
        let store = StoreId::new();
        let vt = ValueType::new(
            Surrogate::in_construction(store, ObjectKind::ValueType),
            "vt",
            false,
            scanner,
        );
        Property::new(
            Surrogate::in_construction(store, ObjectKind::Property),
            "P",
            Arc::new(vt),
        )
    }

    #[test]
    fn test_completeness() {
        assert!(!AttributeDefinition::new(0, 2).is_complete());
        assert!(AttributeDefinition::erasing(0, 2).is_complete());
        assert!(AttributeDefinition::concrete(0, 2, property(Scanner::Text), None, None).is_complete());
        assert!(!AttributeDefinition::concrete(0, 2, property(Scanner::Number), None, None).is_complete());
        assert!(AttributeDefinition::concrete(0, 2, property(Scanner::Number), Some("1".into()), None)
            .is_complete());
    }

    #[test]
    fn test_content_eq_ignores_instance() {
        let p = property(Scanner::Text);
        let a = AttributeDefinition::concrete(0, 2, p.clone(), Some("SUN".into()), None);
        let mut b = a.clone();
        assert!(a.content_eq(&b));
        b.set_value(Some("MOON".into()));
        assert!(!a.content_eq(&b));
        assert!(!a.content_eq(&AttributeDefinition::erasing(0, 2)));
    }

    #[test]
    fn test_series_header() {
        assert!(AttributeDefinition::new(3, MAGIC_NAME_NR).is_series_header());
        assert!(!AttributeDefinition::new(0, MAGIC_NAME_NR).is_series_header());
    }
}
