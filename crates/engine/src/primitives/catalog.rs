//! Catalog: value types, enumerated values and properties
//!
//! Built-in entries (ids at or below `MAX_MAGIC_NR`) are protected from every
//! mutation. Deletions and renames pass the update policy first; deleting a
//! restricted value type takes its enumerated values with it.
//!
//! Mutations return the entry as re-read from the tables, so a caller holding
//! an older copy can simply replace it.

use std::sync::Arc;

use chronicle_core::{
    Error, NamePattern, ObjectId, ObjectKind, Result, UpdateEvent, UpdateEventOperation,
};
use chronicle_schema::{Property, Scanner, ValueType};
use chronicle_storage::{PropertyRow, ValueTypeRow};
use tracing::debug;

use crate::database::Database;
use crate::loader::Loader;
use crate::policy::UpdatePolicy;
use crate::primitives::checked_name;

/// Catalog facade
///
/// # Example
///
/// ```text
/// let catalog = Catalog::new(db.clone());
/// let currency = catalog.create_value_type("currency", true, "NAME")?;
/// let currency = catalog.add_value(&currency, "USD", "US dollar")?;
/// let ccy = catalog.create_property("Currency", &currency)?;
/// ```
#[derive(Clone)]
pub struct Catalog {
    db: Arc<Database>,
}

impl Catalog {
    /// Create new Catalog instance
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn event(&self, kind: ObjectKind, operation: UpdateEventOperation, id: ObjectId, comment: String) {
        self.db
            .publish(UpdateEvent::new(kind, operation, Some(id)).with_comment(comment));
    }

    // ========== Value types ==========

    /// Create a value type scanned by the named external representation
    pub fn create_value_type(
        &self,
        name: &str,
        restricted: bool,
        external_representation: &str,
    ) -> Result<Arc<ValueType>> {
        let name = checked_name(name)?;
        let scanner = Scanner::from_external(external_representation)?;
        let surrogate = self.db.cache().in_construction(ObjectKind::ValueType);
        let id = self.db.write(|tables| {
            let id = tables.next_id(ObjectKind::ValueType);
            tables.insert_value_type(ValueTypeRow {
                id,
                label: name.clone(),
                restricted,
                external_representation: scanner.external().to_string(),
            })?;
            Ok(id)
        })?;
        self.db.cache().upgrade(&surrogate, id)?;
        debug!(target: "chronicle::catalog", name = %name, id = id.get(), "value type created");
        self.event(ObjectKind::ValueType, UpdateEventOperation::Create, id, name.clone());
        Ok(Arc::new(ValueType::new(surrogate, name, restricted, scanner)))
    }

    /// Value type by name
    pub fn value_type(&self, name: &str) -> Result<Arc<ValueType>> {
        self.db
            .read(|tables| Loader::new(tables, self.db.cache()).value_type_by_name(name))
    }

    /// Value types whose name matches a wildcard pattern, ordered by name
    pub fn value_types(&self, pattern: &str) -> Result<Vec<Arc<ValueType>>> {
        let pattern = NamePattern::new(pattern)?;
        self.db.read(|tables| {
            let loader = Loader::new(tables, self.db.cache());
            let mut found = tables
                .value_types()
                .filter(|row| pattern.matches(&row.label))
                .map(|row| loader.value_type(row.id))
                .collect::<Result<Vec<_>>>()?;
            found.sort_by(|a, b| a.name().cmp(b.name()));
            Ok(found)
        })
    }

    /// Rename a value type
    pub fn rename_value_type(&self, value_type: &ValueType, name: &str) -> Result<Arc<ValueType>> {
        let id = value_type.surrogate().id()?;
        let name = checked_name(name)?;
        let builtins = self.db.builtins()?;
        self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins).will_modify_value_type(id)?;
            tables.rename_value_type(id, &name)?;
            Ok(())
        })?;
        self.event(
            ObjectKind::ValueType,
            UpdateEventOperation::Modify,
            id,
            format!("{} -> {}", value_type.name(), name),
        );
        self.reload_value_type(id)
    }

    /// Delete a value type no property uses, with its enumerated values
    pub fn delete_value_type(&self, value_type: &ValueType) -> Result<()> {
        let id = value_type.surrogate().id()?;
        let builtins = self.db.builtins()?;
        let values = self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins).will_delete_value_type(id)?;
            let values = tables.delete_values_of(id);
            tables.delete_value_type(id)?;
            Ok(values)
        })?;
        self.db.cache().invalidate(value_type.surrogate());
        debug!(target: "chronicle::catalog", name = value_type.name(), values, "value type deleted");
        self.event(
            ObjectKind::ValueType,
            UpdateEventOperation::Delete,
            id,
            value_type.name().to_string(),
        );
        Ok(())
    }

    fn reload_value_type(&self, id: ObjectId) -> Result<Arc<ValueType>> {
        self.db
            .read(|tables| Loader::new(tables, self.db.cache()).value_type(id))
    }

    // ========== Enumerated values ==========

    fn restricted_id(&self, value_type: &ValueType) -> Result<ObjectId> {
        let id = value_type.surrogate().id()?;
        if !value_type.is_restricted() {
            return Err(Error::InvalidOperation(format!(
                "value type {} is not restricted",
                value_type.name()
            )));
        }
        Ok(id)
    }

    /// Add an enumerated value to a restricted value type
    ///
    /// The value is canonicalized by the value type's scanner.
    pub fn add_value(&self, value_type: &ValueType, value: &str, description: &str) -> Result<Arc<ValueType>> {
        let id = self.restricted_id(value_type)?;
        let scanned = value_type.scan_format(value)?;
        let builtins = self.db.builtins()?;
        self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins).will_modify_value_type(id)?;
            tables.insert_value(id, &scanned, description)?;
            Ok(())
        })?;
        self.event(
            ObjectKind::ValueType,
            UpdateEventOperation::Modify,
            id,
            format!("{} += {}", value_type.name(), scanned),
        );
        self.reload_value_type(id)
    }

    /// Change the description of an enumerated value
    pub fn update_value(&self, value_type: &ValueType, value: &str, description: &str) -> Result<Arc<ValueType>> {
        let id = self.restricted_id(value_type)?;
        let scanned = value_type.scan_format(value)?;
        let builtins = self.db.builtins()?;
        self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins).will_modify_value_type(id)?;
            tables.update_value(id, &scanned, description)?;
            Ok(())
        })?;
        self.event(
            ObjectKind::ValueType,
            UpdateEventOperation::Modify,
            id,
            format!("{}: {}", value_type.name(), scanned),
        );
        self.reload_value_type(id)
    }

    /// Delete an enumerated value no default and no attribute value uses
    pub fn delete_value(&self, value_type: &ValueType, value: &str) -> Result<Arc<ValueType>> {
        let id = self.restricted_id(value_type)?;
        let scanned = value_type.scan_format(value)?;
        let builtins = self.db.builtins()?;
        self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins).will_delete_value(id, &scanned)?;
            tables.delete_value(id, &scanned)?;
            Ok(())
        })?;
        self.event(
            ObjectKind::ValueType,
            UpdateEventOperation::Modify,
            id,
            format!("{} -= {}", value_type.name(), scanned),
        );
        self.reload_value_type(id)
    }

    // ========== Properties ==========

    /// Create a property drawing its values from `value_type`
    pub fn create_property(&self, name: &str, value_type: &ValueType) -> Result<Property> {
        let name = checked_name(name)?;
        let value_type_id = value_type.surrogate().id()?;
        let surrogate = self.db.cache().in_construction(ObjectKind::Property);
        let id = self.db.write(|tables| {
            let id = tables.next_id(ObjectKind::Property);
            tables.insert_property(PropertyRow {
                id,
                value_type: value_type_id,
                label: name.clone(),
            })?;
            Ok(id)
        })?;
        self.db.cache().upgrade(&surrogate, id)?;
        debug!(target: "chronicle::catalog", name = %name, id = id.get(), "property created");
        self.event(ObjectKind::Property, UpdateEventOperation::Create, id, name.clone());
        let value_type = self.reload_value_type(value_type_id)?;
        Ok(Property::new(surrogate, name, value_type))
    }

    /// Property by name
    pub fn property(&self, name: &str) -> Result<Property> {
        self.db
            .read(|tables| Loader::new(tables, self.db.cache()).property_by_name(name))
    }

    /// Properties whose name matches a wildcard pattern, ordered by name
    pub fn properties(&self, pattern: &str) -> Result<Vec<Property>> {
        let pattern = NamePattern::new(pattern)?;
        self.db.read(|tables| {
            let loader = Loader::new(tables, self.db.cache());
            let mut found = tables
                .properties()
                .filter(|row| pattern.matches(&row.label))
                .map(|row| loader.property(row.id))
                .collect::<Result<Vec<_>>>()?;
            found.sort_by(|a, b| a.name().cmp(b.name()));
            Ok(found)
        })
    }

    /// Rename a property
    pub fn rename_property(&self, property: &Property, name: &str) -> Result<Property> {
        let id = property.surrogate().id()?;
        let name = checked_name(name)?;
        let builtins = self.db.builtins()?;
        self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins).will_rename_property(id)?;
            tables.rename_property(id, &name)?;
            Ok(())
        })?;
        self.event(
            ObjectKind::Property,
            UpdateEventOperation::Modify,
            id,
            format!("{} -> {}", property.name(), name),
        );
        Ok(Property::new(property.surrogate().clone(), name, property.value_type().clone()))
    }

    /// Delete a property no schema component and no attribute value uses
    pub fn delete_property(&self, property: &Property) -> Result<()> {
        let id = property.surrogate().id()?;
        let builtins = self.db.builtins()?;
        self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins).will_delete_property(id)?;
            tables.delete_property(id)?;
            Ok(())
        })?;
        self.db.cache().invalidate(property.surrogate());
        debug!(target: "chronicle::catalog", name = property.name(), "property deleted");
        self.event(
            ObjectKind::Property,
            UpdateEventOperation::Delete,
            id,
            property.name().to_string(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseConfig;

    fn catalog() -> Catalog {
        let name = format!("catalog-{}", uuid::Uuid::new_v4());
        Catalog::new(Database::new(DatabaseConfig::named(name)).unwrap())
    }

    #[test]
    fn test_builtins_are_protected() {
        let catalog = catalog();
        let domain = catalog.value_type("timedomain").unwrap();
        assert!(domain.is_builtin());
        assert_eq!(domain.values().len(), 6);
        assert!(matches!(
            catalog.add_value(&domain, "weekly", "Weekly"),
            Err(Error::Protected { .. })
        ));
        assert!(matches!(
            catalog.delete_value_type(&domain),
            Err(Error::Protected { .. })
        ));
        let name = catalog.property("Name").unwrap();
        assert!(matches!(
            catalog.rename_property(&name, "Label"),
            Err(Error::Protected { .. })
        ));
        assert!(matches!(
            catalog.delete_property(&name),
            Err(Error::Protected { .. })
        ));
    }

    #[test]
    fn test_value_type_lifecycle() {
        let catalog = catalog();
        let ccy = catalog.create_value_type("currency", true, "NAME").unwrap();
        assert!(!ccy.surrogate().is_in_construction());

        let ccy = catalog.add_value(&ccy, " USD ", "US dollar").unwrap();
        assert_eq!(ccy.value_description("USD"), Some("US dollar"));
        let ccy = catalog.update_value(&ccy, "USD", "Dollar").unwrap();
        assert_eq!(ccy.value_description("USD"), Some("Dollar"));
        assert!(catalog.add_value(&ccy, "USD", "again").is_err());

        let ccy = catalog.rename_value_type(&ccy, "ccy").unwrap();
        assert_eq!(ccy.name(), "ccy");
        assert!(matches!(
            catalog.value_type("currency"),
            Err(Error::NotFound { kind: ObjectKind::ValueType, .. })
        ));

        catalog.delete_value_type(&ccy).unwrap();
        assert!(ccy.surrogate().is_invalidated());
        assert!(catalog.value_type("ccy").is_err());
    }

    #[test]
    fn test_values_only_on_restricted_types() {
        let catalog = catalog();
        let text = catalog.create_value_type("text", false, "TEXT").unwrap();
        assert!(matches!(
            catalog.add_value(&text, "x", "x"),
            Err(Error::InvalidOperation(_))
        ));
        assert!(catalog.create_value_type("date", false, "DATE").is_err());
        assert!(catalog.create_value_type("bad name", false, "TEXT").is_err());
    }

    #[test]
    fn test_value_type_in_use_by_property() {
        let catalog = catalog();
        let text = catalog.create_value_type("text", false, "TEXT").unwrap();
        let ticker = catalog.create_property("Ticker", &text).unwrap();
        let err = catalog.delete_value_type(&text).unwrap_err();
        assert_eq!(err.in_use_count(), Some(1));

        catalog.delete_property(&ticker).unwrap();
        catalog.delete_value_type(&text).unwrap();
    }

    #[test]
    fn test_listing_by_pattern() {
        let catalog = catalog();
        let text = catalog.create_value_type("text", false, "TEXT").unwrap();
        catalog.create_property("Ticker", &text).unwrap();
        catalog.create_property("Tenor", &text).unwrap();
        let names: Vec<String> = catalog
            .properties("T*")
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["Tenor", "Ticker", "Type"]);
        assert_eq!(catalog.value_types("*").unwrap().len(), 6);
    }

    #[test]
    fn test_rename_property() {
        let catalog = catalog();
        let text = catalog.create_value_type("text", false, "TEXT").unwrap();
        let ticker = catalog.create_property("Ticker", &text).unwrap();
        let symbol = catalog.rename_property(&ticker, "Symbol").unwrap();
        assert_eq!(symbol, ticker);
        assert_eq!(catalog.property("Symbol").unwrap(), ticker);
        assert!(catalog.property("Ticker").is_err());
    }
}
