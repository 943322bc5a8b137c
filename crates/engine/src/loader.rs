//! Rebuilding model objects from table rows
//!
//! Every object read back gets the cache's surrogate for its row, so two
//! loads of the same row share one identity.
//!
//! Schemas are loaded together with their base chain. A chain that runs into
//! itself is cut at the repeated schema: that schema is loaded once more,
//! without its base, so the resolver still sees the repetition and stops
//! there.

use std::collections::HashSet;
use std::sync::Arc;

use chronicle_core::{Error, ObjectId, ObjectKind, Result, SurrogateCache};
use chronicle_schema::{
    AttributeDefinition, BuiltIns, Property, Scanner, Schema, ValueType,
};
use chronicle_storage::{SchemaItemRow, Tables};
use tracing::warn;

/// Read-only view of the tables that builds model objects
pub(crate) struct Loader<'a> {
    tables: &'a Tables,
    cache: &'a SurrogateCache,
}

impl<'a> Loader<'a> {
    pub(crate) fn new(tables: &'a Tables, cache: &'a SurrogateCache) -> Self {
        Self { tables, cache }
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    pub(crate) fn value_type(&self, id: ObjectId) -> Result<Arc<ValueType>> {
        let row = self
            .tables
            .value_type(id)
            .ok_or_else(|| Error::not_found(ObjectKind::ValueType, id.to_string()))?;
        let scanner = Scanner::from_external(&row.external_representation)?;
        let value_type = ValueType::new(
            self.cache.assign(ObjectKind::ValueType, id),
            row.label.clone(),
            row.restricted,
            scanner,
        )
        .with_values(self.tables.values_of(id));
        Ok(Arc::new(value_type))
    }

    pub(crate) fn value_type_by_name(&self, name: &str) -> Result<Arc<ValueType>> {
        let row = self
            .tables
            .value_type_by_label(name)
            .ok_or_else(|| Error::not_found(ObjectKind::ValueType, name))?;
        self.value_type(row.id)
    }

    pub(crate) fn property(&self, id: ObjectId) -> Result<Property> {
        let row = self
            .tables
            .property(id)
            .ok_or_else(|| Error::not_found(ObjectKind::Property, id.to_string()))?;
        let value_type = self.value_type(row.value_type)?;
        Ok(Property::new(
            self.cache.assign(ObjectKind::Property, id),
            row.label.clone(),
            value_type,
        ))
    }

    pub(crate) fn property_by_name(&self, name: &str) -> Result<Property> {
        let row = self
            .tables
            .property_by_label(name)
            .ok_or_else(|| Error::not_found(ObjectKind::Property, name))?;
        self.property(row.id)
    }

    /// The reserved properties behind series-level attributes
    pub(crate) fn builtins(&self) -> Result<BuiltIns> {
        let reserved = |nr: u32| -> Result<Property> {
            let id = ObjectId::new(nr)
                .ok_or_else(|| Error::InvalidOperation("reserved id 0".to_string()))?;
            self.property(id)
        };
        Ok(BuiltIns {
            name: reserved(chronicle_core::MAGIC_NAME_NR)?,
            series_type: reserved(chronicle_core::MAGIC_TYPE_NR)?,
            time_domain: reserved(chronicle_core::MAGIC_TIME_DOMAIN_NR)?,
            sparsity: reserved(chronicle_core::MAGIC_SPARSITY_NR)?,
        })
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    pub(crate) fn schema(&self, id: ObjectId, builtins: &Arc<BuiltIns>) -> Result<Schema> {
        let mut visited = HashSet::new();
        self.schema_in_chain(id, builtins, &mut visited)
    }

    pub(crate) fn schema_by_name(&self, name: &str, builtins: &Arc<BuiltIns>) -> Result<Schema> {
        let row = self
            .tables
            .schema_by_label(name)
            .ok_or_else(|| Error::not_found(ObjectKind::Schema, name))?;
        self.schema(row.id, builtins)
    }

    fn schema_in_chain(
        &self,
        id: ObjectId,
        builtins: &Arc<BuiltIns>,
        visited: &mut HashSet<ObjectId>,
    ) -> Result<Schema> {
        let row = self
            .tables
            .schema(id)
            .ok_or_else(|| Error::not_found(ObjectKind::Schema, id.to_string()))?;
        let first_visit = visited.insert(id);
        let base = match row.parent {
            Some(parent) if first_visit => Some(self.schema_in_chain(parent, builtins, visited)?),
            Some(parent) => {
                warn!(
                    target: "chronicle::schema",
                    schema = %row.label,
                    base = parent.get(),
                    "base chain cycle, loading stops here"
                );
                None
            }
            None => None,
        };
        let components = self
            .tables
            .items_of(id)
            .map(|item| self.component(item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema::loaded(
            self.cache.assign(ObjectKind::Schema, id),
            row.label.clone(),
            base,
            components,
            builtins.clone(),
        ))
    }

    fn component(&self, item: &SchemaItemRow) -> Result<AttributeDefinition> {
        Ok(match item.property {
            None => AttributeDefinition::erasing(item.series_nr, item.attribute_nr),
            Some(property) => AttributeDefinition::concrete(
                item.series_nr,
                item.attribute_nr,
                self.property(property)?,
                item.value.clone(),
                item.description.clone(),
            ),
        })
    }
}
