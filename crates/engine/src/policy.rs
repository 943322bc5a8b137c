//! Update Policy Engine
//!
//! Usage checks run before a destructive or narrowing mutation. Each check
//! reads the tables of the open transaction, inside the same `write` as the
//! mutation it guards, and either lets the mutation through or rejects it:
//!
//! - `Protected` for built-in catalog entries
//! - `InUse` with the number of dependents found
//!
//! Checks never write.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chronicle_core::{Error, ObjectId, ObjectKind, Result, SurrogateCache};
use chronicle_schema::{resolve_unchecked, BuiltIns, ResolvedSchema, Schema};
use chronicle_storage::Tables;
use tracing::debug;

use crate::loader::Loader;

/// Usage checks over the tables of the open transaction
pub(crate) struct UpdatePolicy<'a> {
    tables: &'a Tables,
    loader: Loader<'a>,
    builtins: &'a Arc<BuiltIns>,
}

fn rejected(kind: ObjectKind, name: &str, count: usize) -> Result<()> {
    if count == 0 {
        return Ok(());
    }
    debug!(target: "chronicle::policy", kind = %kind, name, count, "mutation rejected");
    Err(Error::in_use(kind, name, count))
}

impl<'a> UpdatePolicy<'a> {
    pub(crate) fn new(tables: &'a Tables, cache: &'a SurrogateCache, builtins: &'a Arc<BuiltIns>) -> Self {
        Self {
            tables,
            loader: Loader::new(tables, cache),
            builtins,
        }
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    fn value_type_label(&self, id: ObjectId) -> Result<&'a str> {
        self.tables
            .value_type(id)
            .map(|row| row.label.as_str())
            .ok_or_else(|| Error::not_found(ObjectKind::ValueType, id.to_string()))
    }

    fn property_label(&self, id: ObjectId) -> Result<&'a str> {
        self.tables
            .property(id)
            .map(|row| row.label.as_str())
            .ok_or_else(|| Error::not_found(ObjectKind::Property, id.to_string()))
    }

    /// Renames and enumeration edits are refused on built-in value types
    pub(crate) fn will_modify_value_type(&self, id: ObjectId) -> Result<()> {
        let label = self.value_type_label(id)?;
        if id.is_magic() {
            return Err(Error::protected(ObjectKind::ValueType, label));
        }
        Ok(())
    }

    pub(crate) fn will_delete_value_type(&self, id: ObjectId) -> Result<()> {
        self.will_modify_value_type(id)?;
        let users = self
            .tables
            .properties()
            .filter(|row| row.value_type == id)
            .count();
        rejected(ObjectKind::ValueType, self.value_type_label(id)?, users)
    }

    /// An enumerated value may go once no default and no attribute value uses it
    pub(crate) fn will_delete_value(&self, id: ObjectId, value: &str) -> Result<()> {
        self.will_modify_value_type(id)?;
        let typed: HashSet<ObjectId> = self
            .tables
            .properties()
            .filter(|row| row.value_type == id)
            .map(|row| row.id)
            .collect();
        let defaults = self
            .tables
            .schema_items()
            .filter(|item| {
                item.property.map_or(false, |p| typed.contains(&p))
                    && item.value.as_deref() == Some(value)
            })
            .count();
        let values = self
            .tables
            .attribute_values()
            .filter(|row| typed.contains(&row.property) && row.value == value)
            .count();
        let name = format!("{}:{}", self.value_type_label(id)?, value);
        rejected(ObjectKind::ValueType, &name, defaults + values)
    }

    pub(crate) fn will_rename_property(&self, id: ObjectId) -> Result<()> {
        let label = self.property_label(id)?;
        if id.is_magic() {
            return Err(Error::protected(ObjectKind::Property, label));
        }
        Ok(())
    }

    /// A property may go once nothing refers to it
    ///
    /// The `InUse` count adds the schema components using the property and
    /// the attribute values stored under it.
    pub(crate) fn will_delete_property(&self, id: ObjectId) -> Result<()> {
        self.will_rename_property(id)?;
        let components = self
            .tables
            .schema_items()
            .filter(|item| item.property == Some(id))
            .count();
        let values = self
            .tables
            .attribute_values()
            .filter(|row| row.property == id)
            .count();
        rejected(ObjectKind::Property, self.property_label(id)?, components + values)
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    /// A schema may go once no chronicle and no other schema refers to it
    pub(crate) fn will_delete_schema(&self, id: ObjectId) -> Result<()> {
        let label = self
            .tables
            .schema(id)
            .map(|row| row.label.as_str())
            .ok_or_else(|| Error::not_found(ObjectKind::Schema, id.to_string()))?;
        let chronicles = self
            .tables
            .chronicles()
            .filter(|row| row.schema == Some(id))
            .count();
        let derived = self
            .tables
            .schemas()
            .filter(|row| row.parent == Some(id) && row.id != id)
            .count();
        rejected(ObjectKind::Schema, label, chronicles + derived)
    }

    /// An edited schema may be applied unless it takes away something
    /// chronicles depending on it hold data under
    ///
    /// Every distinct effective schema whose chain contains the edited schema
    /// is resolved twice: as stored, and with the edited schema substituted.
    /// Data is lost when a chronicle holds
    /// - a value for a chronicle-level property no longer provided
    /// - a series under a number no longer provided
    /// - a series whose value type or time domain changed
    pub(crate) fn will_apply_schema(&self, edited: &Schema) -> Result<()> {
        let id = match edited.surrogate().assigned_id() {
            Some(id) => id,
            None => return Ok(()),
        };
        let mut dependents: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
        for row in self.tables.chronicles() {
            if let Some(effective) = self.tables.effective_schema(row.id) {
                if self.tables.schema_chain(effective).contains(&id) {
                    dependents.entry(effective).or_default().push(row.id);
                }
            }
        }

        let mut lost = 0;
        for (schema_id, chronicles) in dependents {
            let stored = self.loader.schema(schema_id, self.builtins)?;
            let before = resolve_unchecked(&stored);
            let after = resolve_unchecked(&stored.replace_in_chain(edited));
            lost += self.lost_data(&before, &after, &chronicles);
        }
        rejected(ObjectKind::Schema, edited.name(), lost)
    }

    fn lost_data(&self, before: &ResolvedSchema, after: &ResolvedSchema, chronicles: &[ObjectId]) -> usize {
        let provided: HashSet<ObjectId> = after
            .attribute_definitions()
            .filter_map(|def| def.property())
            .filter_map(|property| property.surrogate().assigned_id())
            .collect();
        let mut lost = 0;
        for def in before.attribute_definitions() {
            let property = match def.property().and_then(|p| p.surrogate().assigned_id()) {
                Some(property) if !provided.contains(&property) => property,
                _ => continue,
            };
            lost += chronicles
                .iter()
                .filter(|chronicle| self.tables.attribute_value(**chronicle, property).is_some())
                .count();
        }
        for series in before.series_definitions() {
            let changed = match after.series(series.number()) {
                None => true,
                Some(now) => {
                    now.value_type() != series.value_type() || now.time_domain() != series.time_domain()
                }
            };
            if changed {
                lost += chronicles
                    .iter()
                    .filter(|chronicle| {
                        self.tables
                            .series_by_number(**chronicle, series.number())
                            .is_some()
                    })
                    .count();
            }
        }
        lost
    }

    // =========================================================================
    // Chronicles and series
    // =========================================================================

    /// A chronicle may go once it has no children and no series
    pub(crate) fn will_delete_chronicle(&self, id: ObjectId, full_name: &str) -> Result<()> {
        let children = self.tables.children(Some(id)).len();
        let series = self.tables.series_of(id).len();
        rejected(ObjectKind::Chronicle, full_name, children + series)
    }

    /// A series may go once it holds no observations
    pub(crate) fn will_delete_series(&self, id: ObjectId, name: &str) -> Result<()> {
        rejected(ObjectKind::Series, name, self.tables.observation_count(id))
    }
}
