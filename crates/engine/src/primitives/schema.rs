//! Schema store: lookup, apply and deletion of schemas
//!
//! ## Apply
//!
//! `apply` brings the store in line with an edited [`Schema`]:
//!
//! 1. The schema is resolved and validated together with its base chain.
//! 2. The diff against the stored rows is computed, and every property id
//!    and the base id it needs are looked up. Nothing has been written yet.
//! 3. Inside one write: the usage check for the chronicles depending on the
//!    schema, the header statement, then one statement per component change.
//! 4. On success the surrogate of a new schema is upgraded, events are
//!    queued and the schema is marked persisted.
//!
//! A base chain cycle does not stop an apply; the resolver's partial view is
//! validated instead so the broken chain can be repaired.

use std::sync::Arc;

use chronicle_core::{
    Error, NamePattern, ObjectId, ObjectKind, Result, Surrogate, UpdateEvent,
    UpdateEventOperation,
};
use chronicle_schema::{
    diff, resolve, AttributeDefinition, ComponentChange, ResolvedSchema, Schema, SchemaDiff,
};
use chronicle_storage::{SchemaItemRow, SchemaNameRow};
use tracing::{debug, warn};

use crate::database::Database;
use crate::loader::Loader;
use crate::policy::UpdatePolicy;
use crate::primitives::checked_name;

/// Schema facade
#[derive(Clone)]
pub struct SchemaStore {
    db: Arc<Database>,
}

fn item_row(schema: ObjectId, def: &AttributeDefinition, property: Option<ObjectId>) -> SchemaItemRow {
    SchemaItemRow {
        schema,
        series_nr: def.series_nr(),
        attribute_nr: def.number(),
        property,
        value: def.value().map(str::to_string),
        description: def.description().map(str::to_string),
    }
}

fn property_id(change: &ComponentChange) -> Result<Option<ObjectId>> {
    match change {
        ComponentChange::Create(def) | ComponentChange::Update(def) => {
            def.property().map(|p| p.surrogate().id()).transpose()
        }
        _ => Ok(None),
    }
}

fn change_comment(change: &ComponentChange) -> String {
    match change {
        ComponentChange::Create(def) => format!("component ({}, {}) created", def.series_nr(), def.number()),
        ComponentChange::Update(def) => format!("component ({}, {}) updated", def.series_nr(), def.number()),
        ComponentChange::Delete {
            series_nr,
            attribute_nr,
        } => format!("component ({}, {}) deleted", series_nr, attribute_nr),
        ComponentChange::DeleteSeries { series_nr } => format!("series {} deleted", series_nr),
    }
}

impl SchemaStore {
    /// Create new SchemaStore instance
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// New schema in construction, optionally derived from an applied base
    pub fn new_schema(&self, name: &str, base: Option<&Schema>) -> Result<Schema> {
        let name = checked_name(name)?;
        let builtins = self.db.builtins()?;
        let mut schema = Schema::new(self.db.cache().in_construction(ObjectKind::Schema), name, builtins);
        schema.set_base(base)?;
        Ok(schema)
    }

    /// Schema by name, with its base chain
    pub fn get(&self, name: &str) -> Result<Schema> {
        let builtins = self.db.builtins()?;
        self.db.read(|tables| {
            Loader::new(tables, self.db.cache()).schema_by_name(name, &builtins)
        })
    }

    /// Schema by surrogate, with its base chain
    pub fn get_by_surrogate(&self, surrogate: &Surrogate) -> Result<Schema> {
        let id = surrogate.id()?;
        let builtins = self.db.builtins()?;
        self.db
            .read(|tables| Loader::new(tables, self.db.cache()).schema(id, &builtins))
    }

    /// Schemas whose name matches a wildcard pattern, ordered by name
    pub fn schemas(&self, pattern: &str) -> Result<Vec<Schema>> {
        let pattern = NamePattern::new(pattern)?;
        let builtins = self.db.builtins()?;
        self.db.read(|tables| {
            let loader = Loader::new(tables, self.db.cache());
            let mut found = tables
                .schemas()
                .filter(|row| pattern.matches(&row.label))
                .map(|row| loader.schema(row.id, &builtins))
                .collect::<Result<Vec<_>>>()?;
            found.sort_by(|a, b| a.name().cmp(b.name()));
            Ok(found)
        })
    }

    /// Resolved view of a stored schema
    pub fn resolve(&self, name: &str) -> Result<ResolvedSchema> {
        resolve(&self.get(name)?)
    }

    /// Persist the changes made to a schema since it was loaded or applied
    ///
    /// Returns the diff that was written; an unmodified schema writes nothing.
    ///
    /// # Errors
    ///
    /// - `IncompleteDefinition` / `InvalidValue` if the schema does not resolve
    /// - `Identity` if a property or the base was never applied or is deleted
    /// - `InUse` if chronicles would lose attribute values or series
    /// - `InvalidOperation` if another schema has the same name
    pub fn apply(&self, schema: &mut Schema) -> Result<SchemaDiff> {
        checked_name(schema.name())?;
        let resolved = resolve(schema)?;
        if resolved.cycle_detected() {
            warn!(
                target: "chronicle::schema",
                schema = schema.name(),
                "applying a schema whose base chain has a cycle"
            );
        }

        // the handle's snapshot does not survive a rollback; the rows do
        let builtins = self.db.builtins()?;
        let stored = if schema.is_in_construction() {
            None
        } else {
            let id = schema.surrogate().id()?;
            self.db.read(|tables| {
                Ok(Loader::new(tables, self.db.cache())
                    .schema(id, &builtins)?
                    .persisted()
                    .cloned())
            })?
        };
        schema.set_persisted(stored);

        let changes = diff(schema);
        if changes.is_empty() {
            return Ok(changes);
        }
        let base = schema.base().map(|b| b.surrogate().id()).transpose()?;
        let pending = changes
            .changes
            .iter()
            .map(|change| property_id(change).map(|property| (change, property)))
            .collect::<Result<Vec<_>>>()?;

        let existing = if changes.is_new {
            None
        } else {
            Some(schema.surrogate().id()?)
        };
        let edited: &Schema = schema;
        let id = self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins).will_apply_schema(edited)?;
            if let Some(other) = tables.schema_by_label(edited.name()) {
                if Some(other.id) != existing {
                    return Err(Error::InvalidOperation(format!(
                        "schema name {} already in use",
                        edited.name()
                    )));
                }
            }

            let id = match existing {
                None => {
                    let id = tables.next_id(ObjectKind::Schema);
                    tables.insert_schema(SchemaNameRow {
                        id,
                        parent: base,
                        label: edited.name().to_string(),
                    })?;
                    id
                }
                Some(id) => {
                    if changes.header_changed() {
                        tables.update_schema(SchemaNameRow {
                            id,
                            parent: base,
                            label: edited.name().to_string(),
                        })?;
                    }
                    id
                }
            };

            for (change, property) in &pending {
                match change {
                    ComponentChange::Create(def) => tables.insert_item(item_row(id, def, *property))?,
                    ComponentChange::Update(def) => tables.update_item(item_row(id, def, *property))?,
                    ComponentChange::Delete {
                        series_nr,
                        attribute_nr,
                    } => tables.delete_item(id, *series_nr, *attribute_nr)?,
                    ComponentChange::DeleteSeries { series_nr } => {
                        tables.delete_items_of_series(id, *series_nr);
                    }
                }
            }
            Ok(id)
        })?;

        if changes.is_new {
            self.db.cache().upgrade(schema.surrogate(), id)?;
        }
        debug!(
            target: "chronicle::schema",
            schema = schema.name(),
            id = id.get(),
            created = changes.created(),
            updated = changes.updated(),
            deleted = changes.deleted(),
            "schema applied"
        );
        if changes.header_changed() {
            let operation = if changes.is_new {
                UpdateEventOperation::Create
            } else {
                UpdateEventOperation::Modify
            };
            self.db.publish(
                UpdateEvent::new(ObjectKind::Schema, operation, Some(id)).with_comment(schema.name()),
            );
        }
        for change in &changes.changes {
            let operation = match change {
                ComponentChange::Create(_) => UpdateEventOperation::Create,
                ComponentChange::Update(_) => UpdateEventOperation::Modify,
                _ => UpdateEventOperation::Delete,
            };
            self.db.publish(
                UpdateEvent::new(ObjectKind::Schema, operation, Some(id)).with_comment(change_comment(change)),
            );
        }
        schema.mark_persisted();
        Ok(changes)
    }

    /// Delete a schema no chronicle and no other schema refers to
    pub fn delete(&self, schema: &Schema) -> Result<()> {
        let id = schema.surrogate().id()?;
        let builtins = self.db.builtins()?;
        let items = self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins).will_delete_schema(id)?;
            let items = tables.delete_items_of(id);
            tables.delete_schema(id)?;
            Ok(items)
        })?;
        self.db.cache().invalidate(schema.surrogate());
        debug!(target: "chronicle::schema", schema = schema.name(), items, "schema deleted");
        self.db.publish(
            UpdateEvent::new(ObjectKind::Schema, UpdateEventOperation::Delete, Some(id))
                .with_comment(schema.name()),
        );
        Ok(())
    }
}
