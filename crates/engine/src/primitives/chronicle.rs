//! Chronicle tree and attribute values
//!
//! Chronicles form a tree below a virtual top chronicle that has no row.
//! Full names join the simple names from the top down (`bt.fx.usd`).
//!
//! ## Schemas
//!
//! A chronicle without a schema of its own uses the effective schema of its
//! nearest ancestor. Attribute values may only be set for chronicle-level
//! properties of that effective schema.
//!
//! ## Attribute lookup
//!
//! [`ChronicleStore::attribute_value`] takes the chronicles to search in the
//! caller's order and returns the first value found; it does not walk the
//! tree. [`ChronicleStore::get_attribute`] builds that list itself (the
//! chronicle, then its ancestors nearest first) and falls back to the
//! schema's default value.

use std::sync::Arc;

use chronicle_core::{
    Error, NamingPolicy, ObjectId, ObjectKind, Result, Surrogate, SurrogateCache, UpdateEvent,
    UpdateEventOperation,
};
use chronicle_schema::{resolve, BuiltIns, Property, ResolvedSchema, Schema};
use chronicle_storage::{AttributeValueRow, ChronicleRow, Tables};
use tracing::debug;

use crate::database::Database;
use crate::loader::Loader;
use crate::policy::UpdatePolicy;

// ============================================================================
// Model
// ============================================================================

/// A node of the chronicle tree
///
/// Clones share the surrogate, so applying one clone is visible through all
/// of them.
#[derive(Debug, Clone)]
pub struct Chronicle {
    surrogate: Surrogate,
    name: String,
    full_name: String,
    description: String,
    parent: Option<Surrogate>,
    schema: Option<Surrogate>,
}

impl Chronicle {
    /// Identity handle
    pub fn surrogate(&self) -> &Surrogate {
        &self.surrogate
    }

    /// Simple name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full name, starting with the top chronicle
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parent, `None` directly below the top chronicle
    pub fn parent(&self) -> Option<&Surrogate> {
        self.parent.as_ref()
    }

    /// Own schema, `None` when inherited
    pub fn schema(&self) -> Option<&Surrogate> {
        self.schema.as_ref()
    }

    /// True until applied
    pub fn is_in_construction(&self) -> bool {
        self.surrogate.is_in_construction()
    }

    /// Change the description; persisted by the next apply
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Set or clear the own schema of a chronicle in construction
    ///
    /// Applying an existing chronicle whose schema was changed fails.
    pub fn set_schema(&mut self, schema: Option<&Schema>) -> Result<()> {
        if let Some(schema) = schema {
            schema.surrogate().id()?;
        }
        self.schema = schema.map(|s| s.surrogate().clone());
        Ok(())
    }
}

/// A stored attribute value and the chronicle it was found on
#[derive(Debug, Clone)]
pub struct AttributeValue {
    /// Chronicle holding the value
    pub chronicle: Surrogate,
    /// Canonical value
    pub value: String,
    /// Optional description
    pub description: Option<String>,
}

fn chronicle_from_row(
    tables: &Tables,
    cache: &SurrogateCache,
    naming: &dyn NamingPolicy,
    row: &ChronicleRow,
) -> Chronicle {
    let mut names: Vec<&str> = tables
        .ancestors(row.id)
        .into_iter()
        .rev()
        .map(|ancestor| ancestor.name.as_str())
        .collect();
    names.push(&row.name);
    Chronicle {
        surrogate: cache.assign(ObjectKind::Chronicle, row.id),
        name: row.name.clone(),
        full_name: naming.full_name(&names),
        description: row.description.clone(),
        parent: row.parent.map(|id| cache.assign(ObjectKind::Chronicle, id)),
        schema: row.schema.map(|id| cache.assign(ObjectKind::Schema, id)),
    }
}

fn first_value<'t>(tables: &'t Tables, chronicles: &[ObjectId], property: ObjectId) -> Option<&'t AttributeValueRow> {
    chronicles
        .iter()
        .find_map(|chronicle| tables.attribute_value(*chronicle, property))
}

// ============================================================================
// Store
// ============================================================================

/// Chronicle facade
#[derive(Clone)]
pub struct ChronicleStore {
    db: Arc<Database>,
}

impl ChronicleStore {
    /// Create new ChronicleStore instance
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn event(&self, operation: UpdateEventOperation, id: ObjectId, comment: impl Into<String>) {
        self.db
            .publish(UpdateEvent::new(ObjectKind::Chronicle, operation, Some(id)).with_comment(comment));
    }

    /// New chronicle in construction below `parent` (the top chronicle if `None`)
    pub fn new_chronicle(
        &self,
        parent: Option<&Chronicle>,
        name: &str,
        description: &str,
        schema: Option<&Schema>,
    ) -> Result<Chronicle> {
        let naming = self.db.naming();
        naming.check_simple_name(name)?;
        let full_name = match parent {
            Some(parent) => format!("{}{}{}", parent.full_name, naming.separator(), name),
            None => naming.full_name(&[name]),
        };
        let mut chronicle = Chronicle {
            surrogate: self.db.cache().in_construction(ObjectKind::Chronicle),
            name: name.to_string(),
            full_name,
            description: description.to_string(),
            parent: parent.map(|p| p.surrogate.clone()),
            schema: None,
        };
        chronicle.set_schema(schema)?;
        Ok(chronicle)
    }

    /// Give a chronicle a new simple name; persisted by the next apply
    pub fn rename(&self, chronicle: &mut Chronicle, name: &str) -> Result<()> {
        let naming = self.db.naming();
        naming.check_simple_name(name)?;
        let (parent, _) = naming.split(&chronicle.full_name)?;
        chronicle.full_name = match parent {
            Some(parent) => format!("{}{}{}", parent, naming.separator(), name),
            None => naming.full_name(&[name]),
        };
        chronicle.name = name.to_string();
        Ok(())
    }

    /// Insert a chronicle in construction, or write the name and description
    /// of an existing one
    ///
    /// The schema of an existing chronicle is fixed: its attribute values and
    /// series depend on it.
    pub fn apply(&self, chronicle: &mut Chronicle) -> Result<()> {
        let parent = chronicle.parent.as_ref().map(Surrogate::id).transpose()?;
        let schema = chronicle.schema.as_ref().map(Surrogate::id).transpose()?;

        if chronicle.is_in_construction() {
            let (id, stored_schema) = self.db.write(|tables| {
                if tables.chronicle_by_name(parent, &chronicle.name).is_some() {
                    return Err(Error::InvalidOperation(format!(
                        "chronicle {} already exists",
                        chronicle.full_name
                    )));
                }
                let inherited = parent.and_then(|p| tables.effective_schema(p));
                let stored_schema = if schema == inherited { None } else { schema };
                let id = tables.next_id(ObjectKind::Chronicle);
                tables.insert_chronicle(ChronicleRow {
                    id,
                    parent,
                    schema: stored_schema,
                    name: chronicle.name.clone(),
                    description: chronicle.description.clone(),
                })?;
                Ok((id, stored_schema))
            })?;
            self.db.cache().upgrade(&chronicle.surrogate, id)?;
            if stored_schema.is_none() {
                chronicle.schema = None;
            }
            debug!(target: "chronicle::chronicle", name = %chronicle.full_name, id = id.get(), "chronicle created");
            self.event(UpdateEventOperation::Create, id, chronicle.full_name.clone());
        } else {
            let id = chronicle.surrogate.id()?;
            self.db.write(|tables| {
                let stored_schema = tables
                    .chronicle(id)
                    .map(|row| row.schema)
                    .ok_or_else(|| Error::not_found(ObjectKind::Chronicle, chronicle.full_name.clone()))?;
                let inherited = parent.and_then(|p| tables.effective_schema(p));
                let wanted = if schema == inherited { None } else { schema };
                if stored_schema != wanted {
                    return Err(Error::InvalidOperation(format!(
                        "schema of existing chronicle {} cannot be changed",
                        chronicle.full_name
                    )));
                }
                tables.update_chronicle(ChronicleRow {
                    id,
                    parent,
                    schema: stored_schema,
                    name: chronicle.name.clone(),
                    description: chronicle.description.clone(),
                })?;
                Ok(())
            })?;
            self.event(UpdateEventOperation::Modify, id, chronicle.full_name.clone());
        }
        Ok(())
    }

    /// Delete a chronicle without children and series, with its attribute values
    pub fn delete(&self, chronicle: &Chronicle) -> Result<()> {
        let id = chronicle.surrogate.id()?;
        let builtins = self.db.builtins()?;
        let values = self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins)
                .will_delete_chronicle(id, &chronicle.full_name)?;
            let values = tables.delete_attribute_values_of(id);
            tables.delete_chronicle(id)?;
            Ok(values)
        })?;
        self.db.cache().invalidate(&chronicle.surrogate);
        debug!(target: "chronicle::chronicle", name = %chronicle.full_name, values, "chronicle deleted");
        self.event(
            UpdateEventOperation::Delete,
            id,
            format!("{} - {}", chronicle.full_name, chronicle.description),
        );
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Chronicle by full name
    pub fn get(&self, full_name: &str) -> Result<Chronicle> {
        let naming = self.db.naming();
        let segments = naming.segments(full_name)?;
        if segments.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "{} names the top chronicle",
                full_name
            )));
        }
        self.db.read(|tables| {
            let mut current: Option<&ChronicleRow> = None;
            for segment in &segments {
                let parent = current.map(|row| row.id);
                current = Some(
                    tables
                        .chronicle_by_name(parent, segment)
                        .ok_or_else(|| Error::not_found(ObjectKind::Chronicle, full_name))?,
                );
            }
            let row = current.ok_or_else(|| Error::not_found(ObjectKind::Chronicle, full_name))?;
            Ok(chronicle_from_row(tables, self.db.cache(), naming, row))
        })
    }

    /// Chronicle by surrogate
    pub fn get_by_surrogate(&self, surrogate: &Surrogate) -> Result<Chronicle> {
        let id = surrogate.id()?;
        self.db.read(|tables| {
            let row = tables
                .chronicle(id)
                .ok_or_else(|| Error::not_found(ObjectKind::Chronicle, id.to_string()))?;
            Ok(chronicle_from_row(tables, self.db.cache(), self.db.naming(), row))
        })
    }

    /// Children ordered by name; the top chronicle's children if `parent` is `None`
    pub fn children(&self, parent: Option<&Chronicle>) -> Result<Vec<Chronicle>> {
        let parent = parent.map(|p| p.surrogate.id()).transpose()?;
        self.db.read(|tables| {
            Ok(tables
                .children(parent)
                .into_iter()
                .map(|row| chronicle_from_row(tables, self.db.cache(), self.db.naming(), row))
                .collect())
        })
    }

    /// Ancestors, nearest first, not including the top chronicle
    pub fn ancestors(&self, chronicle: &Chronicle) -> Result<Vec<Chronicle>> {
        let id = chronicle.surrogate.id()?;
        self.db.read(|tables| {
            Ok(tables
                .ancestors(id)
                .into_iter()
                .map(|row| chronicle_from_row(tables, self.db.cache(), self.db.naming(), row))
                .collect())
        })
    }

    /// Own schema, or that of the nearest ancestor having one
    pub fn effective_schema(&self, chronicle: &Chronicle) -> Result<Option<Schema>> {
        let id = chronicle.surrogate.id()?;
        let builtins = self.db.builtins()?;
        self.db.read(|tables| {
            tables
                .effective_schema(id)
                .map(|schema| Loader::new(tables, self.db.cache()).schema(schema, &builtins))
                .transpose()
        })
    }

    /// Resolved effective schema
    pub fn resolved_schema(&self, chronicle: &Chronicle) -> Result<Option<ResolvedSchema>> {
        let id = chronicle.surrogate.id()?;
        let builtins = self.db.builtins()?;
        self.db.read(|tables| self.resolved_in(tables, id, &builtins))
    }

    fn resolved_in(&self, tables: &Tables, id: ObjectId, builtins: &Arc<BuiltIns>) -> Result<Option<ResolvedSchema>> {
        match tables.effective_schema(id) {
            Some(schema) => {
                let schema = Loader::new(tables, self.db.cache()).schema(schema, builtins)?;
                resolve(&schema).map(Some)
            }
            None => Ok(None),
        }
    }

    // ========================================================================
    // Attribute values
    // ========================================================================

    /// Store the value of a chronicle-level property of the effective schema
    ///
    /// Returns the canonical value stored.
    pub fn set_attribute(
        &self,
        chronicle: &Chronicle,
        property: &Property,
        value: &str,
        description: Option<&str>,
    ) -> Result<String> {
        let id = chronicle.surrogate.id()?;
        let property_id = property.surrogate().id()?;
        let builtins = self.db.builtins()?;
        let scanned = self.db.write(|tables| {
            let resolved = self.resolved_in(tables, id, &builtins)?.ok_or_else(|| {
                Error::InvalidOperation(format!("chronicle {} has no schema", chronicle.full_name))
            })?;
            let definition = resolved.attribute_by_name(property.name())?;
            let scanned = property.scan(value)?;
            tables.upsert_attribute_value(AttributeValueRow {
                chronicle: id,
                attribute_nr: definition.number(),
                property: property_id,
                value: scanned.clone(),
                description: description.map(str::to_string),
            })?;
            Ok(scanned)
        })?;
        self.event(
            UpdateEventOperation::Modify,
            id,
            format!("{}={}", property.name(), scanned),
        );
        Ok(scanned)
    }

    /// Remove the value of a property, returning whether there was one
    pub fn reset_attribute(&self, chronicle: &Chronicle, property: &Property) -> Result<bool> {
        let id = chronicle.surrogate.id()?;
        let property_id = property.surrogate().id()?;
        let removed = self
            .db
            .write(|tables| Ok(tables.delete_attribute_value(id, property_id)))?;
        if removed {
            self.event(
                UpdateEventOperation::Modify,
                id,
                format!("{} reset", property.name()),
            );
        }
        Ok(removed)
    }

    /// First value of `property` stored on any of `chronicles`, in list order
    pub fn attribute_value(&self, chronicles: &[Chronicle], property: &Property) -> Result<Option<AttributeValue>> {
        let max = self.db.config().max_lookup_depth;
        if chronicles.len() > max {
            return Err(Error::InvalidOperation(format!(
                "lookup over {} chronicles exceeds the limit of {}",
                chronicles.len(),
                max
            )));
        }
        let property_id = property.surrogate().id()?;
        let ids = chronicles
            .iter()
            .map(|c| c.surrogate.id())
            .collect::<Result<Vec<_>>>()?;
        self.db.read(|tables| {
            Ok(first_value(tables, &ids, property_id).map(|row| AttributeValue {
                chronicle: self.db.cache().assign(ObjectKind::Chronicle, row.chronicle),
                value: row.value.clone(),
                description: row.description.clone(),
            }))
        })
    }

    /// Value of `property` for a chronicle: its own, else the nearest
    /// ancestor's, else the default of its effective schema
    pub fn get_attribute(&self, chronicle: &Chronicle, property: &Property) -> Result<Option<String>> {
        let id = chronicle.surrogate.id()?;
        let property_id = property.surrogate().id()?;
        let builtins = self.db.builtins()?;
        self.db.read(|tables| {
            let mut lineage = vec![id];
            lineage.extend(tables.ancestors(id).into_iter().map(|row| row.id));
            if let Some(row) = first_value(tables, &lineage, property_id) {
                return Ok(Some(row.value.clone()));
            }
            Ok(self.resolved_in(tables, id, &builtins)?.and_then(|resolved| {
                resolved
                    .attribute_by_name(property.name())
                    .ok()
                    .and_then(|def| def.value().map(str::to_string))
            }))
        })
    }

    /// Chronicles storing `value` for `property`, ordered by full name
    ///
    /// Fails if more than `max` chronicles match.
    pub fn chronicles_by_attribute_value(&self, property: &Property, value: &str, max: usize) -> Result<Vec<Chronicle>> {
        let property_id = property.surrogate().id()?;
        let scanned = property.scan(value)?;
        self.db.read(|tables| {
            let ids: Vec<ObjectId> = tables
                .attribute_values()
                .filter(|row| row.property == property_id && row.value == scanned)
                .map(|row| row.chronicle)
                .collect();
            if ids.len() > max {
                return Err(Error::InvalidOperation(format!(
                    "{} chronicles have {}={}, more than {}",
                    ids.len(),
                    property.name(),
                    scanned,
                    max
                )));
            }
            let mut found = ids
                .into_iter()
                .filter_map(|id| tables.chronicle(id))
                .map(|row| chronicle_from_row(tables, self.db.cache(), self.db.naming(), row))
                .collect::<Vec<_>>();
            found.sort_by(|a, b| a.full_name.cmp(&b.full_name));
            Ok(found)
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
