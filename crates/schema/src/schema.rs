//! Editable schemas
//!
//! A [`Schema`] holds only its own components: additions, overrides of
//! inherited components, and erasing tombstones. The inherited part is always
//! computed from the base chain by the resolver.
//!
//! Some constraints are checked as soon as an edit is made:
//! - adding a component whose key is already an own component
//! - giving a series a name another series already uses
//! - using a schema still in construction as base
//! - setting a property that rejects the current default value
//!
//! Everything else (completeness, unique properties, default values without
//! a property) is checked when the schema is resolved.

use std::collections::HashSet;
use std::sync::Arc;

use chronicle_core::{
    Error, ObjectId, Result, Surrogate, MAGIC_NAME_NR, MAGIC_SPARSITY_NR, MAGIC_TIME_DOMAIN_NR,
    MAGIC_TYPE_NR,
};

use crate::attribute::{AttributeDefinition, ComponentKey};
use crate::builtin::BuiltIns;
use crate::property::Property;
use crate::resolver::{self, ComponentTable};
use crate::series::SeriesDefinition;

fn not_defined(schema: &str, series: u32, attribute: u32) -> Error {
    Error::NotDefined {
        schema: schema.to_string(),
        series,
        attribute,
    }
}

fn duplicate(schema: &str, series: u32, attribute: u32) -> Error {
    Error::DuplicateComponent {
        schema: schema.to_string(),
        series,
        attribute,
    }
}

/// Header and components as last written to the store
#[derive(Debug, Clone)]
pub struct PersistedState {
    /// Persisted name
    pub name: String,
    /// Persisted base id
    pub base: Option<ObjectId>,
    /// Persisted own components
    pub components: ComponentTable,
}

/// Editable schema with its own components and its base chain
#[derive(Debug, Clone)]
pub struct Schema {
    surrogate: Surrogate,
    name: String,
    base: Option<Box<Schema>>,
    components: ComponentTable,
    persisted: Option<PersistedState>,
    builtins: Arc<BuiltIns>,
}

impl Schema {
    /// New, empty schema
    pub fn new(surrogate: Surrogate, name: impl Into<String>, builtins: Arc<BuiltIns>) -> Self {
        Self {
            surrogate,
            name: name.into(),
            base: None,
            components: ComponentTable::new(),
            persisted: None,
            builtins,
        }
    }

    /// Schema read back from the store, marked as persisted
    pub fn loaded(
        surrogate: Surrogate,
        name: impl Into<String>,
        base: Option<Schema>,
        components: impl IntoIterator<Item = AttributeDefinition>,
        builtins: Arc<BuiltIns>,
    ) -> Self {
        let mut schema = Self {
            surrogate,
            name: name.into(),
            base: base.map(Box::new),
            components: components.into_iter().map(|def| (def.key(), def)).collect(),
            persisted: None,
            builtins,
        };
        schema.mark_persisted();
        schema
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Identity handle
    pub fn surrogate(&self) -> &Surrogate {
        &self.surrogate
    }

    /// Name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base schema
    pub fn base(&self) -> Option<&Schema> {
        self.base.as_deref()
    }

    /// Id of the base schema, if it has one
    pub fn base_id(&self) -> Option<ObjectId> {
        self.base.as_ref().and_then(|b| b.surrogate.assigned_id())
    }

    /// Reserved properties used by series-level edits
    pub fn builtins(&self) -> &Arc<BuiltIns> {
        &self.builtins
    }

    /// True until applied
    pub fn is_in_construction(&self) -> bool {
        self.surrogate.is_in_construction()
    }

    /// Own components, ordered by key
    pub fn own_components(&self) -> &ComponentTable {
        &self.components
    }

    /// Own component by key
    pub fn own_component(&self, series_nr: u32, attribute_nr: u32) -> Option<&AttributeDefinition> {
        self.components.get(&(series_nr, attribute_nr))
    }

    /// Own view of one series, including an erasing header
    pub fn own_series(&self, series_nr: u32) -> Option<SeriesDefinition> {
        let series = SeriesDefinition::from_components(series_nr, self.components.values());
        if series.attributes().is_empty() {
            None
        } else {
            Some(series)
        }
    }

    /// State at the last apply or load
    pub fn persisted(&self) -> Option<&PersistedState> {
        self.persisted.as_ref()
    }

    /// True if this schema is `target` or has it anywhere in its base chain
    pub fn depends_on(&self, target: &Surrogate) -> bool {
        let mut current = Some(self);
        let mut seen = HashSet::new();
        while let Some(schema) = current {
            if schema.surrogate == *target {
                return true;
            }
            if let Some(id) = schema.surrogate.assigned_id() {
                if !seen.insert(id) {
                    return false;
                }
            }
            current = schema.base();
        }
        false
    }

    /// Copy of this schema with `replacement` standing in for the schema of
    /// the same identity anywhere in the chain
    pub fn replace_in_chain(&self, replacement: &Schema) -> Schema {
        if self.surrogate == replacement.surrogate {
            return replacement.clone();
        }
        let mut copy = self.clone();
        copy.base = self
            .base
            .as_ref()
            .map(|base| Box::new(base.replace_in_chain(replacement)));
        copy
    }

    /// Record the current state as persisted
    pub fn mark_persisted(&mut self) {
        self.persisted = Some(PersistedState {
            name: self.name.clone(),
            base: self.base_id(),
            components: self.components.clone(),
        });
    }

    /// Replace the persisted state, typically with the rows currently stored
    pub fn set_persisted(&mut self, state: Option<PersistedState>) {
        self.persisted = state;
    }

    /// True if the schema differs from its persisted state
    pub fn is_modified(&self) -> bool {
        match &self.persisted {
            None => true,
            Some(p) => {
                p.name != self.name
                    || p.base != self.base_id()
                    || p.components.len() != self.components.len()
                    || p.components
                        .iter()
                        .zip(self.components.iter())
                        .any(|((_, a), (_, b))| !a.content_eq(b))
            }
        }
    }

    fn inherited(&self) -> ComponentTable {
        match &self.base {
            Some(base) => {
                let mut visited = HashSet::new();
                if let Some(id) = self.surrogate.assigned_id() {
                    visited.insert(id);
                }
                let mut cycle = false;
                resolver::merge_into(base, &mut visited, &mut cycle)
            }
            None => ComponentTable::new(),
        }
    }

    fn merged(&self) -> ComponentTable {
        let mut table = self.inherited();
        resolver::overlay(&mut table, &self.components);
        table
    }

    // =========================================================================
    // Header edits
    // =========================================================================

    /// Rename the schema
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidOperation("schema name is empty".to_string()));
        }
        self.name = name.to_string();
        Ok(())
    }

    /// Set or clear the base schema
    ///
    /// The base must have been applied; a base still in construction has no
    /// id to persist.
    pub fn set_base(&mut self, base: Option<&Schema>) -> Result<()> {
        if let Some(base) = base {
            base.surrogate.id()?;
        }
        self.base = base.map(|b| Box::new(b.clone()));
        Ok(())
    }

    // =========================================================================
    // Attribute edits
    // =========================================================================

    /// Add an empty own component
    ///
    /// An inherited component with the same key is overridden.
    pub fn add_attribute(&mut self, series_nr: u32, attribute_nr: u32) -> Result<()> {
        if attribute_nr == 0 {
            return Err(Error::InvalidOperation(
                "attribute numbers start at 1".to_string(),
            ));
        }
        let key = (series_nr, attribute_nr);
        if self.components.contains_key(&key) {
            return Err(duplicate(&self.name, series_nr, attribute_nr));
        }
        if series_nr > 0 && !self.merged().contains_key(&(series_nr, MAGIC_NAME_NR)) {
            return Err(not_defined(&self.name, series_nr, MAGIC_NAME_NR));
        }
        self.components
            .insert(key, AttributeDefinition::new(series_nr, attribute_nr));
        Ok(())
    }

    /// Set the property of a component, re-checking its default value
    pub fn set_attribute_property(
        &mut self,
        series_nr: u32,
        attribute_nr: u32,
        property: &Property,
    ) -> Result<()> {
        let def = self.editable(series_nr, attribute_nr)?;
        if let Some(value) = def.value().map(str::to_string) {
            let scanned = property.scan(&value)?;
            def.set_value(Some(scanned));
        }
        def.set_property(property.clone());
        Ok(())
    }

    /// Set the default value of a component
    ///
    /// Without a property the raw value is kept and checked at resolve time.
    pub fn set_attribute_default(
        &mut self,
        series_nr: u32,
        attribute_nr: u32,
        value: Option<&str>,
    ) -> Result<()> {
        let def = self.editable(series_nr, attribute_nr)?;
        let value = match (value, def.property()) {
            (Some(v), Some(property)) => Some(property.scan(v)?),
            (Some(v), None) => Some(v.to_string()),
            (None, _) => None,
        };
        def.set_value(value);
        Ok(())
    }

    /// Set the description of a component
    pub fn set_attribute_description(
        &mut self,
        series_nr: u32,
        attribute_nr: u32,
        description: Option<&str>,
    ) -> Result<()> {
        let def = self.editable(series_nr, attribute_nr)?;
        def.set_description(description.map(str::to_string));
        Ok(())
    }

    /// Remove an own component
    pub fn delete_attribute(&mut self, series_nr: u32, attribute_nr: u32) -> Result<()> {
        if series_nr > 0 && attribute_nr == MAGIC_NAME_NR {
            return Err(Error::InvalidOperation(
                "a series header is removed with delete_series".to_string(),
            ));
        }
        self.components
            .remove(&(series_nr, attribute_nr))
            .map(|_| ())
            .ok_or_else(|| not_defined(&self.name, series_nr, attribute_nr))
    }

    /// Replace an inherited component with a tombstone
    pub fn erase_attribute(&mut self, series_nr: u32, attribute_nr: u32) -> Result<()> {
        if series_nr > 0 && attribute_nr == MAGIC_NAME_NR {
            return Err(Error::InvalidOperation(
                "a series header is erased with erase_series".to_string(),
            ));
        }
        let key = (series_nr, attribute_nr);
        if !self.inherited().contains_key(&key) {
            return Err(if self.components.contains_key(&key) {
                Error::InvalidOperation(format!(
                    "component ({}, {}) of schema {} is not inherited, delete it instead",
                    series_nr, attribute_nr, self.name
                ))
            } else {
                not_defined(&self.name, series_nr, attribute_nr)
            });
        }
        self.components
            .insert(key, AttributeDefinition::erasing(series_nr, attribute_nr));
        Ok(())
    }

    fn editable(&mut self, series_nr: u32, attribute_nr: u32) -> Result<&mut AttributeDefinition> {
        let key = (series_nr, attribute_nr);
        match self.components.get(&key) {
            Some(def) if def.is_erasing() => {
                return Err(Error::InvalidOperation(format!(
                    "component ({}, {}) of schema {} is erased",
                    series_nr, attribute_nr, self.name
                )));
            }
            Some(_) => {}
            None => {
                let inherited = self
                    .inherited()
                    .remove(&key)
                    .ok_or_else(|| not_defined(&self.name, series_nr, attribute_nr))?;
                self.components.insert(key, inherited);
            }
        }
        let missing = not_defined(&self.name, series_nr, attribute_nr);
        self.components.get_mut(&key).ok_or(missing)
    }

    // =========================================================================
    // Series edits
    // =========================================================================

    /// Add a series, initially without name, type or time domain
    ///
    /// An inherited series with the same number is overridden by the new header.
    pub fn add_series(&mut self, series_nr: u32) -> Result<()> {
        if series_nr == 0 {
            return Err(Error::InvalidOperation(
                "series numbers start at 1".to_string(),
            ));
        }
        let key = (series_nr, MAGIC_NAME_NR);
        if self.components.contains_key(&key) {
            return Err(duplicate(&self.name, series_nr, MAGIC_NAME_NR));
        }
        let header = AttributeDefinition::concrete(
            series_nr,
            MAGIC_NAME_NR,
            self.builtins.name.clone(),
            None,
            None,
        );
        self.components.insert(key, header);
        Ok(())
    }

    /// Name a series; names must be unique across the resolved schema
    pub fn set_series_name(&mut self, series_nr: u32, name: &str) -> Result<()> {
        let scanned = self.builtins.name.scan(name)?;
        let merged = self.merged();
        if !merged.contains_key(&(series_nr, MAGIC_NAME_NR)) {
            return Err(not_defined(&self.name, series_nr, MAGIC_NAME_NR));
        }
        let clash = merged
            .values()
            .find(|def| {
                def.is_series_header()
                    && def.series_nr() != series_nr
                    && def.value() == Some(scanned.as_str())
            })
            .map(|def| def.series_nr());
        if let Some(other) = clash {
            return Err(Error::IncompleteDefinition(format!(
                "schema {}: series name {} already used by series {}",
                self.name, scanned, other
            )));
        }
        self.series_slot(series_nr, MAGIC_NAME_NR)?
            .set_value(Some(scanned));
        Ok(())
    }

    /// Describe a series
    pub fn set_series_description(&mut self, series_nr: u32, description: Option<&str>) -> Result<()> {
        self.series_slot(series_nr, MAGIC_NAME_NR)?
            .set_description(description.map(str::to_string));
        Ok(())
    }

    /// Set the value type of a series
    pub fn set_series_type(&mut self, series_nr: u32, value_type: &str) -> Result<()> {
        let scanned = self.builtins.series_type.scan(value_type)?;
        self.series_slot(series_nr, MAGIC_TYPE_NR)?
            .set_value(Some(scanned));
        Ok(())
    }

    /// Set the time domain of a series
    pub fn set_series_time_domain(&mut self, series_nr: u32, time_domain: &str) -> Result<()> {
        let scanned = self.builtins.time_domain.scan(time_domain)?;
        self.series_slot(series_nr, MAGIC_TIME_DOMAIN_NR)?
            .set_value(Some(scanned));
        Ok(())
    }

    /// Set the sparsity flag of a series
    pub fn set_series_sparsity(&mut self, series_nr: u32, sparse: bool) -> Result<()> {
        let value = if sparse { "true" } else { "false" };
        self.series_slot(series_nr, MAGIC_SPARSITY_NR)?
            .set_value(Some(value.to_string()));
        Ok(())
    }

    /// Remove every own component of a series
    pub fn delete_series(&mut self, series_nr: u32) -> Result<()> {
        let before = self.components.len();
        self.components.retain(|(s, _), _| *s != series_nr);
        if self.components.len() == before {
            return Err(not_defined(&self.name, series_nr, MAGIC_NAME_NR));
        }
        Ok(())
    }

    /// Cancel an inherited series with a single tombstone
    pub fn erase_series(&mut self, series_nr: u32) -> Result<()> {
        if !self.inherited().contains_key(&(series_nr, MAGIC_NAME_NR)) {
            return Err(not_defined(&self.name, series_nr, MAGIC_NAME_NR));
        }
        self.components.retain(|(s, _), _| *s != series_nr);
        self.components.insert(
            (series_nr, MAGIC_NAME_NR),
            AttributeDefinition::erasing(series_nr, MAGIC_NAME_NR),
        );
        Ok(())
    }

    fn series_slot(&mut self, series_nr: u32, attribute_nr: u32) -> Result<&mut AttributeDefinition> {
        let key: ComponentKey = (series_nr, attribute_nr);
        if !self.merged().contains_key(&(series_nr, MAGIC_NAME_NR)) {
            return Err(not_defined(&self.name, series_nr, MAGIC_NAME_NR));
        }
        let usable = matches!(self.components.get(&key), Some(def) if !def.is_erasing());
        if !usable {
            let def = match self.inherited().remove(&key) {
                Some(def) => def,
                None => {
                    let property = self.builtins.for_attribute(attribute_nr).cloned().ok_or_else(|| {
                        Error::InvalidOperation(format!(
                            "attribute {} is not a series-level attribute",
                            attribute_nr
                        ))
                    })?;
                    AttributeDefinition::concrete(series_nr, attribute_nr, property, None, None)
                }
            };
            self.components.insert(key, def);
        }
        let missing = not_defined(&self.name, series_nr, attribute_nr);
        self.components.get_mut(&key).ok_or(missing)
    }
}
