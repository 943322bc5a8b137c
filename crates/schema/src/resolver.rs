//! Schema resolution
//!
//! Resolution flattens a schema and its base chain into one component table.
//! Base components come first; each schema's own components are overlaid on
//! top of what its base provides:
//!
//! - a concrete own component replaces the inherited one
//! - an erasing component removes the inherited one
//! - an erasing series header removes the whole series
//!
//! A visited set of schema ids is threaded through the walk. When an id comes
//! round again the walk stops there and the partial table is used, so a
//! schema caught in a base cycle still resolves and can be repaired.

use std::collections::{BTreeMap, HashMap, HashSet};

use chronicle_core::{
    Error, ObjectId, ObjectKind, Result, Surrogate, MAGIC_NAME_NR, MAGIC_TIME_DOMAIN_NR,
    MAGIC_TYPE_NR,
};
use tracing::warn;

use crate::attribute::{AttributeDefinition, ComponentKey};
use crate::schema::Schema;
use crate::series::SeriesDefinition;

/// Components keyed by `(series_nr, attribute_nr)`
pub type ComponentTable = BTreeMap<ComponentKey, AttributeDefinition>;

/// Merge a schema's base chain, stopping at the first repeated id
pub(crate) fn merge_into(schema: &Schema, visited: &mut HashSet<ObjectId>, cycle: &mut bool) -> ComponentTable {
    if let Some(id) = schema.surrogate().assigned_id() {
        if !visited.insert(id) {
            *cycle = true;
            warn!(target: "chronicle::schema", schema = schema.name(), id = id.get(), "base chain cycle, resolution stops here");
            return ComponentTable::new();
        }
    }
    let mut table = match schema.base() {
        Some(base) => merge_into(base, visited, cycle),
        None => ComponentTable::new(),
    };
    overlay(&mut table, schema.own_components());
    table
}

/// Overlay own components on an inherited table
pub(crate) fn overlay(table: &mut ComponentTable, own: &ComponentTable) {
    let erased_series: HashSet<u32> = own
        .values()
        .filter(|def| def.is_erasing() && def.is_series_header())
        .map(|def| def.series_nr())
        .collect();
    table.retain(|(series_nr, _), _| !erased_series.contains(series_nr));
    for (key, def) in own {
        if erased_series.contains(&def.series_nr()) {
            continue;
        }
        if def.is_erasing() {
            table.remove(key);
        } else {
            table.insert(*key, def.clone());
        }
    }
}

/// Fully merged view of a schema
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    name: String,
    surrogate: Surrogate,
    components: ComponentTable,
    series: BTreeMap<u32, SeriesDefinition>,
    cycle_detected: bool,
}

impl ResolvedSchema {
    fn build(schema: &Schema, components: ComponentTable, cycle_detected: bool) -> Self {
        let numbers: HashSet<u32> = components
            .keys()
            .map(|(series_nr, _)| *series_nr)
            .filter(|series_nr| *series_nr > 0)
            .collect();
        let series = numbers
            .into_iter()
            .map(|nr| (nr, SeriesDefinition::from_components(nr, components.values())))
            .collect();
        Self {
            name: schema.name().to_string(),
            surrogate: schema.surrogate().clone(),
            components,
            series,
            cycle_detected,
        }
    }

    /// Name of the resolved schema
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the resolved schema
    pub fn surrogate(&self) -> &Surrogate {
        &self.surrogate
    }

    /// True if the base chain contained a cycle
    pub fn cycle_detected(&self) -> bool {
        self.cycle_detected
    }

    /// All components, ordered by key
    pub fn components(&self) -> &ComponentTable {
        &self.components
    }

    /// Component by key
    pub fn component(&self, series_nr: u32, attribute_nr: u32) -> Option<&AttributeDefinition> {
        self.components.get(&(series_nr, attribute_nr))
    }

    /// Chronicle-level attributes
    pub fn attribute_definitions(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.components
            .range((0, 0)..=(0, u32::MAX))
            .map(|(_, def)| def)
    }

    /// Chronicle-level attribute by number
    pub fn attribute(&self, number: u32) -> Result<&AttributeDefinition> {
        self.component(0, number).ok_or_else(|| Error::NotDefined {
            schema: self.name.clone(),
            series: 0,
            attribute: number,
        })
    }

    /// Chronicle-level attribute by property name
    pub fn attribute_by_name(&self, property: &str) -> Result<&AttributeDefinition> {
        self.attribute_definitions()
            .find(|def| def.property().map(|p| p.name()) == Some(property))
            .ok_or_else(|| Error::not_found(ObjectKind::Property, format!("{} in schema {}", property, self.name)))
    }

    /// Series by number
    pub fn series(&self, number: u32) -> Option<&SeriesDefinition> {
        self.series.get(&number)
    }

    /// Series by name
    pub fn series_by_name(&self, name: &str) -> Result<&SeriesDefinition> {
        self.series
            .values()
            .find(|series| series.name() == Some(name))
            .ok_or_else(|| Error::not_found(ObjectKind::Series, format!("{} in schema {}", name, self.name)))
    }

    /// Series, ordered by number
    pub fn series_definitions(&self) -> impl Iterator<Item = &SeriesDefinition> {
        self.series.values()
    }
}

/// Merge a schema with its base chain without checking the result
pub fn resolve_unchecked(schema: &Schema) -> ResolvedSchema {
    let mut visited = HashSet::new();
    let mut cycle = false;
    let table = merge_into(schema, &mut visited, &mut cycle);
    ResolvedSchema::build(schema, table, cycle)
}

/// Merge a schema with its base chain and validate the result
///
/// # Errors
///
/// - `IncompleteDefinition` for a component without property or required
///   default, a series without name, type or time domain, two series with the
///   same name, or one property used twice at the same level
/// - `InvalidValue` for a default value the property rejects
pub fn resolve(schema: &Schema) -> Result<ResolvedSchema> {
    let resolved = resolve_unchecked(schema);
    validate(&resolved)?;
    Ok(resolved)
}

fn validate(resolved: &ResolvedSchema) -> Result<()> {
    let name = resolved.name();
    for def in resolved.components().values() {
        let (series_nr, number) = def.key();
        match def.property() {
            None => {
                return Err(Error::IncompleteDefinition(format!(
                    "schema {}: component ({}, {}) has no property",
                    name, series_nr, number
                )))
            }
            Some(property) => match def.value() {
                Some(value) => {
                    property.scan(value)?;
                }
                None if property.requires_value() => {
                    return Err(Error::IncompleteDefinition(format!(
                        "schema {}: component ({}, {}) has no default value",
                        name, series_nr, number
                    )))
                }
                None => {}
            },
        }
    }

    let mut series_names: HashMap<&str, u32> = HashMap::new();
    for series in resolved.series_definitions() {
        let required = [
            (MAGIC_NAME_NR, "name"),
            (MAGIC_TYPE_NR, "value type"),
            (MAGIC_TIME_DOMAIN_NR, "time domain"),
        ];
        for (number, what) in required {
            if series.attribute(number).and_then(|def| def.value()).is_none() {
                return Err(Error::IncompleteDefinition(format!(
                    "schema {}: series {} has no {}",
                    name,
                    series.number(),
                    what
                )));
            }
        }
        if let Some(series_name) = series.name() {
            if let Some(other) = series_names.insert(series_name, series.number()) {
                return Err(Error::IncompleteDefinition(format!(
                    "schema {}: series {} and {} are both named {}",
                    name,
                    other,
                    series.number(),
                    series_name
                )));
            }
        }
    }

    let mut used: HashSet<(u32, &str)> = HashSet::new();
    for def in resolved.components().values() {
        if let Some(property) = def.property() {
            if !used.insert((def.series_nr(), property.name())) {
                return Err(Error::IncompleteDefinition(format!(
                    "schema {}: property {} used twice in series {}",
                    name,
                    property.name(),
                    def.series_nr()
                )));
            }
        }
    }
    Ok(())
}
