//! In-process tables with statement-level constraint checks
//!
//! Every mutating statement validates its unique and foreign-key constraints
//! before touching any row, so a failing statement leaves the tables as they
//! were. Id sequences live here too; they only ever move forward.

use std::collections::BTreeMap;
use std::fmt::Display;

use chronicle_core::{ObjectId, ObjectKind};

use crate::error::{StoreError, StoreResult};
use crate::rows::{
    AttributeValueRow, ChronicleRow, PropertyRow, SchemaItemRow, SchemaNameRow, SeriesRow,
    ValueTypeRow,
};

const CHRONICLE: &str = "chronicle";
const SERIES: &str = "series";
const PROPERTY: &str = "property";
const VALUE_TYPE: &str = "value_type";
const VALUE_TYPE_VALUE: &str = "value_type_value";
const ATTRIBUTE_VALUE: &str = "attribute_value";
const SCHEMA_NAME: &str = "schema_name";
const SCHEMA_ITEM: &str = "schema_item";
const OBSERVATION: &str = "observation";

fn unique(table: &'static str, key: impl Display) -> StoreError {
    StoreError::UniqueViolation {
        table,
        key: key.to_string(),
    }
}

fn missing(table: &'static str, key: impl Display) -> StoreError {
    StoreError::RowNotFound {
        table,
        key: key.to_string(),
    }
}

fn foreign(table: &'static str, key: impl Display, detail: impl Into<String>) -> StoreError {
    StoreError::ForeignKey {
        table,
        key: key.to_string(),
        detail: detail.into(),
    }
}

/// All persisted rows of one store
#[derive(Debug, Clone, Default)]
pub struct Tables {
    chronicles: BTreeMap<ObjectId, ChronicleRow>,
    series: BTreeMap<ObjectId, SeriesRow>,
    properties: BTreeMap<ObjectId, PropertyRow>,
    value_types: BTreeMap<ObjectId, ValueTypeRow>,
    values: BTreeMap<(ObjectId, String), String>,
    attribute_values: BTreeMap<(ObjectId, ObjectId), AttributeValueRow>,
    schemas: BTreeMap<ObjectId, SchemaNameRow>,
    schema_items: BTreeMap<(ObjectId, u32, u32), SchemaItemRow>,
    observations: BTreeMap<(ObjectId, i64), f64>,
    pub(crate) sequences: BTreeMap<ObjectKind, ObjectId>,
}

impl Tables {
    /// Empty tables
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Sequences
    // =========================================================================

    /// Allocate the next id of a kind
    pub fn next_id(&mut self, kind: ObjectKind) -> ObjectId {
        let slot = self.sequences.entry(kind).or_insert(ObjectId::FIRST);
        let id = *slot;
        *slot = id.next();
        id
    }

    fn bump(&mut self, kind: ObjectKind, id: ObjectId) {
        let slot = self.sequences.entry(kind).or_insert(ObjectId::FIRST);
        if id >= *slot {
            *slot = id.next();
        }
    }

    // =========================================================================
    // chronicle
    // =========================================================================

    /// Chronicle by id
    pub fn chronicle(&self, id: ObjectId) -> Option<&ChronicleRow> {
        self.chronicles.get(&id)
    }

    /// Chronicle by parent and simple name
    pub fn chronicle_by_name(&self, parent: Option<ObjectId>, name: &str) -> Option<&ChronicleRow> {
        self.chronicles
            .values()
            .find(|row| row.parent == parent && row.name == name)
    }

    /// Children of a chronicle (or of the top chronicle), ordered by name
    pub fn children(&self, parent: Option<ObjectId>) -> Vec<&ChronicleRow> {
        let mut rows: Vec<&ChronicleRow> = self
            .chronicles
            .values()
            .filter(|row| row.parent == parent)
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// All chronicle rows
    pub fn chronicles(&self) -> impl Iterator<Item = &ChronicleRow> {
        self.chronicles.values()
    }

    /// Ancestors of a chronicle, nearest first
    pub fn ancestors(&self, id: ObjectId) -> Vec<&ChronicleRow> {
        let mut result = Vec::new();
        let mut current = self.chronicles.get(&id).and_then(|row| row.parent);
        while let Some(parent) = current {
            match self.chronicles.get(&parent) {
                Some(row) => {
                    result.push(row);
                    current = row.parent;
                }
                None => break,
            }
        }
        result
    }

    /// Schema of the chronicle or of its nearest ancestor having one
    pub fn effective_schema(&self, id: ObjectId) -> Option<ObjectId> {
        let row = self.chronicles.get(&id)?;
        row.schema
            .or_else(|| self.ancestors(id).iter().find_map(|ancestor| ancestor.schema))
    }

    /// Insert a chronicle
    pub fn insert_chronicle(&mut self, row: ChronicleRow) -> StoreResult<()> {
        if self.chronicles.contains_key(&row.id) {
            return Err(unique(CHRONICLE, row.id));
        }
        if let Some(parent) = row.parent {
            if !self.chronicles.contains_key(&parent) {
                return Err(foreign(CHRONICLE, row.id, format!("parent {} missing", parent)));
            }
        }
        self.check_schema_reference(CHRONICLE, row.id, row.schema)?;
        if self.chronicle_by_name(row.parent, &row.name).is_some() {
            return Err(unique(CHRONICLE, &row.name));
        }
        self.bump(ObjectKind::Chronicle, row.id);
        self.chronicles.insert(row.id, row);
        Ok(())
    }

    /// Update name, description and schema of a chronicle
    pub fn update_chronicle(&mut self, row: ChronicleRow) -> StoreResult<()> {
        let parent = match self.chronicles.get(&row.id) {
            Some(existing) => existing.parent,
            None => return Err(missing(CHRONICLE, row.id)),
        };
        if let Some(other) = self.chronicle_by_name(parent, &row.name) {
            if other.id != row.id {
                return Err(unique(CHRONICLE, &row.name));
            }
        }
        self.check_schema_reference(CHRONICLE, row.id, row.schema)?;
        self.chronicles.insert(row.id, ChronicleRow { parent, ..row });
        Ok(())
    }

    /// Delete a chronicle without children, series or attribute values
    pub fn delete_chronicle(&mut self, id: ObjectId) -> StoreResult<ChronicleRow> {
        if !self.chronicles.contains_key(&id) {
            return Err(missing(CHRONICLE, id));
        }
        if self.chronicles.values().any(|row| row.parent == Some(id)) {
            return Err(foreign(CHRONICLE, id, "has child chronicles"));
        }
        if self.series.values().any(|row| row.chronicle == id) {
            return Err(foreign(CHRONICLE, id, "has series"));
        }
        if self.attribute_values_of(id).next().is_some() {
            return Err(foreign(CHRONICLE, id, "has attribute values"));
        }
        self.chronicles.remove(&id).ok_or_else(|| missing(CHRONICLE, id))
    }

    fn check_schema_reference(
        &self,
        table: &'static str,
        key: ObjectId,
        schema: Option<ObjectId>,
    ) -> StoreResult<()> {
        match schema {
            Some(schema) if !self.schemas.contains_key(&schema) => {
                Err(foreign(table, key, format!("schema {} missing", schema)))
            }
            _ => Ok(()),
        }
    }

    // =========================================================================
    // series
    // =========================================================================

    /// Series by id
    pub fn series(&self, id: ObjectId) -> Option<&SeriesRow> {
        self.series.get(&id)
    }

    /// Series of a chronicle, ordered by number
    pub fn series_of(&self, chronicle: ObjectId) -> Vec<&SeriesRow> {
        let mut rows: Vec<&SeriesRow> = self
            .series
            .values()
            .filter(|row| row.chronicle == chronicle)
            .collect();
        rows.sort_by_key(|row| row.series_nr);
        rows
    }

    /// Series of a chronicle by number
    pub fn series_by_number(&self, chronicle: ObjectId, series_nr: u32) -> Option<&SeriesRow> {
        self.series
            .values()
            .find(|row| row.chronicle == chronicle && row.series_nr == series_nr)
    }

    /// Insert a series
    pub fn insert_series(&mut self, row: SeriesRow) -> StoreResult<()> {
        if self.series.contains_key(&row.id) {
            return Err(unique(SERIES, row.id));
        }
        if !self.chronicles.contains_key(&row.chronicle) {
            return Err(foreign(SERIES, row.id, format!("chronicle {} missing", row.chronicle)));
        }
        if self.series_by_number(row.chronicle, row.series_nr).is_some() {
            return Err(unique(SERIES, format!("{}:{}", row.chronicle, row.series_nr)));
        }
        self.bump(ObjectKind::Series, row.id);
        self.series.insert(row.id, row);
        Ok(())
    }

    /// Delete a series holding no observations
    pub fn delete_series(&mut self, id: ObjectId) -> StoreResult<SeriesRow> {
        if !self.series.contains_key(&id) {
            return Err(missing(SERIES, id));
        }
        if self.observation_count(id) > 0 {
            return Err(foreign(SERIES, id, "has observations"));
        }
        self.series.remove(&id).ok_or_else(|| missing(SERIES, id))
    }

    // =========================================================================
    // value_type / value_type_value
    // =========================================================================

    /// Value type by id
    pub fn value_type(&self, id: ObjectId) -> Option<&ValueTypeRow> {
        self.value_types.get(&id)
    }

    /// Value type by label
    pub fn value_type_by_label(&self, label: &str) -> Option<&ValueTypeRow> {
        self.value_types.values().find(|row| row.label == label)
    }

    /// All value type rows
    pub fn value_types(&self) -> impl Iterator<Item = &ValueTypeRow> {
        self.value_types.values()
    }

    /// Insert a value type
    pub fn insert_value_type(&mut self, row: ValueTypeRow) -> StoreResult<()> {
        if self.value_types.contains_key(&row.id) {
            return Err(unique(VALUE_TYPE, row.id));
        }
        if self.value_type_by_label(&row.label).is_some() {
            return Err(unique(VALUE_TYPE, &row.label));
        }
        self.bump(ObjectKind::ValueType, row.id);
        self.value_types.insert(row.id, row);
        Ok(())
    }

    /// Rename a value type
    pub fn rename_value_type(&mut self, id: ObjectId, label: &str) -> StoreResult<()> {
        if let Some(other) = self.value_type_by_label(label) {
            if other.id != id {
                return Err(unique(VALUE_TYPE, label));
            }
        }
        let row = self.value_types.get_mut(&id).ok_or_else(|| missing(VALUE_TYPE, id))?;
        row.label = label.to_string();
        Ok(())
    }

    /// Delete a value type no property uses and holding no values
    pub fn delete_value_type(&mut self, id: ObjectId) -> StoreResult<ValueTypeRow> {
        if !self.value_types.contains_key(&id) {
            return Err(missing(VALUE_TYPE, id));
        }
        if self.properties.values().any(|row| row.value_type == id) {
            return Err(foreign(VALUE_TYPE, id, "used by a property"));
        }
        if self.values_of(id).next().is_some() {
            return Err(foreign(VALUE_TYPE, id, "has values"));
        }
        self.value_types.remove(&id).ok_or_else(|| missing(VALUE_TYPE, id))
    }

    /// Enumerated values of a value type with their descriptions, ordered by value
    pub fn values_of(&self, value_type: ObjectId) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .range((value_type, String::new())..)
            .take_while(move |((owner, _), _)| *owner == value_type)
            .map(|((_, value), description)| (value.as_str(), description.as_str()))
    }

    /// Insert an enumerated value
    pub fn insert_value(&mut self, value_type: ObjectId, value: &str, description: &str) -> StoreResult<()> {
        if !self.value_types.contains_key(&value_type) {
            return Err(foreign(VALUE_TYPE_VALUE, value, format!("value type {} missing", value_type)));
        }
        let key = (value_type, value.to_string());
        if self.values.contains_key(&key) {
            return Err(unique(VALUE_TYPE_VALUE, value));
        }
        self.values.insert(key, description.to_string());
        Ok(())
    }

    /// Change the description of an enumerated value
    pub fn update_value(&mut self, value_type: ObjectId, value: &str, description: &str) -> StoreResult<()> {
        let slot = self
            .values
            .get_mut(&(value_type, value.to_string()))
            .ok_or_else(|| missing(VALUE_TYPE_VALUE, value))?;
        *slot = description.to_string();
        Ok(())
    }

    /// Delete an enumerated value
    pub fn delete_value(&mut self, value_type: ObjectId, value: &str) -> StoreResult<()> {
        self.values
            .remove(&(value_type, value.to_string()))
            .map(|_| ())
            .ok_or_else(|| missing(VALUE_TYPE_VALUE, value))
    }

    /// Delete all enumerated values of a value type
    pub fn delete_values_of(&mut self, value_type: ObjectId) -> usize {
        let before = self.values.len();
        self.values.retain(|(owner, _), _| *owner != value_type);
        before - self.values.len()
    }

    // =========================================================================
    // property
    // =========================================================================

    /// Property by id
    pub fn property(&self, id: ObjectId) -> Option<&PropertyRow> {
        self.properties.get(&id)
    }

    /// Property by label
    pub fn property_by_label(&self, label: &str) -> Option<&PropertyRow> {
        self.properties.values().find(|row| row.label == label)
    }

    /// All property rows
    pub fn properties(&self) -> impl Iterator<Item = &PropertyRow> {
        self.properties.values()
    }

    /// Insert a property
    pub fn insert_property(&mut self, row: PropertyRow) -> StoreResult<()> {
        if self.properties.contains_key(&row.id) {
            return Err(unique(PROPERTY, row.id));
        }
        if self.property_by_label(&row.label).is_some() {
            return Err(unique(PROPERTY, &row.label));
        }
        if !self.value_types.contains_key(&row.value_type) {
            return Err(foreign(PROPERTY, row.id, format!("value type {} missing", row.value_type)));
        }
        self.bump(ObjectKind::Property, row.id);
        self.properties.insert(row.id, row);
        Ok(())
    }

    /// Rename a property
    pub fn rename_property(&mut self, id: ObjectId, label: &str) -> StoreResult<()> {
        if let Some(other) = self.property_by_label(label) {
            if other.id != id {
                return Err(unique(PROPERTY, label));
            }
        }
        let row = self.properties.get_mut(&id).ok_or_else(|| missing(PROPERTY, id))?;
        row.label = label.to_string();
        Ok(())
    }

    /// Delete a property no schema item or attribute value references
    pub fn delete_property(&mut self, id: ObjectId) -> StoreResult<PropertyRow> {
        if !self.properties.contains_key(&id) {
            return Err(missing(PROPERTY, id));
        }
        if self.schema_items.values().any(|row| row.property == Some(id)) {
            return Err(foreign(PROPERTY, id, "used by a schema item"));
        }
        if self.attribute_values.values().any(|row| row.property == id) {
            return Err(foreign(PROPERTY, id, "used by an attribute value"));
        }
        self.properties.remove(&id).ok_or_else(|| missing(PROPERTY, id))
    }

    // =========================================================================
    // schema_name / schema_item
    // =========================================================================

    /// Schema by id
    pub fn schema(&self, id: ObjectId) -> Option<&SchemaNameRow> {
        self.schemas.get(&id)
    }

    /// Schema by label
    pub fn schema_by_label(&self, label: &str) -> Option<&SchemaNameRow> {
        self.schemas.values().find(|row| row.label == label)
    }

    /// All schema rows
    pub fn schemas(&self) -> impl Iterator<Item = &SchemaNameRow> {
        self.schemas.values()
    }

    /// The schema followed by its bases, stopping before the first repeat
    pub fn schema_chain(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(next) = current {
            if chain.contains(&next) {
                break;
            }
            match self.schemas.get(&next) {
                Some(row) => {
                    chain.push(next);
                    current = row.parent;
                }
                None => break,
            }
        }
        chain
    }

    /// Insert a schema
    pub fn insert_schema(&mut self, row: SchemaNameRow) -> StoreResult<()> {
        if self.schemas.contains_key(&row.id) {
            return Err(unique(SCHEMA_NAME, row.id));
        }
        if self.schema_by_label(&row.label).is_some() {
            return Err(unique(SCHEMA_NAME, &row.label));
        }
        self.check_schema_reference(SCHEMA_NAME, row.id, row.parent)?;
        self.bump(ObjectKind::Schema, row.id);
        self.schemas.insert(row.id, row);
        Ok(())
    }

    /// Update label and base of a schema
    pub fn update_schema(&mut self, row: SchemaNameRow) -> StoreResult<()> {
        if !self.schemas.contains_key(&row.id) {
            return Err(missing(SCHEMA_NAME, row.id));
        }
        if let Some(other) = self.schema_by_label(&row.label) {
            if other.id != row.id {
                return Err(unique(SCHEMA_NAME, &row.label));
            }
        }
        self.check_schema_reference(SCHEMA_NAME, row.id, row.parent)?;
        self.schemas.insert(row.id, row);
        Ok(())
    }

    /// Delete a schema nothing references and owning no items
    pub fn delete_schema(&mut self, id: ObjectId) -> StoreResult<SchemaNameRow> {
        if !self.schemas.contains_key(&id) {
            return Err(missing(SCHEMA_NAME, id));
        }
        if self.chronicles.values().any(|row| row.schema == Some(id)) {
            return Err(foreign(SCHEMA_NAME, id, "used by a chronicle"));
        }
        if self.schemas.values().any(|row| row.parent == Some(id) && row.id != id) {
            return Err(foreign(SCHEMA_NAME, id, "base of another schema"));
        }
        if self.items_of(id).next().is_some() {
            return Err(foreign(SCHEMA_NAME, id, "has items"));
        }
        self.schemas.remove(&id).ok_or_else(|| missing(SCHEMA_NAME, id))
    }

    /// Items of a schema ordered by (series, attribute)
    pub fn items_of(&self, schema: ObjectId) -> impl Iterator<Item = &SchemaItemRow> {
        self.schema_items
            .range((schema, 0, 0)..=(schema, u32::MAX, u32::MAX))
            .map(|(_, row)| row)
    }

    /// All schema item rows
    pub fn schema_items(&self) -> impl Iterator<Item = &SchemaItemRow> {
        self.schema_items.values()
    }

    /// Insert a schema item
    pub fn insert_item(&mut self, row: SchemaItemRow) -> StoreResult<()> {
        let key = row.key();
        if self.schema_items.contains_key(&key) {
            return Err(unique(SCHEMA_ITEM, format!("{}:{}:{}", key.0, key.1, key.2)));
        }
        self.check_item_references(&row)?;
        self.schema_items.insert(key, row);
        Ok(())
    }

    /// Replace a schema item
    pub fn update_item(&mut self, row: SchemaItemRow) -> StoreResult<()> {
        let key = row.key();
        if !self.schema_items.contains_key(&key) {
            return Err(missing(SCHEMA_ITEM, format!("{}:{}:{}", key.0, key.1, key.2)));
        }
        self.check_item_references(&row)?;
        self.schema_items.insert(key, row);
        Ok(())
    }

    /// Delete one schema item
    pub fn delete_item(&mut self, schema: ObjectId, series_nr: u32, attribute_nr: u32) -> StoreResult<()> {
        self.schema_items
            .remove(&(schema, series_nr, attribute_nr))
            .map(|_| ())
            .ok_or_else(|| missing(SCHEMA_ITEM, format!("{}:{}:{}", schema, series_nr, attribute_nr)))
    }

    /// Delete every item of one series of a schema
    pub fn delete_items_of_series(&mut self, schema: ObjectId, series_nr: u32) -> usize {
        let before = self.schema_items.len();
        self.schema_items
            .retain(|(owner, nr, _), _| !(*owner == schema && *nr == series_nr));
        before - self.schema_items.len()
    }

    /// Delete every item of a schema
    pub fn delete_items_of(&mut self, schema: ObjectId) -> usize {
        let before = self.schema_items.len();
        self.schema_items.retain(|(owner, _, _), _| *owner != schema);
        before - self.schema_items.len()
    }

    fn check_item_references(&self, row: &SchemaItemRow) -> StoreResult<()> {
        let key = format!("{}:{}:{}", row.schema, row.series_nr, row.attribute_nr);
        if !self.schemas.contains_key(&row.schema) {
            return Err(foreign(SCHEMA_ITEM, key, format!("schema {} missing", row.schema)));
        }
        if let Some(property) = row.property {
            if !self.properties.contains_key(&property) {
                return Err(foreign(SCHEMA_ITEM, key, format!("property {} missing", property)));
            }
        }
        Ok(())
    }

    // =========================================================================
    // attribute_value
    // =========================================================================

    /// Attribute value of a chronicle for a property
    pub fn attribute_value(&self, chronicle: ObjectId, property: ObjectId) -> Option<&AttributeValueRow> {
        self.attribute_values.get(&(chronicle, property))
    }

    /// Attribute values of a chronicle
    pub fn attribute_values_of(&self, chronicle: ObjectId) -> impl Iterator<Item = &AttributeValueRow> {
        self.attribute_values
            .range((chronicle, ObjectId::FIRST)..)
            .take_while(move |((owner, _), _)| *owner == chronicle)
            .map(|(_, row)| row)
    }

    /// All attribute value rows
    pub fn attribute_values(&self) -> impl Iterator<Item = &AttributeValueRow> {
        self.attribute_values.values()
    }

    /// Insert or replace the value of a chronicle for a property
    pub fn upsert_attribute_value(&mut self, row: AttributeValueRow) -> StoreResult<()> {
        let key = format!("{}:{}", row.chronicle, row.property);
        if !self.chronicles.contains_key(&row.chronicle) {
            return Err(foreign(ATTRIBUTE_VALUE, key, format!("chronicle {} missing", row.chronicle)));
        }
        if !self.properties.contains_key(&row.property) {
            return Err(foreign(ATTRIBUTE_VALUE, key, format!("property {} missing", row.property)));
        }
        self.attribute_values.insert((row.chronicle, row.property), row);
        Ok(())
    }

    /// Delete the value of a chronicle for a property, returning whether one existed
    pub fn delete_attribute_value(&mut self, chronicle: ObjectId, property: ObjectId) -> bool {
        self.attribute_values.remove(&(chronicle, property)).is_some()
    }

    /// Delete every attribute value of a chronicle
    pub fn delete_attribute_values_of(&mut self, chronicle: ObjectId) -> usize {
        let before = self.attribute_values.len();
        self.attribute_values.retain(|(owner, _), _| *owner != chronicle);
        before - self.attribute_values.len()
    }

    // =========================================================================
    // observation
    // =========================================================================

    /// Store one observation
    pub fn set_observation(&mut self, series: ObjectId, time: i64, value: f64) -> StoreResult<()> {
        if !self.series.contains_key(&series) {
            return Err(foreign(OBSERVATION, format!("{}@{}", series, time), format!("series {} missing", series)));
        }
        self.observations.insert((series, time), value);
        Ok(())
    }

    /// Observation at a time
    pub fn observation(&self, series: ObjectId, time: i64) -> Option<f64> {
        self.observations.get(&(series, time)).copied()
    }

    /// Observations of a series ordered by time
    pub fn observations_of(&self, series: ObjectId) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.observations
            .range((series, i64::MIN)..=(series, i64::MAX))
            .map(|((_, time), value)| (*time, *value))
    }

    /// Number of observations of a series
    pub fn observation_count(&self, series: ObjectId) -> usize {
        self.observations_of(series).count()
    }

    /// Delete all observations of a series
    pub fn delete_observations(&mut self, series: ObjectId) -> usize {
        let before = self.observations.len();
        self.observations.retain(|(owner, _), _| *owner != series);
        before - self.observations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> ObjectId {
        ObjectId::new(raw).unwrap()
    }

    fn with_value_type(tables: &mut Tables) -> ObjectId {
        let vt = tables.next_id(ObjectKind::ValueType);
        tables
            .insert_value_type(ValueTypeRow {
                id: vt,
                label: "text".to_string(),
                restricted: false,
                external_representation: "TEXT".to_string(),
            })
            .unwrap();
        vt
    }

    #[test]
    fn test_sequences_skip_explicit_ids() {
        let mut tables = Tables::new();
        tables
            .insert_value_type(ValueTypeRow {
                id: id(4),
                label: "x".to_string(),
                restricted: false,
                external_representation: "TEXT".to_string(),
            })
            .unwrap();
        assert_eq!(tables.next_id(ObjectKind::ValueType), id(5));
        assert_eq!(tables.next_id(ObjectKind::Schema), id(1));
    }

    #[test]
    fn test_unique_labels() {
        let mut tables = Tables::new();
        let vt = with_value_type(&mut tables);
        let p1 = tables.next_id(ObjectKind::Property);
        tables
            .insert_property(PropertyRow { id: p1, value_type: vt, label: "Ticker".to_string() })
            .unwrap();
        let p2 = tables.next_id(ObjectKind::Property);
        let err = tables
            .insert_property(PropertyRow { id: p2, value_type: vt, label: "Ticker".to_string() })
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { table: "property", .. }));
    }

    #[test]
    fn test_property_foreign_keys() {
        let mut tables = Tables::new();
        let vt = with_value_type(&mut tables);
        let p = tables.next_id(ObjectKind::Property);
        tables
            .insert_property(PropertyRow { id: p, value_type: vt, label: "Ticker".to_string() })
            .unwrap();
        let s = tables.next_id(ObjectKind::Schema);
        tables
            .insert_schema(SchemaNameRow { id: s, parent: None, label: "S".to_string() })
            .unwrap();
        tables
            .insert_item(SchemaItemRow {
                schema: s,
                series_nr: 0,
                attribute_nr: 2,
                property: Some(p),
                value: Some("SUN".to_string()),
                description: None,
            })
            .unwrap();

        assert!(matches!(tables.delete_property(p), Err(StoreError::ForeignKey { .. })));
        assert!(matches!(tables.delete_value_type(vt), Err(StoreError::ForeignKey { .. })));
        tables.delete_item(s, 0, 2).unwrap();
        tables.delete_property(p).unwrap();
        tables.delete_value_type(vt).unwrap();
    }

    #[test]
    fn test_effective_schema_inherited_from_ancestor() {
        let mut tables = Tables::new();
        let s = tables.next_id(ObjectKind::Schema);
        tables
            .insert_schema(SchemaNameRow { id: s, parent: None, label: "S".to_string() })
            .unwrap();
        let a = tables.next_id(ObjectKind::Chronicle);
        tables
            .insert_chronicle(ChronicleRow { id: a, parent: None, schema: Some(s), name: "a".to_string(), description: String::new() })
            .unwrap();
        let b = tables.next_id(ObjectKind::Chronicle);
        tables
            .insert_chronicle(ChronicleRow { id: b, parent: Some(a), schema: None, name: "b".to_string(), description: String::new() })
            .unwrap();

        assert_eq!(tables.effective_schema(b), Some(s));
        assert_eq!(tables.ancestors(b).len(), 1);
        assert!(matches!(tables.delete_schema(s), Err(StoreError::ForeignKey { .. })));
        assert!(matches!(tables.delete_chronicle(a), Err(StoreError::ForeignKey { .. })));
    }

    #[test]
    fn test_schema_chain_stops_at_cycle() {
        let mut tables = Tables::new();
        let a = tables.next_id(ObjectKind::Schema);
        tables
            .insert_schema(SchemaNameRow { id: a, parent: None, label: "A".to_string() })
            .unwrap();
        let b = tables.next_id(ObjectKind::Schema);
        tables
            .insert_schema(SchemaNameRow { id: b, parent: Some(a), label: "B".to_string() })
            .unwrap();
        tables
            .update_schema(SchemaNameRow { id: a, parent: Some(b), label: "A".to_string() })
            .unwrap();
        assert_eq!(tables.schema_chain(a), vec![a, b]);
        assert_eq!(tables.schema_chain(b), vec![b, a]);
    }

    #[test]
    fn test_values_are_scoped_per_type() {
        let mut tables = Tables::new();
        let vt = with_value_type(&mut tables);
        tables.insert_value(vt, "b", "Bee").unwrap();
        tables.insert_value(vt, "a", "Ay").unwrap();
        assert!(tables.insert_value(vt, "a", "again").is_err());
        let values: Vec<(&str, &str)> = tables.values_of(vt).collect();
        assert_eq!(values, vec![("a", "Ay"), ("b", "Bee")]);
        assert_eq!(tables.delete_values_of(vt), 2);
    }

    #[test]
    fn test_series_with_observations_cannot_be_deleted() {
        let mut tables = Tables::new();
        let c = tables.next_id(ObjectKind::Chronicle);
        tables
            .insert_chronicle(ChronicleRow { id: c, parent: None, schema: None, name: "c".to_string(), description: String::new() })
            .unwrap();
        let s = tables.next_id(ObjectKind::Series);
        tables.insert_series(SeriesRow { id: s, chronicle: c, series_nr: 1 }).unwrap();
        tables.set_observation(s, 10, 1.5).unwrap();
        assert!(tables.delete_series(s).is_err());
        assert_eq!(tables.delete_observations(s), 1);
        tables.delete_series(s).unwrap();
    }
}
