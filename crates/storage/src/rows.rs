//! Row types of the persisted layout
//!
//! One struct per table. Optional foreign keys are `Option<ObjectId>`; a
//! schema item whose `property` is `None` is an erasing tombstone.

use chronicle_core::ObjectId;

/// `chronicle(id, parent, schema_id, name, description)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChronicleRow {
    /// Primary key
    pub id: ObjectId,
    /// Parent chronicle, `None` directly below the top chronicle
    pub parent: Option<ObjectId>,
    /// Explicit schema, `None` when inherited from an ancestor
    pub schema: Option<ObjectId>,
    /// Simple name, unique among siblings
    pub name: String,
    /// Free text description
    pub description: String,
}

/// `series(id, chronicle, series_number)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRow {
    /// Primary key
    pub id: ObjectId,
    /// Owning chronicle
    pub chronicle: ObjectId,
    /// Series number within the chronicle's schema
    pub series_nr: u32,
}

/// `property(id, value_type, label)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRow {
    /// Primary key
    pub id: ObjectId,
    /// Value type of the property
    pub value_type: ObjectId,
    /// Unique name
    pub label: String,
}

/// `value_type(id, label, restricted, external_representation)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueTypeRow {
    /// Primary key
    pub id: ObjectId,
    /// Unique name
    pub label: String,
    /// Whether values are limited to the enumeration
    pub restricted: bool,
    /// Scanner name, e.g. `TEXT`
    pub external_representation: String,
}

/// `attribute_value(chronicle, attribute_number, property, value, description)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValueRow {
    /// Chronicle holding the value
    pub chronicle: ObjectId,
    /// Attribute number in the effective schema
    pub attribute_nr: u32,
    /// Property of the attribute
    pub property: ObjectId,
    /// Scanned value
    pub value: String,
    /// Optional description
    pub description: Option<String>,
}

/// `schema_name(id, parent, label)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNameRow {
    /// Primary key
    pub id: ObjectId,
    /// Base schema
    pub parent: Option<ObjectId>,
    /// Unique name
    pub label: String,
}

/// `schema_item(schema_id, series_number, attribute_number, property, value, description)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaItemRow {
    /// Owning schema
    pub schema: ObjectId,
    /// Series number, 0 for chronicle-level attributes
    pub series_nr: u32,
    /// Attribute number
    pub attribute_nr: u32,
    /// Property, `None` for an erasing component
    pub property: Option<ObjectId>,
    /// Default value
    pub value: Option<String>,
    /// Description
    pub description: Option<String>,
}

impl SchemaItemRow {
    /// Primary key of the row
    pub fn key(&self) -> (ObjectId, u32, u32) {
        (self.schema, self.series_nr, self.attribute_nr)
    }

    /// True for tombstones
    pub fn is_erasing(&self) -> bool {
        self.property.is_none()
    }
}
