//! Three-way diff between a schema and its persisted state
//!
//! The diff is a plain list of component changes computed entirely before
//! anything is written, so the caller can inspect it, run usage checks
//! against it, and then apply it statement by statement.
//!
//! Changes are ordered by series number, chronicle-level attributes first.
//! Within a series the header change comes before the changes of the
//! series' other attributes. A series whose own components all disappear is
//! reported as one [`ComponentChange::DeleteSeries`].

use chronicle_core::MAGIC_NAME_NR;

use crate::attribute::AttributeDefinition;
use crate::resolver::ComponentTable;
use crate::schema::Schema;

/// One structural change to a schema's own components
#[derive(Debug, Clone)]
pub enum ComponentChange {
    /// Component present now, absent before
    Create(AttributeDefinition),
    /// Component present before and now with different content
    Update(AttributeDefinition),
    /// Component present before, absent now
    Delete {
        /// Series number
        series_nr: u32,
        /// Attribute number
        attribute_nr: u32,
    },
    /// Every own component of a series removed
    DeleteSeries {
        /// Series number
        series_nr: u32,
    },
}

impl ComponentChange {
    /// Series number the change applies to
    pub fn series_nr(&self) -> u32 {
        match self {
            ComponentChange::Create(def) | ComponentChange::Update(def) => def.series_nr(),
            ComponentChange::Delete { series_nr, .. } | ComponentChange::DeleteSeries { series_nr } => {
                *series_nr
            }
        }
    }

    /// Attribute number, `None` for whole-series deletions
    pub fn attribute_nr(&self) -> Option<u32> {
        match self {
            ComponentChange::Create(def) | ComponentChange::Update(def) => Some(def.number()),
            ComponentChange::Delete { attribute_nr, .. } => Some(*attribute_nr),
            ComponentChange::DeleteSeries { .. } => None,
        }
    }
}

/// Changes needed to bring the store in line with an edited schema
#[derive(Debug, Clone, Default)]
pub struct SchemaDiff {
    /// The schema row itself must be created
    pub is_new: bool,
    /// The name differs from the persisted one
    pub renamed: bool,
    /// The base differs from the persisted one
    pub base_changed: bool,
    /// Component changes in apply order
    pub changes: Vec<ComponentChange>,
}

impl SchemaDiff {
    /// Number of created components
    pub fn created(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, ComponentChange::Create(_)))
            .count()
    }

    /// Number of updated components
    pub fn updated(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, ComponentChange::Update(_)))
            .count()
    }

    /// Number of deleted components and series
    pub fn deleted(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    ComponentChange::Delete { .. } | ComponentChange::DeleteSeries { .. }
                )
            })
            .count()
    }

    /// True if the header must be written
    pub fn header_changed(&self) -> bool {
        self.is_new || self.renamed || self.base_changed
    }

    /// True if nothing needs to be written
    pub fn is_empty(&self) -> bool {
        !self.header_changed() && self.changes.is_empty()
    }
}

/// Compare a schema's own components with its persisted state
///
/// A schema in construction is compared with nothing, whatever state it
/// carries from an earlier, rolled back apply.
pub fn diff(schema: &Schema) -> SchemaDiff {
    let empty = ComponentTable::new();
    let (before, mut result) = match schema.persisted() {
        Some(persisted) if !schema.is_in_construction() => (
            &persisted.components,
            SchemaDiff {
                is_new: false,
                renamed: persisted.name != schema.name(),
                base_changed: persisted.base != schema.base_id(),
                changes: Vec::new(),
            },
        ),
        _ => (
            &empty,
            SchemaDiff {
                is_new: true,
                ..SchemaDiff::default()
            },
        ),
    };
    let now = schema.own_components();

    let mut series_numbers: Vec<u32> = before
        .keys()
        .chain(now.keys())
        .map(|(series_nr, _)| *series_nr)
        .collect();
    series_numbers.sort_unstable();
    series_numbers.dedup();

    for series_nr in series_numbers {
        let before_s: Vec<&AttributeDefinition> = components_of(before, series_nr).collect();
        let now_s: Vec<&AttributeDefinition> = components_of(now, series_nr).collect();
        if series_nr > 0 && !before_s.is_empty() && now_s.is_empty() {
            result.changes.push(ComponentChange::DeleteSeries { series_nr });
            continue;
        }

        let mut numbers: Vec<u32> = before_s
            .iter()
            .chain(now_s.iter())
            .map(|def| def.number())
            .collect();
        numbers.sort_unstable_by_key(|nr| (*nr != MAGIC_NAME_NR, *nr));
        numbers.dedup();

        for attribute_nr in numbers {
            let key = (series_nr, attribute_nr);
            match (before.get(&key), now.get(&key)) {
                (None, Some(current)) => result.changes.push(ComponentChange::Create(current.clone())),
                (Some(previous), Some(current)) if !previous.content_eq(current) => {
                    result.changes.push(ComponentChange::Update(current.clone()))
                }
                (Some(_), None) => result.changes.push(ComponentChange::Delete {
                    series_nr,
                    attribute_nr,
                }),
                _ => {}
            }
        }
    }
    result
}

fn components_of(table: &ComponentTable, series_nr: u32) -> impl Iterator<Item = &AttributeDefinition> {
    table
        .range((series_nr, 0)..=(series_nr, u32::MAX))
        .map(|(_, def)| def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use chronicle_core::MAGIC_TYPE_NR;

    fn ten_components(fx: &Fixture) -> Schema {
        let mut s = fx.schema("S");
        for nr in 1..=10 {
            s.add_attribute(0, nr).unwrap();
            s.set_attribute_property(0, nr, &fx.text_property(nr)).unwrap();
            s.set_attribute_default(0, nr, Some("v")).unwrap();
        }
        s
    }

    #[test]
    fn test_new_schema_creates_everything() {
        let fx = Fixture::new();
        let s = ten_components(&fx);
        let d = diff(&s);
        assert!(d.is_new);
        assert_eq!(d.created(), 10);
        assert_eq!(d.updated() + d.deleted(), 0);
    }

    #[test]
    fn test_single_edit_is_single_update() {
        let fx = Fixture::new();
        let mut s = fx.applied(ten_components(&fx));
        assert!(diff(&s).is_empty());

        s.set_attribute_default(0, 4, Some("changed")).unwrap();
        let d = diff(&s);
        assert_eq!((d.created(), d.updated(), d.deleted()), (0, 1, 0));
        assert!(!d.header_changed());
        assert_eq!(d.changes[0].attribute_nr(), Some(4));
    }

    #[test]
    fn test_deleted_series_is_one_change() {
        let fx = Fixture::new();
        let mut s = fx.applied(fx.complete_series_schema("S", 2, "prices"));
        s.delete_series(2).unwrap();
        let d = diff(&s);
        assert_eq!(d.changes.len(), 1);
        assert!(matches!(d.changes[0], ComponentChange::DeleteSeries { series_nr: 2 }));
    }

    #[test]
    fn test_erasing_series_header_first() {
        let fx = Fixture::new();
        let a = fx.applied(fx.complete_series_schema("A", 1, "prices"));
        let mut b = fx.schema("B");
        b.set_base(Some(&a)).unwrap();
        b.set_series_type(1, "numeric").unwrap();
        b.set_series_description(1, Some("mine")).unwrap();
        let mut b = fx.applied(b);

        b.erase_series(1).unwrap();
        let d = diff(&b);
        assert!(matches!(&d.changes[0], ComponentChange::Update(def) if def.is_erasing()));
        assert!(matches!(
            d.changes[1],
            ComponentChange::Delete { series_nr: 1, attribute_nr: MAGIC_TYPE_NR }
        ));
        assert_eq!(d.changes.len(), 2);
    }

    #[test]
    fn test_rename_and_rebase_detected() {
        let fx = Fixture::new();
        let base = fx.applied(fx.schema("Base"));
        let mut s = fx.applied(fx.schema("S"));
        s.set_name("T").unwrap();
        s.set_base(Some(&base)).unwrap();
        let d = diff(&s);
        assert!(d.renamed && d.base_changed);
        assert!(d.changes.is_empty());
        assert!(!d.is_empty());
    }

    #[test]
    fn test_rolled_back_schema_diffs_against_nothing() {
        let fx = Fixture::new();
        let s = fx.applied(ten_components(&fx));
        fx.cache.rollback();
        assert!(s.is_in_construction());
        let d = diff(&s);
        assert!(d.is_new);
        assert_eq!(d.created(), 10);
    }
}
