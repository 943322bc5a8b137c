//! Test fixture: a catalog and surrogate cache without a store

use std::sync::Arc;

use chronicle_core::{ObjectId, ObjectKind, StoreId, SurrogateCache};

use crate::builtin::{BuiltIns, BUILTIN_PROPERTIES, BUILTIN_VALUE_TYPES};
use crate::property::Property;
use crate::schema::Schema;
use crate::value_type::{Scanner, ValueType};

pub(crate) struct Fixture {
    pub cache: SurrogateCache,
    pub builtins: Arc<BuiltIns>,
    pub ticker: Property,
    pub number: Property,
    text: Arc<ValueType>,
    next_schema: std::cell::Cell<u32>,
}

impl Fixture {
    pub fn new() -> Self {
        let cache = SurrogateCache::new(StoreId::new());
        let id = |raw: u32| ObjectId::new(raw).unwrap();
        let builtin = |index: usize| {
            let vt = &BUILTIN_VALUE_TYPES[index];
            let value_type = ValueType::new(
                cache.assign(ObjectKind::ValueType, id(vt.id)),
                vt.name,
                vt.restricted,
                vt.scanner,
            )
            .with_values(vt.values.iter().copied());
            let p = &BUILTIN_PROPERTIES[index];
            Property::new(cache.assign(ObjectKind::Property, id(p.id)), p.name, Arc::new(value_type))
        };
        let builtins = Arc::new(BuiltIns {
            name: builtin(0),
            series_type: builtin(1),
            time_domain: builtin(2),
            sparsity: builtin(3),
        });
        let text = Arc::new(ValueType::new(
            cache.assign(ObjectKind::ValueType, id(10)),
            "text",
            false,
            Scanner::Text,
        ));
        let numeric = Arc::new(ValueType::new(
            cache.assign(ObjectKind::ValueType, id(11)),
            "numeric",
            false,
            Scanner::Number,
        ));
        let ticker = Property::new(cache.assign(ObjectKind::Property, id(10)), "Ticker", text.clone());
        let number = Property::new(cache.assign(ObjectKind::Property, id(11)), "Weight", numeric);
        Self {
            cache,
            builtins,
            ticker,
            number,
            text,
            next_schema: std::cell::Cell::new(1),
        }
    }

    /// Text property named `P<nr>`, one identity per number
    pub fn text_property(&self, nr: u32) -> Property {
        let surrogate = self
            .cache
            .assign(ObjectKind::Property, ObjectId::new(100 + nr).unwrap());
        Property::new(surrogate, format!("P{}", nr), self.text.clone())
    }

    pub fn schema(&self, name: &str) -> Schema {
        Schema::new(
            self.cache.in_construction(ObjectKind::Schema),
            name,
            self.builtins.clone(),
        )
    }

    /// Simulate a successful apply
    pub fn applied(&self, mut schema: Schema) -> Schema {
        if schema.is_in_construction() {
            let raw = self.next_schema.get();
            self.next_schema.set(raw + 1);
            self.cache
                .upgrade(schema.surrogate(), ObjectId::new(raw).unwrap())
                .unwrap();
        }
        schema.mark_persisted();
        schema
    }

    pub fn complete_series_schema(&self, name: &str, nr: u32, series: &str) -> Schema {
        let mut s = self.schema(name);
        s.add_series(nr).unwrap();
        s.set_series_name(nr, series).unwrap();
        s.set_series_type(nr, "numeric").unwrap();
        s.set_series_time_domain(nr, "daily").unwrap();
        s.set_series_sparsity(nr, false).unwrap();
        s
    }
}
