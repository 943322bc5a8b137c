//! Series handles and their observations
//!
//! A series row ties a chronicle to one series number of its effective
//! schema. Name, description, value type and time domain all come from the
//! schema; the row itself only carries the number.
//!
//! Observations are kept beside the rows as `(time, value)` pairs so that
//! the usage checks have data to find. They are plain value data: writing
//! them queues no events.

use std::sync::Arc;

use chronicle_core::{
    Error, NamingPolicy, ObjectId, ObjectKind, Result, Surrogate, UpdateEvent, UpdateEventOperation,
};
use chronicle_schema::resolve_unchecked;
use chronicle_storage::{SeriesRow, Tables};
use tracing::debug;

use crate::database::Database;
use crate::loader::Loader;
use crate::policy::UpdatePolicy;
use crate::primitives::chronicle::Chronicle;

/// A series of a chronicle
#[derive(Debug, Clone)]
pub struct Series {
    surrogate: Surrogate,
    chronicle: Surrogate,
    number: u32,
    name: String,
    full_name: String,
    description: Option<String>,
}

impl Series {
    /// Identity handle
    pub fn surrogate(&self) -> &Surrogate {
        &self.surrogate
    }

    /// Owning chronicle
    pub fn chronicle(&self) -> &Surrogate {
        &self.chronicle
    }

    /// Series number in the chronicle's schema
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Series name from the schema
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chronicle full name followed by the series name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Series description from the schema
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Series facade
#[derive(Clone)]
pub struct SeriesStore {
    db: Arc<Database>,
}

impl SeriesStore {
    /// Create new SeriesStore instance
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn full_name(&self, chronicle: &Chronicle, name: &str) -> String {
        format!("{}{}{}", chronicle.full_name(), self.db.naming().separator(), name)
    }

    /// Number, name and description of every series the chronicle's
    /// effective schema defines
    fn definitions(&self, tables: &Tables, chronicle: ObjectId) -> Result<Vec<(u32, String, Option<String>)>> {
        let schema = match tables.effective_schema(chronicle) {
            Some(schema) => schema,
            None => return Ok(Vec::new()),
        };
        let builtins = self.db.builtins()?;
        let schema = Loader::new(tables, self.db.cache()).schema(schema, &builtins)?;
        Ok(resolve_unchecked(&schema)
            .series_definitions()
            .map(|series| {
                let name = series
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| series.number().to_string());
                (series.number(), name, series.description().map(str::to_string))
            })
            .collect())
    }

    fn definition(&self, tables: &Tables, chronicle: &Chronicle, name: &str) -> Result<(u32, String, Option<String>)> {
        let id = chronicle.surrogate().id()?;
        self.definitions(tables, id)?
            .into_iter()
            .find(|(_, series_name, _)| series_name == name)
            .ok_or_else(|| Error::not_found(ObjectKind::Series, self.full_name(chronicle, name)))
    }

    /// Create the series of a chronicle named `name` in its effective schema
    pub fn create(&self, chronicle: &Chronicle, name: &str) -> Result<Series> {
        let chronicle_id = chronicle.surrogate().id()?;
        let full_name = self.full_name(chronicle, name);
        let surrogate = self.db.cache().in_construction(ObjectKind::Series);
        let (id, number, description) = self.db.write(|tables| {
            let (number, _, description) = self.definition(tables, chronicle, name)?;
            if tables.series_by_number(chronicle_id, number).is_some() {
                return Err(Error::InvalidOperation(format!(
                    "series {} already exists",
                    full_name
                )));
            }
            let id = tables.next_id(ObjectKind::Series);
            tables.insert_series(SeriesRow {
                id,
                chronicle: chronicle_id,
                series_nr: number,
            })?;
            Ok((id, number, description))
        })?;
        self.db.cache().upgrade(&surrogate, id)?;
        debug!(target: "chronicle::chronicle", series = %full_name, number, "series created");
        self.db.publish(
            UpdateEvent::new(ObjectKind::Series, UpdateEventOperation::Create, Some(id))
                .with_comment(full_name.clone()),
        );
        Ok(Series {
            surrogate,
            chronicle: chronicle.surrogate().clone(),
            number,
            name: name.to_string(),
            full_name,
            description,
        })
    }

    /// Existing series of a chronicle by name
    pub fn get(&self, chronicle: &Chronicle, name: &str) -> Result<Series> {
        let chronicle_id = chronicle.surrogate().id()?;
        self.db.read(|tables| {
            let (number, _, description) = self.definition(tables, chronicle, name)?;
            let row = tables
                .series_by_number(chronicle_id, number)
                .ok_or_else(|| Error::not_found(ObjectKind::Series, self.full_name(chronicle, name)))?;
            Ok(Series {
                surrogate: self.db.cache().assign(ObjectKind::Series, row.id),
                chronicle: chronicle.surrogate().clone(),
                number,
                name: name.to_string(),
                full_name: self.full_name(chronicle, name),
                description,
            })
        })
    }

    /// Existing series of a chronicle, ordered by number
    ///
    /// A series the schema no longer names is listed under its number.
    pub fn list(&self, chronicle: &Chronicle) -> Result<Vec<Series>> {
        let chronicle_id = chronicle.surrogate().id()?;
        self.db.read(|tables| {
            let definitions = self.definitions(tables, chronicle_id)?;
            Ok(tables
                .series_of(chronicle_id)
                .into_iter()
                .map(|row| {
                    let (name, description) = definitions
                        .iter()
                        .find(|(number, _, _)| *number == row.series_nr)
                        .map(|(_, name, description)| (name.clone(), description.clone()))
                        .unwrap_or_else(|| (row.series_nr.to_string(), None));
                    Series {
                        surrogate: self.db.cache().assign(ObjectKind::Series, row.id),
                        chronicle: chronicle.surrogate().clone(),
                        number: row.series_nr,
                        full_name: self.full_name(chronicle, &name),
                        name,
                        description,
                    }
                })
                .collect())
        })
    }

    /// Delete a series holding no observations
    pub fn delete(&self, series: &Series) -> Result<()> {
        let id = series.surrogate.id()?;
        let builtins = self.db.builtins()?;
        self.db.write(|tables| {
            UpdatePolicy::new(tables, self.db.cache(), &builtins).will_delete_series(id, &series.full_name)?;
            tables.delete_series(id)?;
            Ok(())
        })?;
        self.db.cache().invalidate(&series.surrogate);
        debug!(target: "chronicle::chronicle", series = %series.full_name, "series deleted");
        self.db.publish(
            UpdateEvent::new(ObjectKind::Series, UpdateEventOperation::Delete, Some(id)).with_comment(format!(
                "{} - {}",
                series.full_name,
                series.description.as_deref().unwrap_or_default()
            )),
        );
        Ok(())
    }

    // ========================================================================
    // Observations
    // ========================================================================

    /// Store the value observed at `time`, replacing any earlier one
    pub fn set_observation(&self, series: &Series, time: i64, value: f64) -> Result<()> {
        let id = series.surrogate.id()?;
        self.db.write(|tables| Ok(tables.set_observation(id, time, value)?))
    }

    /// Value observed at `time`
    pub fn observation(&self, series: &Series, time: i64) -> Result<Option<f64>> {
        let id = series.surrogate.id()?;
        self.db.read(|tables| Ok(tables.observation(id, time)))
    }

    /// All observations ordered by time
    pub fn observations(&self, series: &Series) -> Result<Vec<(i64, f64)>> {
        let id = series.surrogate.id()?;
        self.db.read(|tables| Ok(tables.observations_of(id).collect()))
    }

    /// Number of observations
    pub fn observation_count(&self, series: &Series) -> Result<usize> {
        let id = series.surrogate.id()?;
        self.db.read(|tables| Ok(tables.observation_count(id)))
    }

    /// Remove all observations, returning how many there were
    pub fn clear_observations(&self, series: &Series) -> Result<usize> {
        let id = series.surrogate.id()?;
        self.db.write(|tables| Ok(tables.delete_observations(id)))
    }
}
