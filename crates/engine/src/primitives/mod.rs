//! Facades over the Database session
//!
//! - **Catalog**: value types, their enumerated values, and properties
//! - **SchemaStore**: schema lookup, apply (diff + policy) and deletion
//! - **ChronicleStore**: the chronicle tree and attribute values
//! - **SeriesStore**: series handles and their observations
//!
//! ## Design Principle: Stateless Facades
//!
//! Every facade holds only an `Arc<Database>`. Model objects handed out
//! (schemas, chronicles, properties) carry their surrogate, so any facade on
//! the same database can take them back.
//!
//! ## Statements
//!
//! Each mutating operation runs its usage checks and all of its statements
//! inside one `Database::write`. If anything fails the statements already
//! run are undone, surrogates stay as they were and no event is queued.

pub mod catalog;
pub mod chronicle;
pub mod schema;
pub mod series;

pub use catalog::Catalog;
pub use chronicle::{AttributeValue, Chronicle, ChronicleStore};
pub use schema::SchemaStore;
pub use series::{Series, SeriesStore};

use chronicle_core::{Error, Result};
use chronicle_schema::Scanner;

/// Check a catalog or schema name
pub(crate) fn checked_name(name: &str) -> Result<String> {
    Scanner::Name.scan(name).map_err(|reason| Error::InvalidValue {
        value_type: "name".to_string(),
        value: name.to_string(),
        reason,
    })
}
