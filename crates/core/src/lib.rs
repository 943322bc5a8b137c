//! Core types and traits for the chronicle store
//!
//! This crate defines the foundational types used throughout the system:
//! - ObjectKind / ObjectId / StoreId: identifiers of persisted objects
//! - Surrogate / SurrogateCache: shared, upgrade-once identity handles
//! - Error: Error type hierarchy
//! - UpdateEvent: structural change notifications and their publisher
//! - NamingPolicy: chronicle name splitting and checking
//! - Magic numbers: series-level attribute numbers and the built-in threshold

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod naming;
pub mod surrogate;
pub mod types;

pub use error::{Error, Result};
pub use event::{
    BufferedPublisher, UpdateEvent, UpdateEventOperation, UpdateEventPublisher,
    UpdateEventSubscriber,
};
pub use naming::{DottedNamingPolicy, NamePattern, NamingPolicy};
pub use surrogate::{Surrogate, SurrogateCache};
pub use types::{
    ObjectId, ObjectKind, StoreId, MAGIC_NAME_NR, MAGIC_SPARSITY_NR, MAGIC_TIME_DOMAIN_NR,
    MAGIC_TYPE_NR, MAX_MAGIC_NR,
};
