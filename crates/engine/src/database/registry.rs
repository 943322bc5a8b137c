//! Process-wide registry of open sessions
//!
//! A database name may be registered once. Constructing a second session with
//! the same name before the first is closed is a configuration error.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashSet;

use chronicle_core::{Error, Result};

// =============================================================================
// Global Session Registry
// =============================================================================

/// Names of the sessions currently constructed and not yet closed
pub static OPEN_SESSIONS: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

pub(super) fn register(name: &str) -> Result<()> {
    let mut sessions = OPEN_SESSIONS.lock();
    if !sessions.insert(name.to_string()) {
        return Err(Error::Configuration(format!(
            "database {} is already constructed",
            name
        )));
    }
    Ok(())
}

pub(super) fn unregister(name: &str) -> bool {
    OPEN_SESSIONS.lock().remove(name)
}

/// True if a session with this name is registered
pub fn is_registered(name: &str) -> bool {
    OPEN_SESSIONS.lock().contains(name)
}
