//! Per-tenant identifier records and locks

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Last observed change identifiers for one tenant.
///
/// Both fields start unset and are overwritten with whatever the cache
/// currently reports; records are never deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShellIdentifier {
    /// Last observed release id
    pub release_id: Option<String>,
    /// Last observed reload id
    pub reload_id: Option<String>,
}

/// Table mapping tenant name to its identifier record.
///
/// The async mutex guarding each record doubles as the per-tenant lock:
/// publishing and reconciling the same tenant are serialized through it,
/// and it may be held across cache and host awaits. The same name always
/// yields the same mutex for the lifetime of the table, and entries grow
/// without eviction (tenant names are finite in practice).
#[derive(Default)]
pub struct IdentifierTable {
    entries: Mutex<HashMap<String, Arc<AsyncMutex<ShellIdentifier>>>>,
}

impl IdentifierTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record (and lock) for `name`, creating it atomically on
    /// first use
    pub fn get_or_create(&self, name: &str) -> Arc<AsyncMutex<ShellIdentifier>> {
        self.entries
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Number of tenants ever seen
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
