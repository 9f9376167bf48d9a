//! In-memory cache driver

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tenantio_common::Result;

use crate::client::DistributedCache;

/// In-memory key-value cache.
///
/// Shared across hosts via `Arc`, it plays the role of the distributed
/// cache for single-process deployments and tests. All peers handed the
/// same instance observe each other's writes immediately.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl DistributedCache for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
