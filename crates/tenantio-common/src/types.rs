//! Tenant settings model
//!
//! A tenant is an isolated logical instance of the host with its own
//! configuration and runtime resources. Its persisted settings are the unit
//! the settings store loads and the synchronizer reconciles.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tenant lifecycle state as observed on the host
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantState {
    /// Tenant exists but has never been set up
    #[default]
    Uninitialized,
    /// Tenant setup is in progress
    Initializing,
    /// Tenant is serving requests
    Running,
    /// Tenant has been disabled by an operator
    Disabled,
}

impl TenantState {
    /// Check whether the tenant is serving requests
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Distributed cache configuration carried by a tenant's settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Cache driver name (e.g. "memory")
    pub provider: String,
    /// Driver-specific endpoint, if any
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl CacheSettings {
    /// In-process memory cache settings
    pub fn memory() -> Self {
        Self {
            provider: "memory".to_string(),
            endpoint: None,
        }
    }
}

/// Persisted settings for a single tenant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellSettings {
    /// Tenant name (case-sensitive, non-empty)
    pub name: String,
    /// Current lifecycle state
    #[serde(default)]
    pub state: TenantState,
    /// Distributed cache configuration; `None` disables the cache feature
    #[serde(default)]
    pub cache: Option<CacheSettings>,
    /// Free-form tenant properties
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl ShellSettings {
    /// Create settings for a running tenant without the cache feature
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TenantState::Running,
            cache: None,
            properties: HashMap::new(),
        }
    }

    /// Enable the distributed cache feature on these settings
    #[must_use]
    pub fn with_cache(mut self, cache: CacheSettings) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the lifecycle state
    #[must_use]
    pub fn with_state(mut self, state: TenantState) -> Self {
        self.state = state;
        self
    }

    /// Check whether the distributed cache feature is enabled
    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }
}
