//! Shell context

use std::sync::Arc;
use tenantio_cache::DistributedCache;
use tenantio_common::ShellSettings;

/// Runtime container for one tenant.
///
/// Built by a [`crate::ShellContextFactory`] from the tenant's settings and
/// replaced wholesale on reload. Exposes the tenant's distributed cache
/// client when the cache feature is enabled in its settings.
pub struct ShellContext {
    settings: ShellSettings,
    cache: Option<Arc<dyn DistributedCache>>,
    created_at: i64,
}

impl ShellContext {
    /// Create a context from settings and an optional cache client
    pub fn new(settings: ShellSettings, cache: Option<Arc<dyn DistributedCache>>) -> Self {
        Self {
            settings,
            cache,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// The settings this context was built from
    pub fn settings(&self) -> &ShellSettings {
        &self.settings
    }

    /// Tenant name
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// The tenant's distributed cache client, if the feature is enabled
    pub fn distributed_cache(&self) -> Option<Arc<dyn DistributedCache>> {
        self.cache.clone()
    }

    /// Unix timestamp at which this context was built
    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}
