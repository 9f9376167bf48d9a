//! Shell context factory

use async_trait::async_trait;
use std::sync::Arc;
use tenantio_cache::DistributedCache;
use tenantio_common::{Result, ShellSettings};

use crate::context::ShellContext;

/// Builds shell contexts from tenant settings
#[async_trait]
pub trait ShellContextFactory: Send + Sync {
    /// Build a fresh context for `settings`
    async fn create_context(&self, settings: &ShellSettings) -> Result<ShellContext>;
}

/// Factory binding contexts to one shared cache client.
///
/// Every tenant whose settings enable the cache feature gets a clone of
/// the same client; tenants without the feature get a context with no
/// cache. This is the wiring for single-process deployments where all
/// tenants share one driver instance.
pub struct SharedCacheFactory {
    cache: Arc<dyn DistributedCache>,
}

impl SharedCacheFactory {
    /// Create a factory around `cache`
    pub fn new(cache: Arc<dyn DistributedCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ShellContextFactory for SharedCacheFactory {
    async fn create_context(&self, settings: &ShellSettings) -> Result<ShellContext> {
        let cache = settings.cache_enabled().then(|| self.cache.clone());
        Ok(ShellContext::new(settings.clone(), cache))
    }
}
