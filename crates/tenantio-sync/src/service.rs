//! Tenant synchronization service
//!
//! This module holds the service state and the hook handlers the host
//! fires on operator-driven lifecycle actions. The handlers publish
//! change identifiers into the distributed cache; the poller loop that
//! consumes them lives in [`crate::poller`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tenantio_cache::DistributedCache;
use tenantio_common::{Error, Result, ShellSettings, SyncConfig, DEFAULT_TENANT};
use tenantio_shell::{SettingsStore, ShellContextFactory, ShellEvents, ShellHost};
use tracing::warn;

use crate::context::DistributedContext;
use crate::identifiers::IdentifierTable;
use crate::ids;
use crate::keys;
use crate::lifecycle::SyncStateCell;

/// Last observed global identifiers.
///
/// Written once by `on_loading` at startup (the baseline that keeps the
/// first poll tick quiet), then only by the poller task.
#[derive(Default)]
pub(crate) struct SyncCursor {
    pub(crate) shell_changed_id: Option<String>,
    pub(crate) shell_created_id: Option<String>,
}

/// Distributed tenant synchronization service.
///
/// Subscribe it to the host's lifecycle events and spawn
/// [`run`](ShellSyncService::run) on a background task. One instance per
/// process.
pub struct ShellSyncService {
    pub(crate) host: Arc<dyn ShellHost>,
    pub(crate) store: Arc<dyn SettingsStore>,
    pub(crate) factory: Arc<dyn ShellContextFactory>,
    pub(crate) config: SyncConfig,
    pub(crate) identifiers: IdentifierTable,
    /// Shared distributed context; installed and replaced by the poller
    pub(crate) context: Mutex<Option<Arc<DistributedContext>>>,
    pub(crate) cursor: Mutex<SyncCursor>,
    pub(crate) state: SyncStateCell,
    terminated: AtomicBool,
}

impl ShellSyncService {
    /// Create a synchronization service over a host, its settings store
    /// and a shell-context factory
    pub fn new(
        host: Arc<dyn ShellHost>,
        store: Arc<dyn SettingsStore>,
        factory: Arc<dyn ShellContextFactory>,
        config: SyncConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            host,
            store,
            factory,
            config,
            identifiers: IdentifierTable::new(),
            context: Mutex::new(None),
            cursor: Mutex::new(SyncCursor::default()),
            state: SyncStateCell::new(),
            terminated: AtomicBool::new(false),
        })
    }

    /// Check whether the service has shut down; hook handlers become
    /// no-ops from then on
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    pub(crate) fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::Release);
    }

    /// The currently installed shared distributed context, if any
    pub fn current_context(&self) -> Option<Arc<DistributedContext>> {
        self.context.lock().clone()
    }

    /// The default tenant's settings, provided it is running
    pub(crate) async fn running_default_settings(&self) -> Option<ShellSettings> {
        let settings = self.host.try_get_settings(DEFAULT_TENANT).await?;
        settings.state.is_running().then_some(settings)
    }

    fn acquire_shared(&self) -> Option<Arc<DistributedContext>> {
        self.context.lock().as_ref().and_then(DistributedContext::acquire)
    }

    /// Acquire the shared context if it is still live, else build a
    /// one-shot context scoped to the current call. Either way the
    /// returned handle must be released by the caller.
    pub(crate) async fn acquire_or_create(
        &self,
        settings: &ShellSettings,
    ) -> Result<Arc<DistributedContext>> {
        if let Some(context) = self.acquire_shared() {
            return Ok(context);
        }
        DistributedContext::build(self.factory.as_ref(), settings).await
    }

    /// Record the current cache state as the baseline so the poller does
    /// not trigger on its first tick
    async fn capture_baseline(&self, cache: &Arc<dyn DistributedCache>) -> Result<()> {
        let changed = cache.get_string(keys::SHELL_CHANGED_ID).await?;
        let created = cache.get_string(keys::SHELL_CREATED_ID).await?;
        {
            let mut cursor = self.cursor.lock();
            cursor.shell_changed_id = changed;
            cursor.shell_created_id = created;
        }

        for name in self.store.load_names().await? {
            let release = cache.get_string(&keys::release_key(&name)).await?;
            let reload = cache.get_string(&keys::reload_key(&name)).await?;
            if release.is_none() && reload.is_none() {
                continue;
            }
            let entry = self.identifiers.get_or_create(&name);
            let mut ident = entry.lock().await;
            if release.is_some() {
                ident.release_id = release;
            }
            if reload.is_some() {
                ident.reload_id = reload;
            }
        }
        Ok(())
    }

    /// Publish `id` for the tenant key, then chain the heartbeat write.
    ///
    /// The per-tenant key is always written before `SHELL_CHANGED_ID`;
    /// peers that observe the heartbeat are then guaranteed to observe
    /// the per-tenant value no later than the next chained publish.
    async fn publish(
        &self,
        cache: &Arc<dyn DistributedCache>,
        tenant_key: &str,
        id: &str,
    ) -> Result<()> {
        cache.set_string(tenant_key, id).await?;
        cache.set_string(keys::SHELL_CHANGED_ID, id).await?;
        Ok(())
    }
}

#[async_trait]
impl ShellEvents for ShellSyncService {
    async fn on_loading(&self) {
        if self.is_terminated() {
            return;
        }
        // the host fires this before registering any tenant, so the
        // default settings can only come from the store here
        let settings = match self.store.load(DEFAULT_TENANT).await {
            Ok(settings) if settings.state.is_running() => settings,
            Ok(_) | Err(Error::SettingsNotFound(_)) => return,
            Err(e) => {
                warn!("Failed to load default tenant settings: {e}");
                return;
            }
        };
        let context = match self.acquire_or_create(&settings).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Failed to build distributed context while loading: {e}");
                return;
            }
        };

        if let Some(cache) = context.cache() {
            if let Err(e) = self.capture_baseline(&cache).await {
                warn!("Failed to read sync baseline from cache: {e}");
            }
        }
        context.release();
    }

    async fn on_releasing(&self, name: &str) {
        if self.is_terminated() {
            return;
        }
        let Some(settings) = self.running_default_settings().await else {
            return;
        };
        let context = match self.acquire_or_create(&settings).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Failed to build distributed context releasing {name}: {e}");
                return;
            }
        };

        if let Some(cache) = context.cache() {
            let entry = self.identifiers.get_or_create(name);
            let mut ident = entry.lock().await;
            let id = ids::new_change_id();
            ident.release_id = Some(id.clone());
            if let Err(e) = self.publish(&cache, &keys::release_key(name), &id).await {
                warn!("Failed to publish release of {name}: {e}");
            }
        }
        context.release();
    }

    async fn on_reloading(&self, name: &str) {
        if self.is_terminated() {
            return;
        }
        let Some(settings) = self.running_default_settings().await else {
            return;
        };
        let context = match self.acquire_or_create(&settings).await {
            Ok(context) => context,
            Err(e) => {
                warn!("Failed to build distributed context reloading {name}: {e}");
                return;
            }
        };

        if let Some(cache) = context.cache() {
            let entry = self.identifiers.get_or_create(name);
            let mut ident = entry.lock().await;
            let id = ids::new_change_id();
            ident.reload_id = Some(id.clone());

            let result = async {
                cache.set_string(&keys::reload_key(name), &id).await?;
                // flag tenants the publishing peer has never seen, so
                // other peers rescan the settings store
                if name != DEFAULT_TENANT && self.host.try_get_settings(name).await.is_none() {
                    cache.set_string(keys::SHELL_CREATED_ID, &id).await?;
                }
                cache.set_string(keys::SHELL_CHANGED_ID, &id).await?;
                Ok::<(), tenantio_common::Error>(())
            }
            .await;

            if let Err(e) = result {
                warn!("Failed to publish reload of {name}: {e}");
            }
        }
        context.release();
    }
}
