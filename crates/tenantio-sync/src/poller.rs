//! Synchronizer poll loop
//!
//! A single background task polls the heartbeat key, detects divergence
//! from the locally recorded identifiers, and fans reconciliation out
//! across tenants. Cache failures on the heartbeat read drive an
//! exponential backoff capped at the configured retry maximum.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tenantio_cache::DistributedCache;
use tenantio_common::{Result, ShellSettings, DEFAULT_TENANT};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::DistributedContext;
use crate::keys;
use crate::lifecycle::SyncState;
use crate::service::ShellSyncService;

/// Adaptive delay between poll ticks.
///
/// Doubles on each failure up to a cap; `failure` reports `true` exactly
/// when the delay first reaches the cap within a failure streak, so the
/// caller logs once per streak.
pub(crate) struct Backoff {
    base: Duration,
    max: Duration,
    delay: Duration,
}

impl Backoff {
    pub(crate) fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            delay: base,
        }
    }

    /// Current delay before the next tick
    pub(crate) fn delay(&self) -> Duration {
        self.delay
    }

    /// Back to the healthy cadence
    pub(crate) fn reset(&mut self) {
        self.delay = self.base;
    }

    /// Register a failure; returns true when the delay first saturates
    pub(crate) fn failure(&mut self) -> bool {
        if self.delay >= self.max {
            return false;
        }
        self.delay = (self.delay * 2).min(self.max);
        self.delay >= self.max
    }
}

impl ShellSyncService {
    /// Run the synchronizer until `cancel` is signalled.
    ///
    /// Spawn this on a dedicated task; it owns the shared distributed
    /// context and is the only writer of the sync cursor once the host
    /// has finished loading.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!("Tenant synchronizer starting");
        let mut backoff = Backoff::new(self.config.idle_interval(), self.config.retry_max());
        let mut default_context = None;

        'poll: loop {
            if self.state.get() == SyncState::Starting {
                self.state.set(SyncState::Running);
                debug!("Tenant synchronizer running");
            }

            tokio::select! {
                _ = cancel.cancelled() => break 'poll,
                _ = tokio::time::sleep(backoff.delay()) => {}
            }

            // a peer without a running default tenant has no cache
            // configuration to poll with
            let Some(settings) = self.running_default_settings().await else {
                continue;
            };
            let Some(host_context) = self.host.try_get_context(DEFAULT_TENANT).await else {
                continue;
            };

            // the default tenant was rebuilt: rebind to its new settings
            let stale = default_context
                .as_ref()
                .map_or(true, |prev| !Arc::ptr_eq(prev, &host_context));
            if stale {
                let fresh =
                    match DistributedContext::build(self.factory.as_ref(), &settings).await {
                        Ok(context) => context,
                        Err(e) => {
                            warn!("Failed to rebuild distributed context: {e}");
                            continue;
                        }
                    };
                if let Some(previous) = self.context.lock().replace(fresh) {
                    previous.release();
                }
                default_context = Some(host_context);
            }

            let Some(context) = self.current_context() else {
                continue;
            };
            let Some(cache) = context.cache() else {
                continue;
            };

            // heartbeat: one key tells us whether anything changed anywhere
            let changed = match cache.get_string(keys::SHELL_CHANGED_ID).await {
                Ok(value) => {
                    backoff.reset();
                    value
                }
                Err(e) => {
                    if backoff.failure() {
                        error!(
                            "Cache unreachable, polling backed off to {:?}: {e}",
                            backoff.delay()
                        );
                    }
                    continue;
                }
            };

            let Some(changed) = changed else { continue };
            let (previous_changed, previous_created) = {
                let cursor = self.cursor.lock();
                (
                    cursor.shell_changed_id.clone(),
                    cursor.shell_created_id.clone(),
                )
            };
            if previous_changed.as_deref() == Some(changed.as_str()) {
                continue;
            }
            self.cursor.lock().shell_changed_id = Some(changed);

            let tenants = match self.collect_tenants(&cache).await {
                Ok(tenants) => tenants,
                Err(e) => {
                    warn!("Skipping sync iteration: {e}");
                    // re-observe the divergence on the next tick
                    self.rewind_cursor(&previous_changed, &previous_created);
                    continue;
                }
            };

            let mut fanout_started = Instant::now();
            for settings in &tenants {
                if fanout_started.elapsed() > self.config.busy_max() {
                    tokio::select! {
                        _ = cancel.cancelled() => break 'poll,
                        _ = tokio::time::sleep(self.config.idle_interval()) => {}
                    }
                    fanout_started = Instant::now();
                }

                if let Err(e) = self.reconcile_tenant(&cache, settings).await {
                    warn!("Tenant sync interrupted at {}: {e}", settings.name);
                    self.rewind_cursor(&previous_changed, &previous_created);
                    break;
                }
            }
        }

        self.state.set(SyncState::Terminating);
        self.mark_terminated();
        if let Some(context) = self.context.lock().take() {
            context.release();
        }
        self.state.set(SyncState::Terminated);
        info!("Tenant synchronizer terminated");
    }

    /// Restore the cursor after an aborted iteration so the next tick
    /// re-observes the divergence and retries
    fn rewind_cursor(&self, changed: &Option<String>, created: &Option<String>) {
        let mut cursor = self.cursor.lock();
        cursor.shell_changed_id = changed.clone();
        cursor.shell_created_id = created.clone();
    }

    /// Settings of every tenant to reconcile this tick: the ones the
    /// host already knows, plus any a peer just created (signalled
    /// through `SHELL_CREATED_ID`, which triggers a settings rescan).
    async fn collect_tenants(
        &self,
        cache: &Arc<dyn DistributedCache>,
    ) -> Result<Vec<ShellSettings>> {
        let mut tenants = self.host.list_settings().await;

        let Some(created) = cache.get_string(keys::SHELL_CREATED_ID).await? else {
            return Ok(tenants);
        };
        let previous = self.cursor.lock().shell_created_id.clone();
        if previous.as_deref() == Some(created.as_str()) {
            return Ok(tenants);
        }

        for name in self.store.load_names().await? {
            if self.host.try_get_settings(&name).await.is_some() {
                continue;
            }
            tenants.push(self.store.load(&name).await?);
        }
        self.cursor.lock().shell_created_id = Some(created);
        Ok(tenants)
    }

    /// Reconcile one tenant: release first, then reload, each applied
    /// only when the cached id differs from the locally recorded one.
    /// Holds this tenant's lock for the whole comparison-and-apply; no
    /// other tenant lock is taken.
    async fn reconcile_tenant(
        &self,
        cache: &Arc<dyn DistributedCache>,
        settings: &ShellSettings,
    ) -> Result<()> {
        let entry = self.identifiers.get_or_create(&settings.name);
        let mut ident = entry.lock().await;

        if let Some(id) = cache.get_string(&keys::release_key(&settings.name)).await? {
            if ident.release_id.as_deref() != Some(id.as_str()) {
                ident.release_id = Some(id);
                if let Err(e) = self.host.release_shell(settings, false).await {
                    warn!("Failed to release tenant {}: {e}", settings.name);
                }
            }
        }

        if let Some(id) = cache.get_string(&keys::reload_key(&settings.name)).await? {
            if ident.reload_id.as_deref() != Some(id.as_str()) {
                ident.reload_id = Some(id);
                if let Err(e) = self.host.reload_shell(settings, false).await {
                    warn!("Failed to reload tenant {}: {e}", settings.name);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tenantio_cache::MemoryCache;
    use tenantio_common::{CacheSettings, Error, SyncConfig};
    use tenantio_shell::{
        InProcessHost, MemorySettingsStore, SharedCacheFactory, ShellContext, ShellEvents,
        ShellHost,
    };

    /// Host decorator recording the reconciliation calls the poller issues
    struct CountingHost {
        inner: Arc<InProcessHost>,
        ops: Mutex<Vec<(&'static str, String, bool)>>,
    }

    impl CountingHost {
        fn new(inner: Arc<InProcessHost>) -> Self {
            Self {
                inner,
                ops: Mutex::new(Vec::new()),
            }
        }

        fn ops(&self) -> Vec<(&'static str, String, bool)> {
            self.ops.lock().clone()
        }

        fn ops_for(&self, name: &str) -> Vec<(&'static str, bool)> {
            self.ops
                .lock()
                .iter()
                .filter(|(_, n, _)| n == name)
                .map(|(op, _, source)| (*op, *source))
                .collect()
        }
    }

    #[async_trait]
    impl ShellHost for CountingHost {
        async fn try_get_context(&self, name: &str) -> Option<Arc<ShellContext>> {
            self.inner.try_get_context(name).await
        }

        async fn try_get_settings(&self, name: &str) -> Option<ShellSettings> {
            self.inner.try_get_settings(name).await
        }

        async fn list_settings(&self) -> Vec<ShellSettings> {
            self.inner.list_settings().await
        }

        async fn release_shell(
            &self,
            settings: &ShellSettings,
            event_source: bool,
        ) -> tenantio_common::Result<()> {
            self.ops
                .lock()
                .push(("release", settings.name.clone(), event_source));
            self.inner.release_shell(settings, event_source).await
        }

        async fn reload_shell(
            &self,
            settings: &ShellSettings,
            event_source: bool,
        ) -> tenantio_common::Result<()> {
            self.ops
                .lock()
                .push(("reload", settings.name.clone(), event_source));
            self.inner.reload_shell(settings, event_source).await
        }
    }

    /// Cache decorator with injectable read failures
    struct FlakyCache {
        inner: Arc<MemoryCache>,
        fail_gets: AtomicBool,
    }

    impl FlakyCache {
        fn new(inner: Arc<MemoryCache>) -> Self {
            Self {
                inner,
                fail_gets: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.fail_gets.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl DistributedCache for FlakyCache {
        fn name(&self) -> &str {
            "flaky-memory"
        }

        async fn get_string(&self, key: &str) -> tenantio_common::Result<Option<String>> {
            if self.fail_gets.load(Ordering::SeqCst) {
                return Err(Error::cache_unavailable("injected outage"));
            }
            self.inner.get_string(key).await
        }

        async fn set_string(&self, key: &str, value: &str) -> tenantio_common::Result<()> {
            self.inner.set_string(key, value).await
        }
    }

    struct Peer {
        host: Arc<InProcessHost>,
        counting: Arc<CountingHost>,
        service: Arc<ShellSyncService>,
        cancel: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    impl Peer {
        async fn stop(self) {
            self.cancel.cancel();
            self.task.await.unwrap();
        }
    }

    fn test_config() -> SyncConfig {
        SyncConfig {
            idle_interval_ms: 20,
            busy_max_ms: 200,
            retry_max_ms: 160,
        }
    }

    fn shared_store() -> Arc<MemorySettingsStore> {
        let store = Arc::new(MemorySettingsStore::new());
        store.insert(ShellSettings::new(DEFAULT_TENANT).with_cache(CacheSettings::memory()));
        store.insert(ShellSettings::new("T1"));
        store
    }

    async fn spawn_peer(
        cache: Arc<dyn DistributedCache>,
        store: Arc<MemorySettingsStore>,
    ) -> Peer {
        let factory = Arc::new(SharedCacheFactory::new(cache));
        let host = Arc::new(InProcessHost::new(store.clone(), factory.clone()));
        let counting = Arc::new(CountingHost::new(host.clone()));
        let service =
            ShellSyncService::new(counting.clone(), store, factory, test_config());
        host.subscribe(service.clone());
        host.initialize().await.unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(service.clone().run(cancel.clone()));
        Peer {
            host,
            counting,
            service,
            cancel,
            task,
        }
    }

    async fn eventually<F, Fut>(what: &str, mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if condition().await {
                return;
            }
            if Instant::now() > deadline {
                panic!("timed out waiting for {what}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// A few poll ticks worth of real time
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    #[tokio::test]
    async fn test_solo_release_converges_on_peer() {
        let cache = Arc::new(MemoryCache::new());
        let store = shared_store();
        let a = spawn_peer(cache.clone(), store.clone()).await;
        let b = spawn_peer(cache.clone(), store.clone()).await;
        settle().await;

        let t1 = a.host.try_get_settings("T1").await.unwrap();
        a.host.release_shell(&t1, true).await.unwrap();

        let changed = cache.get_string("SHELL_CHANGED_ID").await.unwrap().unwrap();
        assert_eq!(
            cache.get_string("T1_RELEASE_ID").await.unwrap().unwrap(),
            changed
        );

        let counting = b.counting.clone();
        eventually("peer to apply the release", move || {
            let counting = counting.clone();
            async move { !counting.ops_for("T1").is_empty() }
        })
        .await;

        assert_eq!(b.counting.ops_for("T1"), vec![("release", false)]);
        assert!(b.host.try_get_context("T1").await.is_none());

        let entry = b.service.identifiers.get_or_create("T1");
        assert_eq!(
            entry.lock().await.release_id.as_deref(),
            Some(changed.as_str())
        );

        // publishing the same identifier yields no further reconciliation
        settle().await;
        assert_eq!(b.counting.ops_for("T1").len(), 1);
        // the publishing peer never reconciles its own change
        assert!(a.counting.ops_for("T1").is_empty());

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_peer_start_does_not_trigger_on_prior_state() {
        let cache = Arc::new(MemoryCache::new());
        // identifiers published by peers that ran before this one
        cache.set_string("T1_RELEASE_ID", "r0").await.unwrap();
        cache.set_string("T1_RELOAD_ID", "l0").await.unwrap();
        cache.set_string("SHELL_CHANGED_ID", "l0").await.unwrap();

        let peer = spawn_peer(cache.clone(), shared_store()).await;
        settle().await;

        // the startup baseline keeps the first ticks quiet
        assert!(peer.counting.ops().is_empty());
        assert!(peer.host.try_get_context("T1").await.is_some());
        peer.stop().await;
    }

    #[tokio::test]
    async fn test_new_tenant_created_on_peer_is_loaded() {
        let cache = Arc::new(MemoryCache::new());
        let store = shared_store();
        let a = spawn_peer(cache.clone(), store.clone()).await;
        let b = spawn_peer(cache.clone(), store.clone()).await;
        settle().await;

        // operator creates T2 on A: settings hit the store, then a
        // reload fires for a name A has never loaded
        let t2 = ShellSettings::new("T2");
        store.insert(t2.clone());
        a.host.reload_shell(&t2, true).await.unwrap();

        let reload = cache.get_string("T2_RELOAD_ID").await.unwrap().unwrap();
        assert_eq!(
            cache.get_string("SHELL_CREATED_ID").await.unwrap().unwrap(),
            reload
        );
        assert_eq!(
            cache.get_string("SHELL_CHANGED_ID").await.unwrap().unwrap(),
            reload
        );

        let host = b.host.clone();
        eventually("peer to build the new tenant", move || {
            let host = host.clone();
            async move { host.try_get_context("T2").await.is_some() }
        })
        .await;

        assert_eq!(b.counting.ops_for("T2"), vec![("reload", false)]);
        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_cache_outage_recovers_within_one_tick() {
        let memory = Arc::new(MemoryCache::new());
        let flaky = Arc::new(FlakyCache::new(memory.clone()));
        let store = shared_store();
        let a = spawn_peer(flaky.clone(), store.clone()).await;
        let b = spawn_peer(flaky.clone(), store.clone()).await;
        settle().await;

        flaky.set_failing(true);
        let t1 = a.host.try_get_settings("T1").await.unwrap();
        // writes still land; only reads fail during the outage
        a.host.release_shell(&t1, true).await.unwrap();

        settle().await;
        assert!(b.counting.ops_for("T1").is_empty());

        flaky.set_failing(false);
        let counting = b.counting.clone();
        eventually("peer to reconcile after recovery", move || {
            let counting = counting.clone();
            async move { !counting.ops_for("T1").is_empty() }
        })
        .await;

        assert_eq!(b.counting.ops_for("T1"), vec![("release", false)]);
        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_reconciliation_does_not_feed_back() {
        let cache = Arc::new(MemoryCache::new());
        let store = shared_store();
        let a = spawn_peer(cache.clone(), store.clone()).await;
        let b = spawn_peer(cache.clone(), store.clone()).await;
        settle().await;

        let t1 = a.host.try_get_settings("T1").await.unwrap();
        a.host.release_shell(&t1, true).await.unwrap();
        let published = cache.get_string("T1_RELEASE_ID").await.unwrap().unwrap();

        let counting = b.counting.clone();
        eventually("peer to apply the release", move || {
            let counting = counting.clone();
            async move { !counting.ops_for("T1").is_empty() }
        })
        .await;

        // B applied the change without event sourcing, so nothing new
        // was published and no peer reconciles again
        settle().await;
        assert_eq!(
            cache.get_string("T1_RELEASE_ID").await.unwrap().unwrap(),
            published
        );
        assert_eq!(
            cache.get_string("SHELL_CHANGED_ID").await.unwrap().unwrap(),
            published
        );
        assert_eq!(b.counting.ops_for("T1").len(), 1);
        assert!(a.counting.ops_for("T1").is_empty());

        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_release_then_reload_applies_in_order() {
        let cache = Arc::new(MemoryCache::new());
        let store = shared_store();
        let a = spawn_peer(cache.clone(), store.clone()).await;
        let b = spawn_peer(cache.clone(), store.clone()).await;
        settle().await;

        let t1 = a.host.try_get_settings("T1").await.unwrap();
        a.host.release_shell(&t1, true).await.unwrap();
        a.host.reload_shell(&t1, true).await.unwrap();

        let release = cache.get_string("T1_RELEASE_ID").await.unwrap().unwrap();
        let reload = cache.get_string("T1_RELOAD_ID").await.unwrap().unwrap();
        assert_ne!(release, reload);
        assert_eq!(
            cache.get_string("SHELL_CHANGED_ID").await.unwrap().unwrap(),
            reload
        );

        let counting = b.counting.clone();
        eventually("peer to apply both actions", move || {
            let counting = counting.clone();
            async move { counting.ops_for("T1").len() >= 2 }
        })
        .await;

        assert_eq!(
            b.counting.ops_for("T1"),
            vec![("release", false), ("reload", false)]
        );
        a.stop().await;
        b.stop().await;
    }

    #[tokio::test]
    async fn test_default_context_swap_rebinds_poller() {
        let cache = Arc::new(MemoryCache::new());
        let store = shared_store();
        let b = spawn_peer(cache.clone(), store.clone()).await;

        let service = b.service.clone();
        eventually("poller to install a context", move || {
            let service = service.clone();
            async move { service.current_context().is_some() }
        })
        .await;

        let before = b.service.current_context().unwrap();
        let held = before.acquire().expect("context is live");

        // the default tenant is rebuilt locally without event sourcing
        let default = b.host.try_get_settings(DEFAULT_TENANT).await.unwrap();
        b.host.reload_shell(&default, false).await.unwrap();

        let service = b.service.clone();
        let swapped_from = before.clone();
        eventually("poller to rebind to the new default", move || {
            let service = service.clone();
            let swapped_from = swapped_from.clone();
            async move {
                service
                    .current_context()
                    .map_or(false, |current| !Arc::ptr_eq(&current, &swapped_from))
            }
        })
        .await;

        // an in-flight holder of the previous context still completes
        assert!(held.cache().is_some());
        held.release();
        // with the holder gone and the poller rebound, the old context
        // is fully released
        let released = before.clone();
        eventually("old context to be fully released", move || {
            let released = released.clone();
            async move { released.ref_count() == 0 }
        })
        .await;
        assert!(before.acquire().is_none());

        b.stop().await;
    }

    #[tokio::test]
    async fn test_poller_is_idle_without_cache_feature() {
        let cache = Arc::new(MemoryCache::new());
        let store = Arc::new(MemorySettingsStore::new());
        store.insert(ShellSettings::new(DEFAULT_TENANT));
        store.insert(ShellSettings::new("T1"));
        let peer = spawn_peer(cache.clone(), store.clone()).await;
        settle().await;

        assert_eq!(peer.service.state.get(), SyncState::Running);
        assert!(peer.counting.ops().is_empty());
        assert!(cache.is_empty());
        peer.stop().await;
    }

    #[tokio::test]
    async fn test_cancellation_terminates_cleanly() {
        let cache = Arc::new(MemoryCache::new());
        let store = shared_store();
        let peer = spawn_peer(cache.clone(), store.clone()).await;
        settle().await;

        let service = peer.service.clone();
        peer.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), peer.task)
            .await
            .expect("poller exits promptly")
            .unwrap();

        assert_eq!(service.state.get(), SyncState::Terminated);
        assert!(service.is_terminated());
        assert!(service.current_context().is_none());

        // hooks are no-ops once terminated
        service.on_releasing("T1").await;
        assert!(cache.get_string("T1_RELEASE_ID").await.unwrap().is_none());
    }

    #[test]
    fn test_backoff_doubles_to_cap_and_logs_once() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        let mut delays = Vec::new();
        let mut saturations = 0;
        for _ in 0..8 {
            delays.push(backoff.delay().as_secs());
            if backoff.failure() {
                saturations += 1;
            }
        }
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);
        assert_eq!(saturations, 1);

        // a new streak after recovery saturates (and logs) again
        backoff.reset();
        assert_eq!(backoff.delay(), Duration::from_secs(1));
        let mut saturations = 0;
        for _ in 0..10 {
            if backoff.failure() {
                saturations += 1;
            }
        }
        assert_eq!(saturations, 1);
    }
}
