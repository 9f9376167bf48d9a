//! In-process reference host
//!
//! A minimal tenant host good enough to run the synchronizer end to end:
//! it keeps settings and built contexts in memory, loads tenants from a
//! settings store, and fires lifecycle events to subscribers on
//! event-sourced actions.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tenantio_common::{Result, ShellSettings};
use tracing::{debug, info};

use crate::context::ShellContext;
use crate::factory::ShellContextFactory;
use crate::host::{ShellEvents, ShellHost};
use crate::store::SettingsStore;

/// Reference host running all tenants inside the current process
pub struct InProcessHost {
    store: Arc<dyn SettingsStore>,
    factory: Arc<dyn ShellContextFactory>,
    settings: RwLock<HashMap<String, ShellSettings>>,
    contexts: RwLock<HashMap<String, Arc<ShellContext>>>,
    subscribers: RwLock<Vec<Arc<dyn ShellEvents>>>,
}

impl InProcessHost {
    /// Create a host over a settings store and a context factory
    pub fn new(store: Arc<dyn SettingsStore>, factory: Arc<dyn ShellContextFactory>) -> Self {
        Self {
            store,
            factory,
            settings: RwLock::new(HashMap::new()),
            contexts: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register a lifecycle-event subscriber
    pub fn subscribe(&self, events: Arc<dyn ShellEvents>) {
        self.subscribers.write().push(events);
    }

    /// Load every stored tenant and build contexts for the running ones.
    ///
    /// Fires `on_loading` first so subscribers can record their baseline
    /// before any tenant is built.
    pub async fn initialize(&self) -> Result<()> {
        for events in self.subscriber_snapshot() {
            events.on_loading().await;
        }

        let names = self.store.load_names().await?;
        for name in &names {
            let settings = self.store.load(name).await?;
            if settings.state.is_running() {
                let context = self.factory.create_context(&settings).await?;
                self.contexts
                    .write()
                    .insert(name.clone(), Arc::new(context));
            }
            self.settings.write().insert(name.clone(), settings);
        }

        info!("Host initialized with {} tenants", names.len());
        Ok(())
    }

    fn subscriber_snapshot(&self) -> Vec<Arc<dyn ShellEvents>> {
        self.subscribers.read().clone()
    }
}

#[async_trait]
impl ShellHost for InProcessHost {
    async fn try_get_context(&self, name: &str) -> Option<Arc<ShellContext>> {
        self.contexts.read().get(name).cloned()
    }

    async fn try_get_settings(&self, name: &str) -> Option<ShellSettings> {
        self.settings.read().get(name).cloned()
    }

    async fn list_settings(&self) -> Vec<ShellSettings> {
        let mut all: Vec<ShellSettings> = self.settings.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    async fn release_shell(&self, settings: &ShellSettings, event_source: bool) -> Result<()> {
        if event_source {
            for events in self.subscriber_snapshot() {
                events.on_releasing(&settings.name).await;
            }
        }

        self.contexts.write().remove(&settings.name);
        debug!("Released shell context for tenant {}", settings.name);
        Ok(())
    }

    async fn reload_shell(&self, settings: &ShellSettings, event_source: bool) -> Result<()> {
        if event_source {
            for events in self.subscriber_snapshot() {
                events.on_reloading(&settings.name).await;
            }
        }

        let fresh = self.store.load(&settings.name).await?;
        if fresh.state.is_running() {
            let context = self.factory.create_context(&fresh).await?;
            self.contexts
                .write()
                .insert(fresh.name.clone(), Arc::new(context));
        } else {
            self.contexts.write().remove(&fresh.name);
        }
        self.settings.write().insert(fresh.name.clone(), fresh);
        debug!("Reloaded shell context for tenant {}", settings.name);
        Ok(())
    }
}
