//! Host-facing traits
//!
//! The synchronizer never owns tenants; it observes and drives a host
//! through these traits. `release_shell` and `reload_shell` carry an
//! `event_source` flag: when `false` the host must apply the action
//! WITHOUT firing the corresponding outbound event, so that changes
//! applied on behalf of a peer are not republished.

use async_trait::async_trait;
use std::sync::Arc;
use tenantio_common::{Result, ShellSettings};

use crate::context::ShellContext;

/// Operations the synchronizer invokes on the tenant host
#[async_trait]
pub trait ShellHost: Send + Sync {
    /// Get the live shell context for `name`, if one is built
    async fn try_get_context(&self, name: &str) -> Option<Arc<ShellContext>>;

    /// Get the settings the host holds for `name`, if any
    async fn try_get_settings(&self, name: &str) -> Option<ShellSettings>;

    /// All settings currently known to the host
    async fn list_settings(&self) -> Vec<ShellSettings>;

    /// Dispose the live shell context for a tenant; the next request
    /// rebuilds it. Fires `on_releasing` only when `event_source` is true.
    async fn release_shell(&self, settings: &ShellSettings, event_source: bool) -> Result<()>;

    /// Re-read settings and rebuild the shell context. Fires
    /// `on_reloading` only when `event_source` is true.
    async fn reload_shell(&self, settings: &ShellSettings, event_source: bool) -> Result<()>;
}

/// Lifecycle events the host fires to subscribers.
///
/// Handlers run on the caller's task and may be invoked concurrently for
/// distinct tenant names; implementations serialize per-name internally.
#[async_trait]
pub trait ShellEvents: Send + Sync {
    /// The host is about to enumerate and build its tenants
    async fn on_loading(&self);

    /// A tenant mutated locally is about to be released
    async fn on_releasing(&self, name: &str);

    /// A tenant is about to be reloaded
    async fn on_reloading(&self, name: &str);
}
