//! Refcounted distributed context
//!
//! The poller binds to the default tenant's configuration through a shell
//! context of its own, replaced whenever the host swaps the default
//! tenant. A hook handler that captured the previous context must be able
//! to finish against it while the replacement is installed, hence the
//! explicit reference count on top of `Arc`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tenantio_cache::DistributedCache;
use tenantio_common::{Result, ShellSettings};
use tenantio_shell::{ShellContext, ShellContextFactory};
use tracing::debug;

/// Handle binding a cache client to a default-tenant context snapshot.
///
/// Created with a count of one owned by the builder. [`acquire`] fails
/// once the count has reached zero; callers that fail to acquire must
/// build a fresh one-shot context or no-op. Every successful `build` or
/// `acquire` must be paired with exactly one [`release`].
///
/// [`acquire`]: DistributedContext::acquire
/// [`release`]: DistributedContext::release
pub struct DistributedContext {
    context: ShellContext,
    refs: AtomicUsize,
}

impl DistributedContext {
    /// Build a context from the default tenant's settings
    pub async fn build(
        factory: &dyn ShellContextFactory,
        settings: &ShellSettings,
    ) -> Result<Arc<Self>> {
        let context = factory.create_context(settings).await?;
        Ok(Arc::new(Self {
            context,
            refs: AtomicUsize::new(1),
        }))
    }

    /// The settings this context was built from
    pub fn settings(&self) -> &ShellSettings {
        self.context.settings()
    }

    /// The cache client, or `None` when the configured tenant has no
    /// distributed-cache feature enabled
    pub fn cache(&self) -> Option<Arc<dyn DistributedCache>> {
        self.context.distributed_cache()
    }

    /// Increment the reference count and return a usable handle, or
    /// `None` if the context has already been released
    pub fn acquire(self: &Arc<Self>) -> Option<Arc<Self>> {
        let mut count = self.refs.load(Ordering::Relaxed);
        loop {
            if count == 0 {
                return None;
            }
            match self.refs.compare_exchange_weak(
                count,
                count + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(Arc::clone(self)),
                Err(observed) => count = observed,
            }
        }
    }

    /// Decrement the reference count; the underlying context is torn
    /// down when the count reaches zero
    pub fn release(&self) {
        if self.refs.fetch_sub(1, Ordering::Release) == 1 {
            debug!(
                "Distributed context for tenant {} released",
                self.settings().name
            );
        }
    }

    /// Current reference count
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Relaxed)
    }
}
