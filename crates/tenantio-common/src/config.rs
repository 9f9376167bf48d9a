//! Synchronizer timing configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing configuration for the tenant synchronizer
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Polling cadence while the cache is healthy (milliseconds)
    #[serde(default = "default_idle_ms")]
    pub idle_interval_ms: u64,
    /// Maximum uninterrupted per-tenant fan-out before yielding (milliseconds)
    #[serde(default = "default_busy_max_ms")]
    pub busy_max_ms: u64,
    /// Upper bound on the adaptive backoff after cache failures (milliseconds)
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,
}

fn default_idle_ms() -> u64 {
    1_000
}

fn default_busy_max_ms() -> u64 {
    2_000
}

fn default_retry_max_ms() -> u64 {
    60_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            idle_interval_ms: default_idle_ms(),
            busy_max_ms: default_busy_max_ms(),
            retry_max_ms: default_retry_max_ms(),
        }
    }
}

impl SyncConfig {
    /// Polling cadence while the cache is healthy
    #[must_use]
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    /// Maximum uninterrupted fan-out time
    #[must_use]
    pub fn busy_max(&self) -> Duration {
        Duration::from_millis(self.busy_max_ms)
    }

    /// Backoff cap after repeated cache failures
    #[must_use]
    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }
}
