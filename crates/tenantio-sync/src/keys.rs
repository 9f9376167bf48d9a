//! Cache keyspace
//!
//! Key names are byte-exact across peers; all processes must agree on
//! them for convergence. The poller only ever reads these keys; the hook
//! handlers only ever write them.

/// Heartbeat key: latest release-or-reload id published by any peer
pub const SHELL_CHANGED_ID: &str = "SHELL_CHANGED_ID";

/// Latest reload id whose target tenant did not yet exist on the
/// publishing peer
pub const SHELL_CREATED_ID: &str = "SHELL_CREATED_ID";

/// Per-tenant key holding the latest release id for `name`
pub fn release_key(name: &str) -> String {
    format!("{name}_RELEASE_ID")
}

/// Per-tenant key holding the latest reload id for `name`
pub fn reload_key(name: &str) -> String {
    format!("{name}_RELOAD_ID")
}
