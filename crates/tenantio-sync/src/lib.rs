//! Tenantio Sync - Distributed tenant synchronization
//!
//! Keeps the tenants of peer processes converged without peer-to-peer
//! messaging. Every peer publishes an opaque identifier into a shared
//! distributed cache when a tenant is released or reloaded locally; a
//! background poller on every other peer compares those identifiers with
//! the last ones it observed and applies the matching local action.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐ lifecycle events ┌─────────────────┐ identifiers ┌───────┐
//! │   Host   ├─────────────────►│ ShellSyncService├────────────►│ Cache │
//! │ (peer A) │◄─────────────────┤  hooks + poller │◄────────────┤(shared│
//! └──────────┘ release / reload └─────────────────┘    polling  │  KV)  │
//!                  (not event-sourced)                          └───┬───┘
//!                                                                   │
//!                                              peers B, C … poll the same keys
//! ```
//!
//! Reconciliation calls back into the host with `event_source = false`,
//! which suppresses the outbound hook and prevents publish feedback.

pub mod context;
pub mod identifiers;
pub mod ids;
pub mod keys;
pub mod lifecycle;
pub mod poller;
pub mod service;

pub use context::DistributedContext;
pub use identifiers::{IdentifierTable, ShellIdentifier};
pub use lifecycle::SyncState;
pub use service::ShellSyncService;
