//! Tenantio Shell - Tenant runtime containers and host abstractions
//!
//! A shell context is the host's runtime container for one tenant; it is
//! rebuilt on reload and dropped on release. This crate defines the
//! context type, the traits the synchronizer consumes (host, events,
//! settings store, context factory), and an in-process reference host.

pub mod context;
pub mod factory;
pub mod host;
pub mod in_process;
pub mod store;

pub use context::ShellContext;
pub use factory::{SharedCacheFactory, ShellContextFactory};
pub use host::{ShellEvents, ShellHost};
pub use in_process::InProcessHost;
pub use store::{FileSettingsStore, MemorySettingsStore, SettingsStore};
