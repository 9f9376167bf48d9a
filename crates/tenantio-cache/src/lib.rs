//! Tenantio Cache - Distributed key-value cache abstraction
//!
//! This crate defines the string key-value API the synchronizer publishes
//! and polls through, plus an in-memory driver for single-process
//! deployments and tests. Values have no TTL; they persist until
//! overwritten.

pub mod client;
pub mod memory;

pub use client::DistributedCache;
pub use memory::MemoryCache;
