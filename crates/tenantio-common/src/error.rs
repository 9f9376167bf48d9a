//! Error types for Tenantio
//!
//! This module defines the common error types used throughout the system.

use thiserror::Error;

/// Common result type for Tenantio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Tenantio
#[derive(Debug, Error)]
pub enum Error {
    // Cache errors
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("cache error: {0}")]
    Cache(String),

    // Settings errors
    #[error("tenant settings not found: {0}")]
    SettingsNotFound(String),

    #[error("settings error: {0}")]
    Settings(String),

    // Host errors
    #[error("shell context not found: {0}")]
    ContextNotFound(String),

    #[error("host error: {0}")]
    Host(String),

    #[error("distributed context already released")]
    ContextReleased,

    // Internal errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a cache-unavailable error
    pub fn cache_unavailable(msg: impl Into<String>) -> Self {
        Self::CacheUnavailable(msg.into())
    }

    /// Create a settings error
    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    /// Create a host error
    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host(msg.into())
    }

    /// Check if this is a retryable error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::CacheUnavailable(_) | Self::Cache(_))
    }
}
