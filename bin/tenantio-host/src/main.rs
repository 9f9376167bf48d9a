//! Tenantio Host - Multi-tenant demo daemon
//!
//! Runs an in-process tenant host with the distributed synchronizer
//! attached. Tenant settings live as JSON documents in a directory;
//! peers sharing the same cache converge on release/reload actions.

use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::sync::Arc;
use tenantio_cache::MemoryCache;
use tenantio_common::{CacheSettings, ShellSettings, SyncConfig, DEFAULT_TENANT};
use tenantio_shell::{FileSettingsStore, InProcessHost, SettingsStore, SharedCacheFactory};
use tenantio_sync::ShellSyncService;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tenantio-host")]
#[command(about = "Tenantio multi-tenant host daemon")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/tenantio/host.toml")]
    config: String,

    /// Directory holding per-tenant settings documents
    #[arg(long)]
    tenants_dir: Option<String>,

    /// Write a Default-tenant settings document if the directory is empty
    #[arg(long)]
    seed: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Poll interval override in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
struct Config {
    #[serde(default)]
    host: HostConfig,
    #[serde(default)]
    sync: SyncConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
struct HostConfig {
    #[serde(default = "default_tenants_dir")]
    tenants_dir: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tenants_dir: default_tenants_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoggingConfig {
    #[serde(default = "default_log_level")]
    level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_tenants_dir() -> String {
    "./tenants".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config file if it exists
    let config: Config = if std::path::Path::new(&args.config).exists() {
        let config_str = std::fs::read_to_string(&args.config)?;
        toml::from_str(&config_str).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse config file: {}", e);
            Config::default()
        })
    } else {
        Config::default()
    };

    // Merge CLI args with config file (CLI takes precedence)
    let tenants_dir = args.tenants_dir.unwrap_or(config.host.tenants_dir);
    let log_level = if args.log_level != "info" {
        args.log_level
    } else {
        config.logging.level
    };
    let mut sync_config = config.sync;
    if let Some(ms) = args.poll_interval_ms {
        sync_config.idle_interval_ms = ms;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tenantio host");
    info!("Config file: {}", args.config);
    info!("Tenants directory: {}", tenants_dir);

    let store = Arc::new(FileSettingsStore::open(&tenants_dir)?);
    if args.seed && store.load_names().await?.is_empty() {
        let default =
            ShellSettings::new(DEFAULT_TENANT).with_cache(CacheSettings::memory());
        store.save(&default)?;
        info!("Seeded default tenant settings in {}", tenants_dir);
    }

    // In-memory driver; peers in other processes need a networked driver
    let cache = Arc::new(MemoryCache::new());
    let factory = Arc::new(SharedCacheFactory::new(cache));
    let host = Arc::new(InProcessHost::new(store.clone(), factory.clone()));
    let sync = ShellSyncService::new(host.clone(), store, factory, sync_config);
    host.subscribe(sync.clone());
    host.initialize().await?;

    let cancel = CancellationToken::new();
    let poller = tokio::spawn(sync.clone().run(cancel.clone()));

    info!(
        "Synchronizer polling every {}ms",
        sync_config.idle_interval_ms
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    cancel.cancel();
    poller.await?;

    info!("Tenantio host shut down gracefully");
    Ok(())
}
