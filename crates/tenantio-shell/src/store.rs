//! Settings stores
//!
//! The settings store is the persisted source of truth for tenant
//! settings. The synchronizer rescans it when a peer reports a newly
//! created tenant.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tenantio_common::{Error, Result, ShellSettings};

/// Persisted tenant-settings store
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Names of all stored tenants
    async fn load_names(&self) -> Result<Vec<String>>;

    /// Load the settings for one tenant
    async fn load(&self, name: &str) -> Result<ShellSettings>;
}

/// In-memory settings store for tests and demos
#[derive(Default)]
pub struct MemorySettingsStore {
    entries: RwLock<HashMap<String, ShellSettings>>,
}

impl MemorySettingsStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tenant's settings
    pub fn insert(&self, settings: ShellSettings) {
        self.entries
            .write()
            .insert(settings.name.clone(), settings);
    }

    /// Remove a tenant's settings
    pub fn remove(&self, name: &str) {
        self.entries.write().remove(name);
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn load(&self, name: &str) -> Result<ShellSettings> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SettingsNotFound(name.to_string()))
    }
}

/// File-backed settings store: one `<name>.json` document per tenant
pub struct FileSettingsStore {
    dir: PathBuf,
}

impl FileSettingsStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Persist a tenant's settings
    pub fn save(&self, settings: &ShellSettings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        std::fs::write(self.path_for(&settings.name), json)?;
        Ok(())
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn load(&self, name: &str) -> Result<ShellSettings> {
        let path = self.path_for(name);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SettingsNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&json).map_err(|e| Error::Serialization(e.to_string()))
    }
}
