//! Configuration management for Kiln

pub mod schema;

pub use schema::{Config, StorageBackend};

use crate::error::{KilnError, KilnResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Environment variables that override file settings
pub mod env {
    pub const STORAGE_API_KEY: &str = "KILN_STORAGE_API_KEY";
    pub const STORAGE_ENDPOINT: &str = "KILN_STORAGE_ENDPOINT";
    pub const STORAGE_BUCKET: &str = "KILN_STORAGE_BUCKET";
    pub const REGISTRY_URL: &str = "KILN_REGISTRY_URL";
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kiln")
            .join("config.toml")
    }

    /// Get the build journal path
    pub fn journal_path() -> PathBuf {
        schema::state_dir().join("journal.log")
    }

    /// Load configuration, falling back to defaults if the file does not exist
    pub async fn load(&self) -> KilnResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration, apply environment overrides and validate it.
    ///
    /// This is the single startup entry point: no component is constructed
    /// from a config that has not passed through here.
    pub async fn load_validated(&self) -> KilnResult<Config> {
        let config = self.load_effective().await?;
        config.validate(&self.config_path)?;
        Ok(config)
    }

    /// Load configuration and apply environment overrides without validating
    pub async fn load_effective(&self) -> KilnResult<Config> {
        let mut config = self.load().await?;
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> KilnResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| KilnError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| KilnError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> KilnResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            KilnError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> KilnResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| KilnError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Overlay environment-provided values on top of file settings
fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup(env::STORAGE_API_KEY) {
        config.storage.api_key = Some(key);
    }
    if let Some(endpoint) = lookup(env::STORAGE_ENDPOINT) {
        config.storage.endpoint = Some(endpoint);
    }
    if let Some(bucket) = lookup(env::STORAGE_BUCKET) {
        config.storage.bucket = Some(bucket);
    }
    if let Some(url) = lookup(env::REGISTRY_URL) {
        config.registry.url = url;
    }
}
