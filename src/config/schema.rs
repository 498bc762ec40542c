//! Configuration schema for Kiln
//!
//! Configuration is stored at `~/.config/kiln/config.toml`

use crate::error::{KilnError, KilnResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Index snapshot settings
    pub index: IndexConfig,

    /// Build pipeline settings
    pub build: BuildConfig,

    /// Package registry settings
    pub registry: RegistryConfig,

    /// Artifact storage settings
    pub storage: StorageConfig,

    /// Query service settings
    pub server: ServerConfig,
}

impl Config {
    /// Check that the configuration is complete enough to construct components.
    ///
    /// `path` is only used to attribute errors to the file they came from.
    pub fn validate(&self, path: &Path) -> KilnResult<()> {
        let invalid = |reason: &str| KilnError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if self.index.persist_every == 0 {
            return Err(invalid("index.persist_every must be at least 1"));
        }
        if self.build.concurrency == 0 {
            return Err(invalid("build.concurrency must be at least 1"));
        }
        if self.index.snapshot_id.trim().is_empty() {
            return Err(missing("index.snapshot_id"));
        }
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(invalid("general.log_format must be \"text\" or \"json\""));
        }

        match self.storage.backend {
            StorageBackend::Local => {}
            StorageBackend::Http => {
                if self.storage.endpoint.as_deref().is_none_or(str::is_empty) {
                    return Err(missing("storage.endpoint"));
                }
                if self.storage.bucket.as_deref().is_none_or(str::is_empty) {
                    return Err(missing("storage.bucket"));
                }
                if self.storage.api_key.as_deref().is_none_or(str::is_empty) {
                    return Err(missing("storage.api_key"));
                }
            }
        }

        Ok(())
    }
}

fn missing(field: &str) -> KilnError {
    KilnError::ConfigMissing {
        field: field.to_string(),
    }
}

/// Root directory for Kiln state (index snapshot, failures, journal)
pub fn state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kiln")
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append build outcomes to the journal
    pub journal: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: true,
        }
    }
}

/// Index snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Local snapshot file
    pub path: PathBuf,

    /// Persist the index after every N processed packages
    pub persist_every: usize,

    /// Fixed identifier of the snapshot mirror in artifact storage
    pub snapshot_id: String,

    /// File name of the snapshot mirror in artifact storage
    pub snapshot_file_name: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: state_dir().join("index.json"),
            persist_every: 10,
            snapshot_id: "kiln-index".to_string(),
            snapshot_file_name: "index.json".to_string(),
        }
    }
}

/// Build pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Packages processed in parallel
    pub concurrency: usize,

    /// Upper bound for version resolution, in seconds
    pub resolve_timeout_secs: u64,

    /// Upper bound for install + bundle, in seconds
    pub bundle_timeout_secs: u64,

    /// Parent directory of transient build directories
    pub work_dir: Option<PathBuf>,

    /// npm executable
    pub npm: String,

    /// esbuild executable
    pub esbuild: String,

    /// Module names provided by the host at runtime
    pub host_modules: Vec<String>,

    /// Module name prefixes provided by the host at runtime
    pub host_prefixes: Vec<String>,

    /// Recorded error messages are cut to this many characters
    pub error_max_chars: usize,

    /// Diagnostics file listing packages that did not reach commit
    pub failures_path: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            resolve_timeout_secs: 30,
            bundle_timeout_secs: 300,
            work_dir: None,
            npm: "npm".to_string(),
            esbuild: "esbuild".to_string(),
            host_modules: [
                "react",
                "react-dom",
                "react-native",
                "react/jsx-runtime",
                "react/jsx-dev-runtime",
                "expo",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            host_prefixes: ["@react-native/", "react-native/", "react-dom/", "expo-modules-"]
                .into_iter()
                .map(String::from)
                .collect(),
            error_max_chars: 500,
            failures_path: state_dir().join("failures.json"),
        }
    }
}

/// Package registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry base URL
    pub url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "https://registry.npmjs.org".to_string(),
        }
    }
}

/// Artifact storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Directory on the local filesystem
    #[default]
    Local,
    /// Remote REST object store
    Http,
}

/// Artifact storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend to use
    pub backend: StorageBackend,

    /// Root directory for the local backend
    pub local_dir: PathBuf,

    /// Public base URL for objects stored by the local backend;
    /// `file://` URLs are handed out when unset
    pub public_url: Option<String>,

    /// Object store endpoint (http backend)
    pub endpoint: Option<String>,

    /// Object store bucket (http backend)
    pub bucket: Option<String>,

    /// Object store API key (http backend)
    pub api_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_dir: state_dir().join("artifacts"),
            public_url: None,
            endpoint: None,
            bucket: None,
            api_key: None,
        }
    }
}

/// Query service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}
