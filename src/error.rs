//! Error types for Kiln
//!
//! All modules use `KilnResult<T>` as their return type.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Kiln operations
pub type KilnResult<T> = Result<T, KilnError>;

/// All errors that can occur in Kiln
#[derive(Error, Debug)]
pub enum KilnError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Missing required configuration: {field}")]
    ConfigMissing { field: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Resolution errors
    #[error("Failed to resolve version of {package}: {reason}")]
    Resolve { package: String, reason: String },

    #[error("Version resolution for {package} timed out after {secs}s")]
    ResolveTimeout { package: String, secs: u64 },

    // Build errors
    #[error("Dependency install failed for {package}: {stderr}")]
    Install { package: String, stderr: String },

    #[error("Entry point not found for {package}")]
    EntryNotFound { package: String },

    #[error("Bundling failed for {package}: {stderr}")]
    Bundle { package: String, stderr: String },

    #[error("Build of {package} timed out after {secs}s")]
    BuildTimeout { package: String, secs: u64 },

    // Upload errors
    #[error("Upload of {file_name} failed: {reason}")]
    Upload { file_name: String, reason: String },

    #[error("Delete of stored object {id} failed: {reason}")]
    StorageDelete { id: String, reason: String },

    // Index errors
    #[error("Index snapshot {path} is corrupt: {reason}")]
    IndexCorrupt { path: PathBuf, reason: String },

    #[error("{spec} is not cached")]
    EntryNotCached { spec: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

/// Pipeline stage a package failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Resolve,
    Build,
    Upload,
    Internal,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolve => "resolve",
            Self::Build => "build",
            Self::Upload => "upload",
            Self::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

impl KilnError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Classify the error into the pipeline stage it belongs to
    pub fn stage(&self) -> FailureStage {
        match self {
            Self::Resolve { .. } | Self::ResolveTimeout { .. } => FailureStage::Resolve,
            Self::Install { .. }
            | Self::EntryNotFound { .. }
            | Self::Bundle { .. }
            | Self::BuildTimeout { .. }
            | Self::CommandFailed { .. } => FailureStage::Build,
            Self::Upload { .. } | Self::StorageDelete { .. } | Self::Http(_) => {
                FailureStage::Upload
            }
            _ => FailureStage::Internal,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigMissing { field } if field == "storage.api_key" => {
                Some("Set KILN_STORAGE_API_KEY or storage.api_key in config.toml")
            }
            Self::ConfigMissing { .. } => Some("Run: kiln config path, then edit that file"),
            Self::EntryNotCached { .. } => Some("Run: kiln build <name> to cache it"),
            Self::IndexCorrupt { .. } => {
                Some("Re-run kiln build to repopulate the index from the package list")
            }
            _ => None,
        }
    }
}

/// Truncate an error message to at most `max_chars` characters
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    match message.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &message[..idx]),
        None => message.to_string(),
    }
}
