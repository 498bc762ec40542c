//! Artifact storage
//!
//! Stores artifact bytes under an identifier and hands back a URL clients
//! can fetch directly. Storage holds bytes only; identity and version
//! metadata live in the index.

pub mod http;
pub mod local;

pub use http::HttpArtifactStore;
pub use local::LocalArtifactStore;

use crate::config::{Config, StorageBackend};
use crate::error::{KilnError, KilnResult};
use async_trait::async_trait;
use tracing::debug;

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub id: String,
    pub url: String,
    pub size: u64,
}

/// Durable blob storage
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `id` with a human-readable file name
    async fn upload(&self, id: &str, file_name: &str, bytes: Vec<u8>) -> KilnResult<StoredObject>;

    /// Remove the object stored under `id`. Deleting a missing id succeeds.
    async fn delete(&self, id: &str) -> KilnResult<()>;

    /// Overwrite whatever is stored under a known `id`
    async fn replace(&self, id: &str, file_name: &str, bytes: Vec<u8>) -> KilnResult<StoredObject> {
        self.delete(id).await?;
        debug!("Replacing stored object {}", id);
        self.upload(id, file_name, bytes).await
    }
}

/// Create the store selected by configuration.
///
/// Expects a validated config; missing http settings are reported again
/// rather than assumed.
pub fn create_store(config: &Config) -> KilnResult<Box<dyn ArtifactStore>> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Local => Ok(Box::new(LocalArtifactStore::new(
            storage.local_dir.clone(),
            storage.public_url.as_deref(),
        ))),
        StorageBackend::Http => {
            let required = |value: &Option<String>, field: &str| {
                value.clone().ok_or_else(|| KilnError::ConfigMissing {
                    field: field.to_string(),
                })
            };
            Ok(Box::new(HttpArtifactStore::new(
                &required(&storage.endpoint, "storage.endpoint")?,
                &required(&storage.bucket, "storage.bucket")?,
                &required(&storage.api_key, "storage.api_key")?,
            )?))
        }
    }
}
