//! Index snapshot persistence
//!
//! The snapshot is a single JSON object keyed by bare name and
//! `name@version`. Writes go to a temp file first and are renamed into
//! place, so a crash mid-write leaves the previous snapshot intact.

use crate::error::{KilnError, KilnResult};
use crate::index::entry::IndexEntry;
use crate::index::manager::CacheIndex;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// How a load went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No snapshot on disk yet
    Missing,
    /// Snapshot read successfully
    Loaded { entries: usize },
    /// Snapshot unreadable; the index starts empty
    Recovered { reason: String },
}

/// Result of loading a snapshot. Loading never fails; corruption is reported here.
#[derive(Debug)]
pub struct IndexLoad {
    pub index: CacheIndex,
    pub status: LoadStatus,
}

impl IndexLoad {
    /// Corruption reason, if the index had to start from empty
    pub fn warning(&self) -> Option<&str> {
        match &self.status {
            LoadStatus::Recovered { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Reads and writes the index snapshot file
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot into a fresh index
    pub async fn load(&self) -> IndexLoad {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No index snapshot at {}", self.path.display());
                return IndexLoad {
                    index: CacheIndex::new(),
                    status: LoadStatus::Missing,
                };
            }
            Err(e) => return self.recovered(format!("read failed: {}", e)),
        };

        match decode(&content) {
            Ok(index) => {
                let entries = index.len();
                info!("Loaded {} index entries from {}", entries, self.path.display());
                IndexLoad {
                    index,
                    status: LoadStatus::Loaded { entries },
                }
            }
            Err(e) => self.recovered(e.to_string()),
        }
    }

    fn recovered(&self, reason: String) -> IndexLoad {
        let err = KilnError::IndexCorrupt {
            path: self.path.clone(),
            reason,
        };
        warn!("{}; starting from an empty index", err);
        IndexLoad {
            index: CacheIndex::new(),
            status: LoadStatus::Recovered {
                reason: err.to_string(),
            },
        }
    }

    /// Serialize and write the whole index
    pub async fn persist(&self, index: &CacheIndex) -> KilnResult<()> {
        let encoded = encode(index)?;
        self.write_encoded(&encoded).await
    }

    /// Write an already-encoded snapshot atomically
    pub async fn write_encoded(&self, encoded: &[u8]) -> KilnResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                KilnError::io(format!("creating index directory {}", parent.display()), e)
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, encoded)
            .await
            .map_err(|e| KilnError::io(format!("writing {}", temp_path.display()), e))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| KilnError::io(format!("replacing {}", self.path.display()), e))?;

        debug!("Persisted index to {}", self.path.display());
        Ok(())
    }
}

/// Serialize an index into snapshot bytes
pub fn encode(index: &CacheIndex) -> KilnResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&index.to_snapshot())?)
}

/// Parse snapshot bytes into an index
pub fn decode(bytes: &[u8]) -> KilnResult<CacheIndex> {
    let snapshot: BTreeMap<String, IndexEntry> = serde_json::from_slice(bytes)?;
    Ok(CacheIndex::from_snapshot(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::manager::tests::{entry, entry_at};
    use tempfile::TempDir;

    fn test_store(dir: &TempDir) -> IndexStore {
        IndexStore::new(dir.path().join("index.json"))
    }

    #[tokio::test]
    async fn missing_snapshot_starts_empty() {
        let dir = TempDir::new().unwrap();
        let load = test_store(&dir).load().await;

        assert_eq!(load.status, LoadStatus::Missing);
        assert!(load.index.is_empty());
        assert!(load.warning().is_none());
    }

    #[tokio::test]
    async fn persist_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let mut index = CacheIndex::new();
        index.commit(entry("axios", "1.6.0", 1234));
        index.commit(entry("@react-navigation/native", "7.1.0", 99));
        index.commit(entry_at("lodash", "4.17.21", 10, None));

        store.persist(&index).await.unwrap();
        let load = store.load().await;

        assert_eq!(load.status, LoadStatus::Loaded { entries: 6 });
        assert_eq!(load.index, index);
        assert!(!dir.path().join("index.json.tmp").exists());
    }

    #[tokio::test]
    async fn truncated_snapshot_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        std::fs::write(store.path(), br#"{"axios": {"name": "axi"#).unwrap();

        let load = store.load().await;

        assert!(load.index.is_empty());
        let warning = load.warning().unwrap();
        assert!(warning.contains("corrupt"));
    }

    #[tokio::test]
    async fn wrong_shape_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        std::fs::write(store.path(), b"[1, 2, 3]").unwrap();

        let load = store.load().await;
        assert!(matches!(load.status, LoadStatus::Recovered { .. }));
    }

    #[test]
    fn bare_keys_carry_latest_version() {
        let mut index = CacheIndex::new();
        index.commit(entry("axios", "1.6.0", 1));

        let json: serde_json::Value = serde_json::from_slice(&encode(&index).unwrap()).unwrap();
        assert_eq!(json["axios"]["latestVersion"], "1.6.0");
        assert!(json["axios@1.6.0"].get("latestVersion").is_none());
        assert_eq!(json["axios@1.6.0"]["size"], 1);
    }
}
