//! Filesystem-backed artifact store
//!
//! Objects live at `{root}/{id}/{file_name}`. URLs are built from a
//! configured public base URL (for a static file server in front of
//! `root`), or are `file://` URLs when none is set.

use crate::error::{KilnError, KilnResult};
use crate::storage::{ArtifactStore, StoredObject};
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

pub struct LocalArtifactStore {
    root: PathBuf,
    public_url: Option<String>,
}

impl LocalArtifactStore {
    pub fn new(root: PathBuf, public_url: Option<&str>) -> Self {
        Self {
            root,
            public_url: public_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn object_dir(&self, id: &str) -> KilnResult<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(KilnError::Upload {
                file_name: id.to_string(),
                reason: "invalid object id".to_string(),
            });
        }
        Ok(self.root.join(id))
    }

    fn url_for(&self, id: &str, file_name: &str, path: &std::path::Path) -> String {
        match &self.public_url {
            Some(base) => format!("{}/{}/{}", base, id, file_name),
            None => format!("file://{}", path.display()),
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn upload(&self, id: &str, file_name: &str, bytes: Vec<u8>) -> KilnResult<StoredObject> {
        let upload_failed = |e: io::Error| KilnError::Upload {
            file_name: file_name.to_string(),
            reason: e.to_string(),
        };

        if file_name.contains(['/', '\\']) {
            return Err(KilnError::Upload {
                file_name: file_name.to_string(),
                reason: "file name must not contain path separators".to_string(),
            });
        }

        let dir = self.object_dir(id)?;
        fs::create_dir_all(&dir).await.map_err(upload_failed)?;

        let path = dir.join(file_name);
        let size = bytes.len() as u64;
        fs::write(&path, bytes).await.map_err(upload_failed)?;

        debug!("Stored {} ({} bytes) at {}", file_name, size, path.display());
        Ok(StoredObject {
            id: id.to_string(),
            url: self.url_for(id, file_name, &path),
            size,
        })
    }

    async fn delete(&self, id: &str) -> KilnResult<()> {
        let dir = self.object_dir(id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KilnError::StorageDelete {
                id: id.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
