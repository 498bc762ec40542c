//! REST object-store backend
//!
//! | Operation | Request |
//! |-----------|---------|
//! | upload | `PUT {endpoint}/buckets/{bucket}/files/{id}?name={file_name}` |
//! | delete | `DELETE {endpoint}/buckets/{bucket}/files/{id}` |
//! | fetch URL | `{endpoint}/buckets/{bucket}/files/{id}/view` |
//!
//! All requests carry `Authorization: Bearer {api_key}`.

use crate::error::{KilnError, KilnResult};
use crate::storage::{ArtifactStore, StoredObject};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct HttpArtifactStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    api_key: String,
}

impl HttpArtifactStore {
    pub fn new(endpoint: &str, bucket: &str, api_key: &str) -> KilnResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("kiln/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn file_url(&self, id: &str) -> String {
        format!("{}/buckets/{}/files/{}", self.endpoint, self.bucket, id)
    }

    fn view_url(&self, id: &str) -> String {
        format!("{}/view", self.file_url(id))
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn upload(&self, id: &str, file_name: &str, bytes: Vec<u8>) -> KilnResult<StoredObject> {
        let upload_failed = |reason: String| KilnError::Upload {
            file_name: file_name.to_string(),
            reason,
        };

        let size = bytes.len() as u64;
        let response = self
            .client
            .put(self.file_url(id))
            .query(&[("name", file_name)])
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type(file_name))
            .body(bytes)
            .send()
            .await
            .map_err(|e| upload_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upload_failed(format!("{}: {}", status, body.trim())));
        }

        debug!("Uploaded {} ({} bytes) as {}", file_name, size, id);
        Ok(StoredObject {
            id: id.to_string(),
            url: self.view_url(id),
            size,
        })
    }

    async fn delete(&self, id: &str) -> KilnResult<()> {
        let response = self
            .client
            .delete(self.file_url(id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| KilnError::StorageDelete {
                id: id.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(KilnError::StorageDelete {
                id: id.to_string(),
                reason: status.to_string(),
            })
        }
    }
}

fn content_type(file_name: &str) -> &'static str {
    if file_name.ends_with(".json") {
        "application/json"
    } else if file_name.ends_with(".js") {
        "application/javascript"
    } else {
        "application/octet-stream"
    }
}
