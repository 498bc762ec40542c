//! Version resolution against an npm-compatible registry

use crate::error::{KilnError, KilnResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Resolves a package name to its currently published version
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Return the current version string for `name`
    async fn resolve(&self, name: &str) -> KilnResult<String>;
}

/// Resolver that reads the `latest` dist-tag from the registry
pub struct NpmRegistryResolver {
    client: reqwest::Client,
    base_url: String,
}

impl NpmRegistryResolver {
    /// Create a resolver for the given registry base URL
    pub fn new(base_url: &str, timeout: Duration) -> KilnResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kiln/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn dist_tags_url(&self, name: &str) -> String {
        format!(
            "{}/-/package/{}/dist-tags",
            self.base_url,
            encode_package_name(name)
        )
    }
}

#[async_trait]
impl VersionResolver for NpmRegistryResolver {
    async fn resolve(&self, name: &str) -> KilnResult<String> {
        let url = self.dist_tags_url(name);
        debug!("Resolving {} via {}", name, url);

        let failed = |reason: String| KilnError::Resolve {
            package: name.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("registry returned {}", status)));
        }

        let tags: HashMap<String, String> =
            response.json().await.map_err(|e| failed(e.to_string()))?;

        tags.get("latest")
            .cloned()
            .ok_or_else(|| failed("no latest dist-tag".to_string()))
    }
}

/// Registry path segment for a package.
///
/// The whole name is percent-encoded as one segment; a leading scope `@`
/// stays literal.
fn encode_package_name(name: &str) -> String {
    match name.strip_prefix('@') {
        Some(scoped) => format!("@{}", urlencoding::encode(scoped)),
        None => urlencoding::encode(name).into_owned(),
    }
}
