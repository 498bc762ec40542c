//! Bundler adapter
//!
//! Turns one `(name, version)` into a single minified, browser-runnable
//! module. Host-provided modules are never bundled: they are left as
//! external imports for whatever runs the artifact.

pub mod esbuild;

pub use esbuild::EsbuildBundler;

use crate::config::schema::BuildConfig;
use crate::error::KilnResult;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Produces bundled artifacts
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Build one self-contained artifact for exactly `name@version`
    async fn bundle(&self, name: &str, version: &str, host: &HostModules) -> KilnResult<Vec<u8>>;
}

/// Module names the artifact's consumer already provides
#[derive(Debug, Clone, Default)]
pub struct HostModules {
    exact: BTreeSet<String>,
    prefixes: Vec<String>,
}

impl HostModules {
    pub fn new<I, P>(exact: I, prefixes: P) -> Self
    where
        I: IntoIterator<Item = String>,
        P: IntoIterator<Item = String>,
    {
        Self {
            exact: exact.into_iter().collect(),
            prefixes: prefixes.into_iter().filter(|p| !p.is_empty()).collect(),
        }
    }

    pub fn from_config(config: &BuildConfig) -> Self {
        Self::new(
            config.host_modules.iter().cloned(),
            config.host_prefixes.iter().cloned(),
        )
    }

    /// Whether `name` is host-provided, by exact name or by prefix
    pub fn contains(&self, name: &str) -> bool {
        self.exact.contains(name) || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// `--external:` arguments for esbuild; prefixes become wildcards
    pub fn esbuild_externals(&self) -> Vec<String> {
        self.exact
            .iter()
            .map(|m| format!("--external:{}", m))
            .chain(self.prefixes.iter().map(|p| format!("--external:{}*", p)))
            .collect()
    }
}
