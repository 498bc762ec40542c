//! Build orchestrator
//!
//! Per package: host check, version resolution, skip-if-cached, bundle,
//! upload, commit. Resolution, bundling and upload run concurrently
//! across packages; every read and write of the index goes through one
//! lock, so `is_built` checks, claims and commits never race and
//! checkpoints see a consistent index.

use crate::build::journal::BuildJournal;
use crate::build::summary::{write_failures, Outcome, PackageReport, RunSummary, SkipReason};
use crate::bundler::{Bundler, EsbuildBundler, HostModules};
use crate::config::Config;
use crate::error::{truncate_message, KilnError, KilnResult};
use crate::index::{artifact_file_name, snapshot, ArtifactKey, CacheIndex, IndexEntry, IndexStore};
use crate::registry::{NpmRegistryResolver, VersionResolver};
use crate::storage::{create_store, ArtifactStore};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tunables for one orchestrator
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub concurrency: usize,
    pub resolve_timeout: Duration,
    pub bundle_timeout: Duration,
    pub persist_every: usize,
    pub error_max_chars: usize,
    pub snapshot_id: String,
    pub snapshot_file_name: String,
    pub failures_path: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.build.concurrency.max(1),
            resolve_timeout: Duration::from_secs(config.build.resolve_timeout_secs),
            bundle_timeout: Duration::from_secs(config.build.bundle_timeout_secs),
            persist_every: config.index.persist_every.max(1),
            error_max_chars: config.build.error_max_chars,
            snapshot_id: config.index.snapshot_id.clone(),
            snapshot_file_name: config.index.snapshot_file_name.clone(),
            failures_path: config.build.failures_path.clone(),
        }
    }
}

/// External collaborators used by the pipeline
pub struct Adapters {
    pub resolver: Box<dyn VersionResolver>,
    pub bundler: Box<dyn Bundler>,
    pub store: Box<dyn ArtifactStore>,
}

impl Adapters {
    /// Registry resolver, esbuild bundler and the configured store
    pub fn from_config(config: &Config) -> KilnResult<Self> {
        Ok(Self {
            resolver: Box::new(NpmRegistryResolver::new(
                &config.registry.url,
                Duration::from_secs(config.build.resolve_timeout_secs),
            )?),
            bundler: Box::new(EsbuildBundler::from_config(&config.build)),
            store: create_store(config)?,
        })
    }
}

/// Index plus the keys currently being built
struct IndexState {
    index: CacheIndex,
    in_flight: HashSet<ArtifactKey>,
}

/// Drives the build pipeline over a batch of package names
pub struct BuildOrchestrator {
    state: Mutex<IndexState>,
    index_store: IndexStore,
    adapters: Adapters,
    host: HostModules,
    settings: PipelineSettings,
    journal: BuildJournal,
}

impl BuildOrchestrator {
    pub fn new(
        index: CacheIndex,
        index_store: IndexStore,
        adapters: Adapters,
        host: HostModules,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            state: Mutex::new(IndexState {
                index,
                in_flight: HashSet::new(),
            }),
            index_store,
            adapters,
            host,
            settings,
            journal: BuildJournal::disabled(),
        }
    }

    /// Wire up every component from a validated config
    pub fn from_config(config: &Config, index: CacheIndex) -> KilnResult<Self> {
        let orchestrator = Self::new(
            index,
            IndexStore::new(config.index.path.clone()),
            Adapters::from_config(config)?,
            HostModules::from_config(&config.build),
            PipelineSettings::from_config(config),
        );
        Ok(orchestrator.with_journal(BuildJournal::new(config)))
    }

    pub fn with_journal(mut self, journal: BuildJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Copy of the current in-memory index
    pub async fn index(&self) -> CacheIndex {
        self.state.lock().await.index.clone()
    }

    /// Run the pipeline for every name, in order, without duplicates.
    ///
    /// `observe` is called once per package as it finishes. Package
    /// failures are recorded in the summary; only local persistence
    /// errors fail the run.
    pub async fn run<F>(&self, names: &[String], mut observe: F) -> KilnResult<RunSummary>
    where
        F: FnMut(&PackageReport),
    {
        let names = dedupe(names);
        info!(
            "Processing {} packages with concurrency {}",
            names.len(),
            self.settings.concurrency
        );

        let mut summary = RunSummary::default();
        let mut reports = stream::iter(names)
            .map(|name| self.process(name))
            .buffer_unordered(self.settings.concurrency);

        while let Some(report) = reports.next().await {
            summary.record(&report);
            self.journal.package(&report).await;
            observe(&report);

            if summary.processed() % self.settings.persist_every == 0 {
                if let Err(e) = self.checkpoint().await {
                    warn!("Periodic index checkpoint failed: {}", e);
                }
            }
        }

        self.checkpoint().await?;
        write_failures(&self.settings.failures_path, &summary.failures).await?;

        if let Err(e) = self.mirror_snapshot().await {
            warn!("Failed to mirror index snapshot: {}", e);
            summary.mirror_error = Some(e.to_string());
        }

        self.journal.finished(&summary).await;
        info!(
            "Run finished: {} bundled, {} cached, {} builtin, {} failed",
            summary.bundled, summary.skipped_cached, summary.skipped_builtin, summary.failed
        );
        Ok(summary)
    }

    async fn process(&self, name: String) -> PackageReport {
        let outcome = self.pipeline(&name).await;
        PackageReport { name, outcome }
    }

    async fn pipeline(&self, name: &str) -> Outcome {
        if self.host.contains(name) {
            debug!("Skipping host-provided module {}", name);
            return Outcome::Skipped {
                version: None,
                reason: SkipReason::Builtin,
            };
        }

        let version = match self.resolve(name).await {
            Ok(version) => version,
            Err(e) => return self.failed(name, None, e),
        };

        let key = ArtifactKey::new(name, &version);
        if !self.claim(&key).await {
            debug!("{} already built", key);
            return Outcome::Skipped {
                version: Some(version),
                reason: SkipReason::VersionExists,
            };
        }

        match self.build_and_upload(name, &version).await {
            Ok(entry) => {
                self.release(&key, Some(entry.clone())).await;
                info!("Bundled {} ({} bytes)", key, entry.size_bytes);
                Outcome::Bundled { entry }
            }
            Err(e) => {
                self.release(&key, None).await;
                self.failed(name, Some(version), e)
            }
        }
    }

    async fn resolve(&self, name: &str) -> KilnResult<String> {
        let limit = self.settings.resolve_timeout;
        match timeout(limit, self.adapters.resolver.resolve(name)).await {
            Ok(result) => result,
            Err(_) => Err(KilnError::ResolveTimeout {
                package: name.to_string(),
                secs: limit.as_secs(),
            }),
        }
    }

    /// Reserve a key for building; false if it is built or being built
    async fn claim(&self, key: &ArtifactKey) -> bool {
        let mut state = self.state.lock().await;
        if state.index.is_built(&key.name, &key.version) || state.in_flight.contains(key) {
            return false;
        }
        state.in_flight.insert(key.clone());
        true
    }

    /// Drop a claim, committing the entry if the build succeeded
    async fn release(&self, key: &ArtifactKey, entry: Option<IndexEntry>) {
        let mut state = self.state.lock().await;
        if let Some(entry) = entry {
            state.index.commit(entry);
        }
        state.in_flight.remove(key);
    }

    async fn build_and_upload(&self, name: &str, version: &str) -> KilnResult<IndexEntry> {
        let limit = self.settings.bundle_timeout;
        let bytes = match timeout(limit, self.adapters.bundler.bundle(name, version, &self.host)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(KilnError::BuildTimeout {
                    package: format!("{}@{}", name, version),
                    secs: limit.as_secs(),
                })
            }
        };

        let file_name = artifact_file_name(name, version);
        let storage_id = Uuid::new_v4().simple().to_string();
        let sha256 = hex::encode(Sha256::digest(&bytes));

        let stored = self
            .adapters
            .store
            .upload(&storage_id, &file_name, bytes)
            .await?;

        Ok(IndexEntry {
            name: name.to_string(),
            version: version.to_string(),
            storage_id: stored.id,
            file_name,
            url: stored.url,
            size_bytes: stored.size,
            uploaded_at: Some(Utc::now()),
            sha256: Some(sha256),
            latest_version: None,
        })
    }

    fn failed(&self, name: &str, version: Option<String>, error: KilnError) -> Outcome {
        warn!("{} failed: {}", name, error);
        Outcome::Failed {
            version,
            stage: error.stage(),
            error: truncate_message(&error.to_string(), self.settings.error_max_chars),
        }
    }

    /// Persist a point-in-time copy of the index to local disk
    pub async fn checkpoint(&self) -> KilnResult<()> {
        let encoded = {
            let state = self.state.lock().await;
            snapshot::encode(&state.index)?
        };
        self.index_store.write_encoded(&encoded).await
    }

    /// Push the current snapshot to artifact storage under its fixed id
    async fn mirror_snapshot(&self) -> KilnResult<()> {
        let encoded = {
            let state = self.state.lock().await;
            snapshot::encode(&state.index)?
        };
        let stored = self
            .adapters
            .store
            .replace(
                &self.settings.snapshot_id,
                &self.settings.snapshot_file_name,
                encoded,
            )
            .await?;
        info!("Mirrored index snapshot to {}", stored.url);
        Ok(())
    }
}

/// Trimmed, non-empty names in first-seen order
pub fn dedupe(names: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty() && seen.insert(n.to_string()))
        .map(String::from)
        .collect()
}
