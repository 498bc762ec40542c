//! Per-package outcomes and run statistics

use crate::error::{FailureStage, KilnError, KilnResult};
use crate::index::IndexEntry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs;

/// Why a package was not built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Host-provided module, never built
    Builtin,
    /// This exact version is already in the index
    VersionExists,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::VersionExists => write!(f, "version_exists"),
        }
    }
}

/// Result of running the pipeline for one package
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Bundled {
        entry: IndexEntry,
    },
    Skipped {
        version: Option<String>,
        reason: SkipReason,
    },
    Failed {
        version: Option<String>,
        stage: FailureStage,
        error: String,
    },
}

impl Outcome {
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Bundled { entry } => Some(&entry.version),
            Self::Skipped { version, .. } | Self::Failed { version, .. } => version.as_deref(),
        }
    }
}

/// A package name paired with its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct PackageReport {
    pub name: String,
    pub outcome: Outcome,
}

/// One line of the failures file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub name: String,
    pub version: Option<String>,
    pub stage: FailureStage,
    pub error: String,
}

/// Aggregate statistics for a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub bundled: usize,
    pub skipped_builtin: usize,
    pub skipped_cached: usize,
    pub failed: usize,
    /// Bytes of newly produced artifacts
    pub total_bytes: u64,
    pub failures: Vec<FailureRecord>,
    /// Set when the snapshot could not be mirrored to storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_error: Option<String>,
}

impl RunSummary {
    /// Fold one package outcome into the totals
    pub fn record(&mut self, report: &PackageReport) {
        match &report.outcome {
            Outcome::Bundled { entry } => {
                self.bundled += 1;
                self.total_bytes += entry.size_bytes;
            }
            Outcome::Skipped {
                reason: SkipReason::Builtin,
                ..
            } => self.skipped_builtin += 1,
            Outcome::Skipped {
                reason: SkipReason::VersionExists,
                ..
            } => self.skipped_cached += 1,
            Outcome::Failed {
                version,
                stage,
                error,
            } => {
                self.failed += 1;
                self.failures.push(FailureRecord {
                    name: report.name.clone(),
                    version: version.clone(),
                    stage: *stage,
                    error: error.clone(),
                });
            }
        }
    }

    pub fn processed(&self) -> usize {
        self.bundled + self.skipped_builtin + self.skipped_cached + self.failed
    }
}

/// Write the failures diagnostics file (a JSON array)
pub async fn write_failures(path: &Path, failures: &[FailureRecord]) -> KilnResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| KilnError::io(format!("creating {}", parent.display()), e))?;
    }

    let content = serde_json::to_string_pretty(failures)?;
    fs::write(path, content)
        .await
        .map_err(|e| KilnError::io(format!("writing failures to {}", path.display()), e))
}
