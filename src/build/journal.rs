//! Build journal
//!
//! Appends one JSON line per package outcome to `~/.local/state/kiln/journal.log`,
//! so a long run can be inspected after the fact.

use crate::build::summary::{Outcome, PackageReport, RunSummary};
use crate::config::{Config, ConfigManager};
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File-based journal that appends JSON lines
pub struct BuildJournal {
    enabled: bool,
    path: PathBuf,
}

impl BuildJournal {
    /// Create a journal from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.journal,
            path: ConfigManager::journal_path(),
        }
    }

    /// A journal that records nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
        }
    }

    /// Record a package outcome
    pub async fn package(&self, report: &PackageReport) {
        let (event, data) = match &report.outcome {
            Outcome::Bundled { entry } => (
                "package.bundled",
                serde_json::json!({
                    "name": report.name,
                    "version": entry.version,
                    "storageId": entry.storage_id,
                    "size": entry.size_bytes,
                }),
            ),
            Outcome::Skipped { version, reason } => (
                "package.skipped",
                serde_json::json!({
                    "name": report.name,
                    "version": version,
                    "reason": reason,
                }),
            ),
            Outcome::Failed {
                version,
                stage,
                error,
            } => (
                "package.failed",
                serde_json::json!({
                    "name": report.name,
                    "version": version,
                    "stage": stage,
                    "error": error,
                }),
            ),
        };
        self.log(event, &data).await;
    }

    /// Record the end of a run
    pub async fn finished(&self, summary: &RunSummary) {
        let data = serde_json::json!({
            "bundled": summary.bundled,
            "skippedBuiltin": summary.skipped_builtin,
            "skippedCached": summary.skipped_cached,
            "failed": summary.failed,
            "totalBytes": summary.total_bytes,
        });
        self.log("run.finished", &data).await;
    }

    /// Log an event as a JSON line
    ///
    /// IO failures are logged and dropped; the journal never fails a build.
    async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write build journal: {}", e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::summary::SkipReason;
    use crate::error::FailureStage;
    use tempfile::TempDir;

    fn test_journal(dir: &TempDir, enabled: bool) -> BuildJournal {
        BuildJournal {
            enabled,
            path: dir.path().join("journal.log"),
        }
    }

    #[tokio::test]
    async fn writes_json_line() {
        let dir = TempDir::new().unwrap();
        let journal = test_journal(&dir, true);

        journal
            .package(&PackageReport {
                name: "ghost-pkg".into(),
                outcome: Outcome::Failed {
                    version: None,
                    stage: FailureStage::Resolve,
                    error: "not found".into(),
                },
            })
            .await;

        let content = tokio::fs::read_to_string(&journal.path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();

        assert_eq!(parsed["event"], "package.failed");
        assert_eq!(parsed["data"]["name"], "ghost-pkg");
        assert_eq!(parsed["data"]["stage"], "resolve");
        assert!(parsed["timestamp"].is_string());
    }

    #[tokio::test]
    async fn appends_multiple_lines() {
        let dir = TempDir::new().unwrap();
        let journal = test_journal(&dir, true);

        journal
            .package(&PackageReport {
                name: "react".into(),
                outcome: Outcome::Skipped {
                    version: None,
                    reason: SkipReason::Builtin,
                },
            })
            .await;
        journal.finished(&RunSummary::default()).await;

        let content = tokio::fs::read_to_string(&journal.path).await.unwrap();
        let lines: Vec<&str> = content.trim().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"builtin\""));
        assert!(lines[1].contains("run.finished"));
    }

    #[tokio::test]
    async fn skips_when_disabled() {
        let dir = TempDir::new().unwrap();
        let journal = test_journal(&dir, false);

        journal.finished(&RunSummary::default()).await;

        assert!(!journal.path.exists());
    }
}
