//! Progress indicators with CI fallback

use super::context::UiContext;
use crate::build::{Outcome, PackageReport};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Progress bar over the packages of a build run.
///
/// Shows an indicatif bar in interactive mode and one plain line per
/// finished package in CI.
pub struct BuildProgress {
    bar: Option<ProgressBar>,
}

impl BuildProgress {
    pub fn new(ctx: &UiContext, total: usize) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new(total as u64);
            let bar_style = ProgressStyle::default_bar()
                .template("  {spinner:.cyan} Building  {bar:24.cyan/dim} {pos}/{len} {msg:.dim}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                .progress_chars("━╸─");
            bar.set_style(bar_style);
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Building {} package(s)...", total);
            None
        };
        Self { bar }
    }

    /// Advance by one finished package
    pub fn on_report(&self, report: &PackageReport) {
        let line = report_line(report);
        match self.bar {
            Some(ref bar) => {
                if matches!(report.outcome, Outcome::Failed { .. }) {
                    bar.println(format!("  {} {}", style("✗").red(), line));
                }
                bar.set_message(report.name.clone());
                bar.inc(1);
            }
            None => println!("  {}", line),
        }
    }

    /// Finish and clear the progress bar
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

/// One-line description of a package outcome
fn report_line(report: &PackageReport) -> String {
    match &report.outcome {
        Outcome::Bundled { entry } => format!(
            "[bundled] {}@{} ({})",
            report.name,
            entry.version,
            format_bytes(entry.size_bytes)
        ),
        Outcome::Skipped { version, reason } => match version {
            Some(v) => format!("[skipped] {}@{} ({})", report.name, v, reason),
            None => format!("[skipped] {} ({})", report.name, reason),
        },
        Outcome::Failed {
            version,
            stage,
            error,
        } => {
            let target = match version {
                Some(v) => format!("{}@{}", report.name, v),
                None => report.name.clone(),
            };
            format!("[failed] {} at {}: {}", target, stage, error)
        }
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::SkipReason;
    use crate::error::FailureStage;
    use crate::index::manager::tests::entry;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn report_lines_name_the_outcome() {
        let bundled = PackageReport {
            name: "axios".into(),
            outcome: Outcome::Bundled {
                entry: entry("axios", "1.6.0", 2048),
            },
        };
        assert_eq!(report_line(&bundled), "[bundled] axios@1.6.0 (2.0 KB)");

        let builtin = PackageReport {
            name: "react".into(),
            outcome: Outcome::Skipped {
                version: None,
                reason: SkipReason::Builtin,
            },
        };
        assert_eq!(report_line(&builtin), "[skipped] react (builtin)");

        let failed = PackageReport {
            name: "ghost".into(),
            outcome: Outcome::Failed {
                version: None,
                stage: FailureStage::Resolve,
                error: "not found".into(),
            },
        };
        assert_eq!(report_line(&failed), "[failed] ghost at resolve: not found");
    }

    #[test]
    fn build_progress_non_interactive() {
        let ctx = UiContext::non_interactive();
        let progress = BuildProgress::new(&ctx, 1);
        progress.on_report(&PackageReport {
            name: "react".into(),
            outcome: Outcome::Skipped {
                version: None,
                reason: SkipReason::Builtin,
            },
        });
        progress.finish();
        // Should not panic
    }
}
