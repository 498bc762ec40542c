//! Build command - resolve, bundle and store packages

use crate::build::orchestrator::dedupe;
use crate::build::{BuildOrchestrator, RunSummary};
use crate::cli::args::BuildArgs;
use crate::cli::commands::load_index;
use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::ui::{self, format_bytes, BuildProgress, UiContext};
use std::path::Path;
use tokio::fs;
use tracing::info;

/// Execute the build command
///
/// Individual package failures do not fail the command; they end up in
/// the summary and the failures file.
pub async fn execute(args: BuildArgs, config: &Config) -> KilnResult<()> {
    let ctx = UiContext::detect();

    let mut names = args.names;
    if let Some(ref path) = args.packages_file {
        names.extend(read_package_list(path).await?);
    }
    let names = dedupe(&names);

    if names.is_empty() {
        return Err(KilnError::User(
            "No packages to build. Pass names or --packages-file".to_string(),
        ));
    }

    let index = load_index(config, &ctx).await;
    info!("Loaded index with {} entries", index.len());

    let orchestrator = BuildOrchestrator::from_config(config, index)?;
    let progress = BuildProgress::new(&ctx, names.len());
    let summary = orchestrator
        .run(&names, |report| progress.on_report(report))
        .await;
    progress.finish();

    print_summary(&ctx, &summary?, config);
    Ok(())
}

async fn read_package_list(path: &Path) -> KilnResult<Vec<String>> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| KilnError::io(format!("reading {}", path.display()), e))?;
    parse_package_list(&content)
}

/// Parse a JSON array of names, or one name per line with `#` comments
fn parse_package_list(content: &str) -> KilnResult<Vec<String>> {
    if content.trim_start().starts_with('[') {
        let names: Vec<String> = serde_json::from_str(content)?;
        return Ok(names
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect());
    }

    Ok(content
        .lines()
        .filter_map(|line| line.split('#').next())
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn print_summary(ctx: &UiContext, summary: &RunSummary, config: &Config) {
    ui::section(ctx, "Summary");
    ui::key_value(ctx, "Processed", &summary.processed().to_string());
    ui::key_value(ctx, "Bundled", &summary.bundled.to_string());
    ui::key_value(ctx, "Skipped (builtin)", &summary.skipped_builtin.to_string());
    ui::key_value(ctx, "Skipped (cached)", &summary.skipped_cached.to_string());
    ui::key_value_status(ctx, "Failed", &summary.failed.to_string(), summary.failed == 0);
    ui::key_value(ctx, "Uploaded", &format_bytes(summary.total_bytes));

    if summary.failed > 0 {
        ui::remark(
            ctx,
            &format!(
                "Failure details: {}",
                config.build.failures_path.display()
            ),
        );
    }

    if let Some(ref reason) = summary.mirror_error {
        ui::step_warn_hint(
            ctx,
            &format!("Index snapshot was not mirrored to storage: {}", reason),
            "the local snapshot is intact",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_json_array() {
        let names = parse_package_list(r#"["axios", "@tanstack/react-query", " "]"#).unwrap();
        assert_eq!(names, vec!["axios", "@tanstack/react-query"]);
    }

    #[test]
    fn parses_lines_with_comments() {
        let content = "# top packages\naxios\n\nlodash  # utility\n  zod\n";
        let names = parse_package_list(content).unwrap();
        assert_eq!(names, vec!["axios", "lodash", "zod"]);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_package_list("[\"axios\", 3]").is_err());
    }

    #[tokio::test]
    async fn reads_package_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("packages.txt");
        tokio::fs::write(&path, "axios\ndayjs\n").await.unwrap();

        let names = read_package_list(&path).await.unwrap();
        assert_eq!(names, vec!["axios", "dayjs"]);
    }

    #[tokio::test]
    async fn missing_package_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = read_package_list(&dir.path().join("nope.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, KilnError::Io { .. }));
    }
}
