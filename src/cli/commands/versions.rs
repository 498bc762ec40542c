//! Versions command - cached versions of one package

use crate::cli::args::{OutputFormat, VersionsArgs};
use crate::cli::commands::load_index;
use crate::config::Config;
use crate::error::KilnResult;
use crate::index::{IndexEntry, PackageSpec};
use crate::ui::{self, format_bytes, UiContext};
use console::style;

/// Execute the versions command
pub async fn execute(args: VersionsArgs, config: &Config) -> KilnResult<()> {
    let ctx = UiContext::detect();
    let index = load_index(config, &ctx).await;
    let name = PackageSpec::parse(&args.name).name;
    let versions = index.list_versions(&name);

    match args.format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "name": name,
                "count": versions.len(),
                "versions": versions,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Table if versions.is_empty() => {
            ui::step_info(&ctx, &format!("No cached versions of {}", name));
        }
        OutputFormat::Table => print_table(&versions),
    }

    Ok(())
}

fn print_table(versions: &[&IndexEntry]) {
    println!(
        "{:<16} {:<12} {:<18} {}",
        style("VERSION").bold(),
        style("SIZE").bold(),
        style("UPLOADED").bold(),
        style("URL").bold()
    );

    for entry in versions {
        let uploaded = entry
            .uploaded_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<12} {:<18} {}",
            entry.version,
            format_bytes(entry.size_bytes),
            uploaded,
            entry.url
        );
    }

    println!();
    println!("{} version(s)", versions.len());
}
