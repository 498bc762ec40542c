//! Stats command - aggregate index statistics

use crate::cli::args::{OutputFormat, StatsArgs};
use crate::cli::commands::load_index;
use crate::config::Config;
use crate::error::KilnResult;
use crate::ui::{self, format_bytes, UiContext};

/// Execute the stats command
pub async fn execute(args: StatsArgs, config: &Config) -> KilnResult<()> {
    let ctx = UiContext::detect();
    let stats = load_index(config, &ctx).await.stats();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Table => {
            ui::section(&ctx, "Index");
            ui::key_value(&ctx, "Path", &config.index.path.display().to_string());
            ui::key_value(&ctx, "Packages", &stats.unique_packages.to_string());
            ui::key_value(&ctx, "Versions", &stats.total_versions.to_string());
            ui::key_value(&ctx, "Total size", &format_bytes(stats.total_size));
        }
    }

    Ok(())
}
