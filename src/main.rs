//! Kiln - versioned build-artifact cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use kiln::cli::{Cli, Commands};
use kiln::config::{Config, ConfigManager};
use kiln::error::KilnResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> KilnResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Config command must work on a broken or incomplete config file
    let command = match cli.command {
        Commands::Config(args) => {
            init_logging(cli.verbose, &Config::default().general.log_format);
            return kiln::cli::commands::config(args, &config_manager).await;
        }
        command => command,
    };

    // Config errors are reported before logging exists; they go through main's error path
    let config = config_manager.load_validated().await?;
    init_logging(cli.verbose, &config.general.log_format);
    debug!("Using config {}", config_manager.path().display());

    match command {
        Commands::Build(args) => kiln::cli::commands::build(args, &config).await,
        Commands::Serve(args) => kiln::cli::commands::serve(args, &config).await,
        Commands::Lookup(args) => kiln::cli::commands::lookup(args, &config).await,
        Commands::Versions(args) => kiln::cli::commands::versions(args, &config).await,
        Commands::Stats(args) => kiln::cli::commands::stats(args, &config).await,
        Commands::Config(args) => kiln::cli::commands::config(args, &config_manager).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` wins when set
fn init_logging(verbose: u8, log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("kiln=warn"),
        1 => EnvFilter::new("kiln=info"),
        _ => EnvFilter::new("kiln=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
