//! Lookup command - one cached bundle from the local index

use crate::cli::args::LookupArgs;
use crate::cli::commands::load_index;
use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::index::PackageSpec;
use crate::ui::UiContext;

/// Execute the lookup command
pub async fn execute(args: LookupArgs, config: &Config) -> KilnResult<()> {
    let ctx = UiContext::detect();
    let index = load_index(config, &ctx).await;
    let spec = PackageSpec::parse(&args.spec);

    let entry = index
        .lookup(&spec)
        .ok_or_else(|| KilnError::EntryNotCached {
            spec: args.spec.clone(),
        })?;

    println!("{}", serde_json::to_string_pretty(entry)?);
    Ok(())
}
