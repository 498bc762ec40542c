//! CLI command implementations

pub mod build;
pub mod config;
pub mod lookup;
pub mod serve;
pub mod stats;
pub mod versions;

pub use build::execute as build;
pub use config::execute as config;
pub use lookup::execute as lookup;
pub use serve::execute as serve;
pub use stats::execute as stats;
pub use versions::execute as versions;

use crate::config::Config;
use crate::index::{CacheIndex, IndexStore};
use crate::ui::{self, UiContext};

/// Load the local index snapshot, surfacing a recovered load as a warning
pub(crate) async fn load_index(config: &Config, ctx: &UiContext) -> CacheIndex {
    let load = IndexStore::new(config.index.path.clone()).load().await;
    if let Some(reason) = load.warning() {
        ui::warn_hint_stderr(ctx, reason, "starting from an empty index");
    }
    load.index
}
