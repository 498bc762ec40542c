//! Serve command - run the query service

use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::error::KilnResult;
use crate::index::IndexStore;
use crate::server::{self, QueryService};
use std::sync::Arc;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> KilnResult<()> {
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let service = QueryService::load(IndexStore::new(config.index.path.clone())).await;
    server::serve(Arc::new(service), &bind).await
}
