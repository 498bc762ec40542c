//! Query service: read-only HTTP API over a process-local index copy
//!
//! # Routes
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET | `/bundle/{name}[@{version}]` | Single lookup |
//! | POST | `/bundle/batch` | Batch lookup |
//! | GET | `/versions/{name}` | Versions of one package, newest first |
//! | GET | `/stats` | Aggregate stats |
//! | POST | `/reload` | Re-read the snapshot from disk |
//! | GET | `/health` | Liveness |
//!
//! Requests read the current index through an `ArcSwap`; `reload` builds
//! a complete new index and swaps the reference, so handlers never see a
//! half-loaded index. Writes by a build process elsewhere only become
//! visible after a reload.

mod handlers;

use crate::error::{KilnError, KilnResult};
use crate::index::{CacheIndex, IndexLoad, IndexStore, LoadStatus};
use arc_swap::ArcSwap;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared state of the query service
pub struct QueryService {
    index: ArcSwap<CacheIndex>,
    store: IndexStore,
}

impl QueryService {
    /// Load the snapshot and build the service. Corruption is logged, not fatal.
    pub async fn load(store: IndexStore) -> Self {
        let load = store.load().await;
        if let Some(reason) = load.warning() {
            warn!("Query service starting with an empty index: {}", reason);
        }
        Self::with_index(store, load.index)
    }

    /// Build the service around an already-loaded index
    pub fn with_index(store: IndexStore, index: CacheIndex) -> Self {
        Self {
            index: ArcSwap::from_pointee(index),
            store,
        }
    }

    /// The index as of now
    pub fn current(&self) -> Arc<CacheIndex> {
        self.index.load_full()
    }

    /// Replace the in-memory index with a fresh read of the snapshot
    pub async fn reload(&self) -> LoadStatus {
        let IndexLoad { index, status } = self.store.load().await;
        info!("Reloaded index: {} entries", index.len());
        self.index.store(Arc::new(index));
        status
    }
}

/// Build the router with permissive CORS
pub fn router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route(
            "/bundle/{*spec}",
            get(handlers::lookup).post(handlers::batch_lookup),
        )
        .route("/versions/{*name}", get(handlers::versions))
        .route("/stats", get(handlers::stats))
        .route("/reload", post(handlers::reload))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Serve until Ctrl-C
pub async fn serve(service: Arc<QueryService>, bind: &str) -> KilnResult<()> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| KilnError::io(format!("binding {}", bind), e))?;
    info!("Query service listening on {}", bind);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| KilnError::io("serving HTTP", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down query service");
}
