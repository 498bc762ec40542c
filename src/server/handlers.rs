//! HTTP handlers for the query service

use crate::index::{IndexEntry, LoadStatus, PackageSpec};
use crate::server::QueryService;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

type Service = State<Arc<QueryService>>;

/// Metadata returned for a cache hit
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CachedBundle<'a> {
    name: &'a str,
    version: &'a str,
    url: &'a str,
    storage_id: &'a str,
    file_name: &'a str,
    size: u64,
    uploaded_at: Option<DateTime<Utc>>,
    cached: bool,
}

impl<'a> From<&'a IndexEntry> for CachedBundle<'a> {
    fn from(entry: &'a IndexEntry) -> Self {
        Self {
            name: &entry.name,
            version: &entry.version,
            url: &entry.url,
            storage_id: &entry.storage_id,
            file_name: &entry.file_name,
            size: entry.size_bytes,
            uploaded_at: entry.uploaded_at,
            cached: true,
        }
    }
}

/// `GET /bundle/{name}` and `GET /bundle/{name}@{version}`
pub(super) async fn lookup(State(service): Service, Path(raw): Path<String>) -> Response {
    let spec = PackageSpec::parse(&raw);
    let index = service.current();

    match index.lookup(&spec) {
        Some(entry) => Json(CachedBundle::from(entry)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "name": spec.name,
                "version": spec.version,
                "cached": false,
                "error": "Bundle not cached",
            })),
        )
            .into_response(),
    }
}

/// `POST /bundle/batch` with `{"packages": [string]}`.
///
/// Shares the catch-all route with single lookups, so `GET /bundle/batch`
/// still finds a package named `batch`.
pub(super) async fn batch_lookup(
    State(service): Service,
    Path(spec): Path<String>,
    body: Bytes,
) -> Response {
    if spec != "batch" {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let keys = match parse_batch(&body) {
        Ok(keys) => keys,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
    };

    let index = service.current();
    let packages: IndexMap<String, Value> = index
        .batch_get(&keys)
        .into_iter()
        .map(|(key, entry)| {
            let value = match entry {
                Some(entry) => json!(CachedBundle::from(entry)),
                None => json!({ "cached": false }),
            };
            (key, value)
        })
        .collect();

    Json(json!({ "packages": packages })).into_response()
}

/// Validate the whole payload before looking anything up
fn parse_batch(body: &[u8]) -> Result<Vec<String>, String> {
    let payload: Value =
        serde_json::from_slice(body).map_err(|e| format!("body is not valid JSON: {}", e))?;

    let packages = payload
        .get("packages")
        .and_then(Value::as_array)
        .ok_or_else(|| "\"packages\" must be a list of strings".to_string())?;

    packages
        .iter()
        .map(|p| {
            p.as_str()
                .map(String::from)
                .ok_or_else(|| "\"packages\" must be a list of strings".to_string())
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionItem<'a> {
    version: &'a str,
    url: &'a str,
    size: u64,
    uploaded_at: Option<DateTime<Utc>>,
}

/// `GET /versions/{name}`
pub(super) async fn versions(State(service): Service, Path(name): Path<String>) -> Response {
    let name = PackageSpec::parse(&name).name;
    let index = service.current();

    let versions: Vec<VersionItem> = index
        .list_versions(&name)
        .into_iter()
        .map(|entry| VersionItem {
            version: &entry.version,
            url: &entry.url,
            size: entry.size_bytes,
            uploaded_at: entry.uploaded_at,
        })
        .collect();

    Json(json!({
        "name": name,
        "count": versions.len(),
        "versions": versions,
    }))
    .into_response()
}

/// `GET /stats`
pub(super) async fn stats(State(service): Service) -> Response {
    Json(service.current().stats()).into_response()
}

/// `POST /reload`
pub(super) async fn reload(State(service): Service) -> Response {
    let status = service.reload().await;
    let mut body = json!({
        "success": true,
        "entries": service.current().len(),
    });
    if let LoadStatus::Recovered { reason } = status {
        body["warning"] = Value::String(reason);
    }
    Json(body).into_response()
}

/// `GET /health`
pub(super) async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}
