//! Client asset endpoints.
//!
//! Serves `/__bundles/{hash}.js` and `/__props/{hash}.js` from the caches
//! the page renderer fills.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::bundle::{BundleCache, PropsCache, BUNDLE_PREFIX, PROPS_PREFIX};

const JAVASCRIPT: &str = "application/javascript; charset=utf-8";
const CACHE_DEVELOPMENT: &str = "no-cache";
const CACHE_PRODUCTION: &str = "public, max-age=31536000, immutable";

#[derive(Debug, Clone)]
struct AssetState {
    bundles: Arc<BundleCache>,
    props: Arc<PropsCache>,
    cache_control: &'static str,
}

/// Router for the bundle and props endpoints.
pub fn asset_router(bundles: Arc<BundleCache>, props: Arc<PropsCache>, development: bool) -> Router {
    let state = AssetState {
        bundles,
        props,
        cache_control: if development {
            CACHE_DEVELOPMENT
        } else {
            CACHE_PRODUCTION
        },
    };

    Router::new()
        .route(&format!("{BUNDLE_PREFIX}/{{file}}"), get(serve_bundle))
        .route(&format!("{PROPS_PREFIX}/{{file}}"), get(serve_props))
        .with_state(state)
}

/// True if `path` falls under one of the asset prefixes.
pub fn is_reserved(path: &str) -> bool {
    [BUNDLE_PREFIX, PROPS_PREFIX]
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
}

async fn serve_bundle(State(state): State<AssetState>, Path(file): Path<String>) -> Response {
    let hash = file.strip_suffix(".js").unwrap_or(&file);
    match state.bundles.get(hash) {
        Some(bundle) => javascript(bundle.code.to_string(), state.cache_control),
        None => not_found("Bundle not found"),
    }
}

async fn serve_props(State(state): State<AssetState>, Path(file): Path<String>) -> Response {
    let hash = file.strip_suffix(".js").unwrap_or(&file);
    match state.props.get(hash) {
        Some(script) => javascript(script.to_string(), state.cache_control),
        None => not_found("Props script not found"),
    }
}

fn javascript(code: String, cache_control: &'static str) -> Response {
    (
        [(header::CONTENT_TYPE, JAVASCRIPT), (header::CACHE_CONTROL, cache_control)],
        code,
    )
        .into_response()
}

fn not_found(message: &'static str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}
