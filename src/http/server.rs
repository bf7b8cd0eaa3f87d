//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Collect the app's routes and register one endpoint per (path, method)
//! - Translate declared `:param` / `*` paths to axum syntax
//! - Reject duplicate or conflicting registrations at construction
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Serve client bundles and props scripts
//! - Clear caches and stop the component watcher on shutdown

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter};
use axum::{Json, Router};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::bundle::{BundleCache, BundleOptions, Bundler, CommandBundler, ComponentRegistry, ComponentWatcher, PropsCache};
use crate::config::ServerConfig;
use crate::http::assets::{asset_router, is_reserved};
use crate::http::dispatcher::{Dispatcher, RouteEndpoint};
use crate::http::schema::{RequestSchema, SchemaError};
use crate::render::PageRenderer;
use crate::routing::{collect_routes, CollectedRoute};
use crate::tree::node::App;

/// Errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Duplicate route {method} {path}")]
    DuplicateRoute { method: Method, path: String },

    #[error("Route {path} conflicts with {existing}")]
    ConflictingRoute { path: String, existing: String },

    #[error("Route {path} uses a reserved asset prefix")]
    ReservedPath { path: String },

    #[error("Invalid route path {path}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Unsupported method {method} on {path}")]
    UnsupportedMethod { method: Method, path: String },

    #[error("Route {method} {path}: {source}")]
    InvalidSchema {
        method: Method,
        path: String,
        #[source]
        source: SchemaError,
    },

    #[error("Failed to start component watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Builder for [`HttpServer`] with optional collaborators.
pub struct HttpServerBuilder {
    config: ServerConfig,
    registry: Option<Arc<ComponentRegistry>>,
    bundler: Option<Arc<dyn Bundler>>,
}

impl HttpServerBuilder {
    /// Use a prepared component registry. Discovery still adds to it.
    pub fn registry(mut self, registry: Arc<ComponentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replace the command-line bundler.
    pub fn bundler(mut self, bundler: Arc<dyn Bundler>) -> Self {
        self.bundler = Some(bundler);
        self
    }

    pub fn build(self, app: App) -> Result<HttpServer, ServerError> {
        let config = self.config;
        let bundler_config = &config.bundler;

        let registry = self.registry.unwrap_or_default();
        if !bundler_config.component_dirs.is_empty() {
            let root = std::env::current_dir()?;
            let found = registry.discover(&root, &bundler_config.component_dirs, &bundler_config.component_exclude);
            tracing::debug!(root = %root.display(), found, "Component discovery finished");
        }

        let bundler: Arc<dyn Bundler> = match self.bundler {
            Some(bundler) => bundler,
            None => Arc::new(CommandBundler::new(bundler_config.program.clone(), bundler_config.args.clone())),
        };
        let options = BundleOptions {
            minify: bundler_config.minify(config.mode),
            sourcemap: bundler_config.sourcemap(config.mode),
        };
        let bundles = Arc::new(BundleCache::new(bundler, options, bundler_config.cache));
        let props = Arc::new(PropsCache::new(bundler_config.props_cache_capacity));

        let mut renderer = PageRenderer::new(registry, Arc::clone(&bundles), Arc::clone(&props));
        if config.is_development() && bundler_config.watch {
            renderer = renderer.with_watcher(Arc::new(ComponentWatcher::new(Arc::clone(&bundles))?));
        }
        let renderer = Arc::new(renderer);

        let routes = collect_routes(&app);
        let router = build_router(&config, &routes, &renderer)?;
        let bind_address = app.bind_address(&config.listener.bind_address);

        tracing::info!(routes = routes.len(), mode = ?config.mode, "Routes registered");

        Ok(HttpServer {
            router,
            config,
            bind_address,
            renderer,
        })
    }
}

/// HTTP server for a declarative application.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    bind_address: String,
    renderer: Arc<PageRenderer>,
}

impl HttpServer {
    pub fn builder(config: ServerConfig) -> HttpServerBuilder {
        HttpServerBuilder {
            config,
            registry: None,
            bundler: None,
        }
    }

    /// Create a server with the default collaborators.
    pub fn new(config: ServerConfig, app: App) -> Result<Self, ServerError> {
        Self::builder(config).build(app)
    }

    /// The assembled axum router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Address to bind: the configured one with the app's overrides.
    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn renderer(&self) -> &Arc<PageRenderer> {
        &self.renderer
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_until(listener, shutdown_signal()).await
    }

    /// Run the server until `signal` completes.
    pub async fn run_until<F>(self, listener: TcpListener, signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.clone().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app).with_graceful_shutdown(signal).await?;

        self.shutdown();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn shutdown(&self) {
        self.renderer.bundles().clear();
        self.renderer.props().clear();
        if let Some(watcher) = self.renderer.watcher() {
            watcher.stop();
        }
    }
}

/// Build a server for `app` and serve it on its bind address.
pub async fn serve(app: App, config: ServerConfig) -> Result<(), ServerError> {
    let server = HttpServer::new(config, app)?;
    let listener = TcpListener::bind(server.bind_address()).await?;
    server.run(listener).await?;
    Ok(())
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
fn build_router(
    config: &ServerConfig,
    routes: &[CollectedRoute],
    renderer: &Arc<PageRenderer>,
) -> Result<Router, ServerError> {
    let body_limit = config.limits.body_bytes;

    // Axum path → endpoints, in first-registration order.
    let mut grouped: Vec<(String, Vec<(MethodFilter, Arc<RouteEndpoint>)>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut shapes: HashMap<String, String> = HashMap::new();
    let mut seen: HashSet<(String, Method)> = HashSet::new();

    for route in routes {
        if is_reserved(&route.path) {
            return Err(ServerError::ReservedPath {
                path: route.path.clone(),
            });
        }

        validate_path(&route.path).map_err(|reason| ServerError::InvalidPath {
            path: route.path.clone(),
            reason,
        })?;

        let axum_path = translate_path(&route.path);
        if !seen.insert((axum_path.clone(), route.method.clone())) {
            return Err(ServerError::DuplicateRoute {
                method: route.method.clone(),
                path: route.path.clone(),
            });
        }
        match shapes.get(&path_shape(&axum_path)) {
            Some(existing) if *existing != axum_path => {
                return Err(ServerError::ConflictingRoute {
                    path: route.path.clone(),
                    existing: existing.clone(),
                });
            }
            Some(_) => {}
            None => {
                shapes.insert(path_shape(&axum_path), axum_path.clone());
            }
        }

        let filter = MethodFilter::try_from(route.method.clone()).map_err(|_| ServerError::UnsupportedMethod {
            method: route.method.clone(),
            path: route.path.clone(),
        })?;

        let schema = match &route.schema {
            Some(schema) => RequestSchema::compile(schema).map_err(|source| ServerError::InvalidSchema {
                method: route.method.clone(),
                path: route.path.clone(),
                source,
            })?,
            None => None,
        };

        let endpoint = Arc::new(RouteEndpoint::new(
            Dispatcher::new(route, Arc::clone(renderer)),
            schema,
            body_limit,
        ));

        tracing::info!(
            method = %route.method,
            path = %route.path,
            guards = route.guards.len(),
            middlewares = route.middlewares.len(),
            "Registered route"
        );

        let slot = *index.entry(axum_path.clone()).or_insert_with(|| {
            grouped.push((axum_path, Vec::new()));
            grouped.len() - 1
        });
        grouped[slot].1.push((filter, endpoint));
    }

    let mut router = Router::new();
    for (path, endpoints) in grouped {
        let method_router = endpoints
            .into_iter()
            .fold(MethodRouter::new(), |method_router, (filter, endpoint)| {
                method_router.on(filter, move |request: Request| async move { endpoint.handle(request).await })
            })
            .fallback(not_found);
        router = router.route(&path, method_router);
    }

    let development = config.is_development();
    Ok(router
        .merge(asset_router(
            Arc::clone(renderer.bundles()),
            Arc::clone(renderer.props()),
            development,
        ))
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
}

/// Translate `:name` and `*`/`*name` segments to axum's `{name}` / `{*name}`.
pub fn translate_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{name}}}")
            } else if segment == "*" {
                "{*wildcard}".to_string()
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{name}}}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject paths the matcher cannot register.
fn validate_path(path: &str) -> Result<(), &'static str> {
    if path.contains(['{', '}']) {
        return Err("braces are not allowed in route paths");
    }
    let segments: Vec<&str> = path.split('/').collect();
    let mut names = HashSet::new();
    for (i, segment) in segments.iter().enumerate() {
        let name = if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err("parameter name is empty");
            }
            name
        } else if let Some(name) = segment.strip_prefix('*') {
            if i + 1 != segments.len() {
                return Err("wildcard must be the last segment");
            }
            if name.is_empty() { "wildcard" } else { name }
        } else {
            continue;
        };
        if !names.insert(name) {
            return Err("parameter name is repeated");
        }
    }
    Ok(())
}

/// Path with parameter names erased; equal shapes collide in the matcher.
fn path_shape(axum_path: &str) -> String {
    axum_path
        .split('/')
        .map(|segment| {
            if segment.starts_with("{*") {
                "{*}"
            } else if segment.starts_with('{') {
                "{}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

async fn not_found(method: Method, uri: Uri) -> Response {
    tracing::debug!(method = %method, path = %uri.path(), "No route matched");
    (
        axum::http::StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("Route {} {} not found", method, uri.path()),
        })),
    )
        .into_response()
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
