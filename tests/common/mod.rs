//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use declarative_server::bundle::{BundleError, BundleOptions, Bundler, ComponentRegistry};
use declarative_server::config::ServerConfig;
use declarative_server::{App, HttpServer};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceExt;

/// Config for tests: loopback, no component scan, no file watching.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.bundler.component_dirs.clear();
    config.bundler.watch = false;
    config
}

/// Router for `app` with the default collaborators.
pub fn router(app: App) -> Router {
    HttpServer::new(test_config(), app).unwrap().router()
}

/// Router for `app` using the given registry and bundler.
pub fn router_with(app: App, registry: Arc<ComponentRegistry>, bundler: Arc<dyn Bundler>) -> Router {
    HttpServer::builder(test_config())
        .registry(registry)
        .bundler(bundler)
        .build(app)
        .unwrap()
        .router()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Send one request through the router in-process.
pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub async fn get(router: Router, uri: &str) -> TestResponse {
    send(router, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(router: Router, uri: &str, body: &str) -> TestResponse {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

/// Serve `app` on an ephemeral port until the returned sender fires.
pub async fn spawn_server(app: App) -> (SocketAddr, oneshot::Sender<()>) {
    let server = HttpServer::new(test_config(), app).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        server
            .run_until(listener, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    (addr, tx)
}

/// Bundler that emits a marker script and counts builds.
#[derive(Debug, Default)]
pub struct CountingBundler {
    pub builds: AtomicUsize,
    pub delay: Option<Duration>,
}

impl CountingBundler {
    pub fn slow(delay: Duration) -> Self {
        Self {
            builds: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    pub fn count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl Bundler for CountingBundler {
    fn bundle<'a>(&'a self, entry: &'a Path, _options: &'a BundleOptions) -> BoxFuture<'a, Result<String, BundleError>> {
        async move {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let name = entry.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            Ok(format!("/* bundle {name} */"))
        }
        .boxed()
    }
}
