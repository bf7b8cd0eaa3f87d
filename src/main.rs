//! Declarative server (demo binary)
//!
//! Serves a small application declared as a route tree.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                  DECLARATIVE SERVER                  │
//!                  │                                                      │
//!   App tree ──────┼─▶ routing::collect ──▶ Vec<CollectedRoute>           │
//!                  │                              │                       │
//!                  │                              ▼                       │
//!   Request ───────┼─▶ http::server ──▶ http::dispatcher                  │
//!                  │                     guards → middlewares → handler   │
//!                  │                              │                       │
//!                  │                              ▼                       │
//!   Response ◀─────┼── reply ◀── descriptor / render (+ bundle for SPA)   │
//!                  │                                                      │
//!                  │  ┌────────────────────────────────────────────────┐  │
//!                  │  │ config · observability (logging, metrics)      │  │
//!                  │  └────────────────────────────────────────────────┘  │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use declarative_server::config::{load_config, validate_config, ServerConfig};
use declarative_server::descriptor::{ContextValue, MetaTag, PageDescriptor, ResponseDescriptor};
use declarative_server::observability::{logging, metrics};
use declarative_server::render::FnComponent;
use declarative_server::{App, Controller, Guard, Handler, HttpServer, Middleware, Node, Route, WithMiddleware};

#[derive(Parser, Debug)]
#[command(name = "declarative-server", version, about = "Serve a declarative route tree")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        if let Err(errors) = validate_config(&config) {
            for e in &errors {
                eprintln!("{e}");
            }
            return Err("invalid configuration".into());
        }
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("declarative-server v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = ?config.mode,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config, demo_app())?;
    let listener = TcpListener::bind(server.bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_app() -> App {
    let api_key = Guard::from_fn(|ctx| ctx.header("x-api-key") == Some("demo"));
    let powered_by = Middleware::tap(|ctx| {
        ctx.reply().header("x-powered-by", "declarative-server");
    });

    let greeting = FnComponent::new("Greeting", |props| {
        let name = props.get("name").and_then(|v| v.as_str()).unwrap_or("world");
        Ok(format!("<h1>Hello, {}!</h1>", declarative_server::render::escape_html(name)))
    });

    App::new().child(
        WithMiddleware::new(powered_by).children([
            Node::from(Route::get("/health", Handler::from_fn(|_| json!({ "status": "ok" })))),
            Node::from(
                Controller::new("/api")
                    .child(Route::get(
                        "/echo/:word",
                        Handler::from_fn(|_| {
                            ResponseDescriptor::json(ContextValue::from_iter([
                                ("word", ContextValue::param("word")),
                                ("at", ContextValue::from_context("requestTimestamp")),
                            ]))
                        }),
                    ))
                    .child(
                        Route::post("/items", Handler::from_fn(|ctx| ctx.body().clone()))
                            .guard(api_key)
                            .schema(json!({ "body": { "type": "object", "required": ["name"] } })),
                    ),
            ),
            Node::from(Route::get(
                "/",
                Handler::from_fn(move |_| {
                    PageDescriptor::new()
                        .content(greeting.clone().props(json!({ "name": "declarative-server" })))
                        .title("Declarative Server")
                        .meta_tag(MetaTag::name("description", "Demo page"))
                }),
            )),
        ]),
    )
}
