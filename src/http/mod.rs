//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers, one endpoint per route)
//!     → request.rs (params, query, body)
//!     → schema.rs (coerce + validate, 400 on failure)
//!     → context.rs (RequestContext + Reply)
//!     → dispatcher.rs (guards → middlewares → handler → outcome)
//!     → reply.rs (status, headers, payload → Response)
//!     → Send to client
//!
//! /__bundles, /__props → assets.rs (cached client scripts)
//! ```

pub mod assets;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod reply;
pub mod request;
pub mod schema;
pub mod server;

pub use context::RequestContext;
pub use dispatcher::{Dispatcher, RouteEndpoint};
pub use error::DispatchError;
pub use reply::{Payload, Reply};
pub use schema::{RequestSchema, SchemaError};
pub use server::{serve, HttpServer, HttpServerBuilder, ServerError};
