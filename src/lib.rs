//! Declarative HTTP server library.
//!
//! Applications are described as a tree of nodes (controllers, routes,
//! guard and middleware wrappers, groups). At startup the tree is
//! flattened into concrete endpoints; each request then runs its guards,
//! middlewares and handler, and the handler's outcome (a JSON value, a
//! response descriptor or a page descriptor) becomes the HTTP response.

// Application model
pub mod descriptor;
pub mod routing;
pub mod tree;

// Rendering
pub mod bundle;
pub mod render;

// Transport
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use config::ServerConfig;
pub use descriptor::{ContextValue, Outcome, PageDescriptor, ResponseDescriptor};
pub use http::{serve, DispatchError, HttpServer, RequestContext, ServerError};
pub use routing::{collect_routes, CollectedRoute};
pub use tree::{App, Controller, Group, Guard, Handler, Middleware, Node, Route, WithGuard, WithMiddleware};
