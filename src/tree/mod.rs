//! Declarative route tree.
//!
//! # Data Flow
//! ```text
//! App
//!   → Controller / WithGuard / WithMiddleware / Group / Fragment
//!       → Route (path, verbs, handler, schema, guards, middlewares)
//!   → routing::collect (flatten at startup)
//! ```
//!
//! # Design Decisions
//! - Node kinds are an explicit enum; no reflection on callables
//! - Nodes are data only; behavior lives in the collector and dispatcher
//! - Reusable sub-trees are `Group` nodes whose factory runs at collection

pub mod handler;
pub mod node;
pub mod path;

pub use handler::{Guard, Handler, Middleware, Next};
pub use node::{App, Controller, Group, Methods, Node, Route, WithGuard, WithMiddleware};
pub use path::{join, join_paths};
