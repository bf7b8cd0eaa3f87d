//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! App tree (startup)
//!     → collector.rs (depth-first walk, accumulate path/guards/middlewares)
//!     → Vec<CollectedRoute> in declaration order
//!     → http::server registers one endpoint per entry
//! ```
//!
//! # Design Decisions
//! - Routes collected once at startup, immutable at runtime
//! - Deterministic: same tree always yields the same list
//! - Outermost-declared guard/middleware runs first

pub mod collector;

pub use collector::{collect, collect_routes, CollectedRoute};
