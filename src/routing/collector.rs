//! Route tree flattening.
//!
//! # Responsibilities
//! - Walk the tree depth-first in declared sibling order
//! - Thread base path, guard chain and middleware chain downwards
//! - Expand multi-verb routes into one entry per verb
//!
//! # Design Decisions
//! - No deduplication or collision detection; the HTTP layer decides what
//!   to do with two routes on the same (path, method)
//! - Ancestors' guards/middlewares always precede descendants'

use axum::http::Method;
use serde_json::Value;

use crate::tree::handler::{Guard, Handler, Middleware};
use crate::tree::node::{App, Node};
use crate::tree::path::join;

/// A concrete endpoint produced by collection.
#[derive(Debug, Clone)]
pub struct CollectedRoute {
    /// Normalized absolute path.
    pub path: String,
    pub method: Method,
    pub handler: Handler,
    /// Opaque validation descriptor for the HTTP layer.
    pub schema: Option<Value>,
    /// Outermost first.
    pub guards: Vec<Guard>,
    /// Outermost first.
    pub middlewares: Vec<Middleware>,
}

/// Collect routes below `node` with the given inherited state.
pub fn collect(
    node: Option<&Node>,
    base_path: &str,
    guards: &[Guard],
    middlewares: &[Middleware],
) -> Vec<CollectedRoute> {
    let Some(node) = node else {
        return Vec::new();
    };

    match node {
        Node::Empty => Vec::new(),
        Node::Route(route) => {
            let path = join(base_path, &route.path);
            let guards = concat(guards, &route.guards);
            let middlewares = concat(middlewares, &route.middlewares);

            route
                .methods
                .iter()
                .map(|method| CollectedRoute {
                    path: path.clone(),
                    method: method.clone(),
                    handler: route.handler.clone(),
                    schema: route.schema.clone(),
                    guards: guards.clone(),
                    middlewares: middlewares.clone(),
                })
                .collect()
        }
        Node::Controller(controller) => {
            let path = join(base_path, &controller.path);
            let guards = concat(guards, &controller.guards);
            let middlewares = concat(middlewares, &controller.middlewares);
            collect_children(&controller.children, &path, &guards, &middlewares)
        }
        Node::Middleware(wrapper) => {
            let middlewares = concat(middlewares, &wrapper.uses);
            collect_children(&wrapper.children, base_path, guards, &middlewares)
        }
        Node::Guard(wrapper) => {
            let guards = concat(guards, &wrapper.uses);
            collect_children(&wrapper.children, base_path, &guards, middlewares)
        }
        Node::Group(group) => {
            let rendered = group.render();
            tracing::trace!(group = %group.name(), kind = rendered.kind(), "Expanded route group");
            collect(Some(&rendered), base_path, guards, middlewares)
        }
        Node::Fragment(children) => collect_children(children, base_path, guards, middlewares),
    }
}

/// Collect every route of an application, in declaration order.
pub fn collect_routes(app: &App) -> Vec<CollectedRoute> {
    collect_children(&app.children, "", &[], &[])
}

fn collect_children(
    children: &[Node],
    base_path: &str,
    guards: &[Guard],
    middlewares: &[Middleware],
) -> Vec<CollectedRoute> {
    children
        .iter()
        .flat_map(|child| collect(Some(child), base_path, guards, middlewares))
        .collect()
}

fn concat<T: Clone>(inherited: &[T], own: &[T]) -> Vec<T> {
    inherited.iter().chain(own).cloned().collect()
}
