//! Declarative node kinds.
//!
//! Nodes carry configuration only. They are built once by the application
//! author, handed to the route collector at startup and never mutated.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use serde_json::Value;

use crate::tree::handler::{Guard, Handler, Middleware};

/// A node in the route tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// A single endpoint.
    Route(Route),
    /// Path prefix plus guards/middlewares shared by its children.
    Controller(Controller),
    /// Middlewares applied to every route below.
    Middleware(WithMiddleware),
    /// Guards applied to every route below.
    Guard(WithGuard),
    /// Reusable sub-tree materialized during collection.
    Group(Group),
    /// Transparent container.
    Fragment(Vec<Node>),
    /// Absent node; contributes nothing.
    Empty,
}

impl Node {
    /// Wrap a list of nodes in a transparent container.
    pub fn fragment<I>(children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        Node::Fragment(children.into_iter().map(Into::into).collect())
    }

    /// Short tag naming the node kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Route(_) => "Route",
            Node::Controller(_) => "Controller",
            Node::Middleware(_) => "Middleware",
            Node::Guard(_) => "Guard",
            Node::Group(_) => "Group",
            Node::Fragment(_) => "Fragment",
            Node::Empty => "Empty",
        }
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(node: Option<T>) -> Self {
        node.map(Into::into).unwrap_or(Node::Empty)
    }
}

/// One or more HTTP verbs declared on a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Methods(Vec<Method>);

impl Methods {
    pub fn iter(&self) -> impl Iterator<Item = &Method> {
        self.0.iter()
    }
}

impl From<Method> for Methods {
    fn from(method: Method) -> Self {
        Methods(vec![method])
    }
}

impl From<Vec<Method>> for Methods {
    fn from(methods: Vec<Method>) -> Self {
        Methods(methods)
    }
}

impl<const N: usize> From<[Method; N]> for Methods {
    fn from(methods: [Method; N]) -> Self {
        Methods(methods.into())
    }
}

/// An endpoint declaration.
#[derive(Debug, Clone)]
pub struct Route {
    pub(crate) path: String,
    pub(crate) methods: Methods,
    pub(crate) handler: Handler,
    pub(crate) schema: Option<Value>,
    pub(crate) guards: Vec<Guard>,
    pub(crate) middlewares: Vec<Middleware>,
}

impl Route {
    pub fn new(path: impl Into<String>, methods: impl Into<Methods>, handler: Handler) -> Self {
        Self {
            path: path.into(),
            methods: methods.into(),
            handler,
            schema: None,
            guards: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>, handler: Handler) -> Self {
        Self::new(path, Method::GET, handler)
    }

    pub fn post(path: impl Into<String>, handler: Handler) -> Self {
        Self::new(path, Method::POST, handler)
    }

    pub fn put(path: impl Into<String>, handler: Handler) -> Self {
        Self::new(path, Method::PUT, handler)
    }

    pub fn patch(path: impl Into<String>, handler: Handler) -> Self {
        Self::new(path, Method::PATCH, handler)
    }

    pub fn delete(path: impl Into<String>, handler: Handler) -> Self {
        Self::new(path, Method::DELETE, handler)
    }

    /// Attach a request schema. Passed through to the HTTP layer untouched.
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Append a guard; route guards run after every inherited guard.
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// Append a middleware; route middlewares run after every inherited one.
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Groups children under a path prefix.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    pub(crate) path: String,
    pub(crate) guards: Vec<Guard>,
    pub(crate) middlewares: Vec<Middleware>,
    pub(crate) children: Vec<Node>,
}

impl Controller {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

/// Applies middlewares to a sub-tree without changing its path.
#[derive(Debug, Clone)]
pub struct WithMiddleware {
    pub(crate) uses: Vec<Middleware>,
    pub(crate) children: Vec<Node>,
}

impl WithMiddleware {
    pub fn new(middleware: Middleware) -> Self {
        Self::all([middleware])
    }

    pub fn all(middlewares: impl IntoIterator<Item = Middleware>) -> Self {
        Self {
            uses: middlewares.into_iter().collect(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

/// Applies guards to a sub-tree without changing its path.
#[derive(Debug, Clone)]
pub struct WithGuard {
    pub(crate) uses: Vec<Guard>,
    pub(crate) children: Vec<Node>,
}

impl WithGuard {
    pub fn new(guard: Guard) -> Self {
        Self::all([guard])
    }

    pub fn all(guards: impl IntoIterator<Item = Guard>) -> Self {
        Self {
            uses: guards.into_iter().collect(),
            children: Vec::new(),
        }
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

type GroupFactory = dyn Fn(&Value) -> Node + Send + Sync;

/// A named, reusable sub-tree.
///
/// The factory is called with the group's props once, when routes are
/// collected.
#[derive(Clone)]
pub struct Group {
    pub(crate) name: String,
    pub(crate) props: Value,
    pub(crate) factory: Arc<GroupFactory>,
}

impl Group {
    pub fn new<F, N>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Value) -> N + Send + Sync + 'static,
        N: Into<Node>,
    {
        Self {
            name: name.into(),
            props: Value::Null,
            factory: Arc::new(move |props| factory(props).into()),
        }
    }

    pub fn props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn render(&self) -> Node {
        (self.factory)(&self.props)
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("props", &self.props)
            .finish_non_exhaustive()
    }
}

macro_rules! impl_into_node {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Node {
                fn from(value: $ty) -> Self {
                    Node::$variant(value)
                }
            }
        )*
    };
}

impl_into_node! {
    Route => Route,
    Controller => Controller,
    WithMiddleware => Middleware,
    WithGuard => Guard,
    Group => Group,
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::Fragment(children)
    }
}

/// Root of an application tree.
#[derive(Debug, Clone, Default)]
pub struct App {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) children: Vec<Node>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the configured listen host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Override the configured listen port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Apply the host/port overrides to a configured `host:port` address.
    pub fn bind_address(&self, configured: &str) -> String {
        let (host, port) = configured.rsplit_once(':').unwrap_or((configured, ""));
        let host = self.host.as_deref().unwrap_or(host);
        let port = self.port.map(|p| p.to_string()).unwrap_or_else(|| port.to_string());
        format!("{host}:{port}")
    }
}
