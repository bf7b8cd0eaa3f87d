//! Renderable content units.
//!
//! A [`Component`] renders itself to an HTML fragment for server-side pages.
//! For SPA pages it is never rendered on the server; its `name` is looked
//! up in the component registry and its `props` become the initial state
//! handed to the browser bundle.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tower::BoxError;

/// Content placed inside a page's root element.
pub trait Component: Send + Sync {
    /// Identifier used to locate the component's source file.
    fn name(&self) -> &str;

    /// Props passed to the component.
    fn props(&self) -> Value {
        Value::Null
    }

    /// Render to an HTML fragment. Errors are shown inline by the page renderer.
    fn render_to_markup(&self) -> Result<String, BoxError>;
}

/// Pre-rendered HTML, inserted as-is.
#[derive(Debug, Clone)]
pub struct Markup(String);

impl Markup {
    pub fn new(html: impl Into<String>) -> Self {
        Self(html.into())
    }
}

impl Component for Markup {
    fn name(&self) -> &str {
        "Markup"
    }

    fn render_to_markup(&self) -> Result<String, BoxError> {
        Ok(self.0.clone())
    }
}

type RenderFn = dyn Fn(&Value) -> Result<String, BoxError> + Send + Sync;

/// Named component rendered by a function of its props.
#[derive(Clone)]
pub struct FnComponent {
    name: String,
    props: Value,
    render: Arc<RenderFn>,
}

impl FnComponent {
    pub fn new<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&Value) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            props: Value::Null,
            render: Arc::new(render),
        }
    }

    pub fn props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }
}

impl Component for FnComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn props(&self) -> Value {
        self.props.clone()
    }

    fn render_to_markup(&self) -> Result<String, BoxError> {
        (self.render)(&self.props)
    }
}

impl fmt::Debug for FnComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnComponent")
            .field("name", &self.name)
            .field("props", &self.props)
            .finish_non_exhaustive()
    }
}

/// Reference to a component that only exists as browser source.
#[derive(Debug, Clone)]
pub struct ClientComponent {
    name: String,
    props: Value,
}

impl ClientComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            props: Value::Null,
        }
    }

    pub fn props(mut self, props: Value) -> Self {
        self.props = props;
        self
    }
}

impl Component for ClientComponent {
    fn name(&self) -> &str {
        &self.name
    }

    fn props(&self) -> Value {
        self.props.clone()
    }

    fn render_to_markup(&self) -> Result<String, BoxError> {
        Err(format!("component `{}` can only be rendered in the browser", self.name).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fn_component_renders_props() {
        let greeting = FnComponent::new("Greeting", |props| {
            Ok(format!("<p>Hello {}</p>", props["name"].as_str().unwrap_or("?")))
        })
        .props(json!({"name": "Ada"}));

        assert_eq!(greeting.render_to_markup().unwrap(), "<p>Hello Ada</p>");
        assert_eq!(Component::props(&greeting), json!({"name": "Ada"}));
    }

    #[test]
    fn test_client_component_refuses_server_render() {
        let counter = ClientComponent::new("Counter").props(json!({"start": 1}));
        assert_eq!(counter.name(), "Counter");
        assert!(counter.render_to_markup().is_err());
    }
}
