//! Page descriptor.
//!
//! Every field except the content and the `spa` flag may be a literal or a
//! function of the request; all of them are resolved before rendering.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::response::{invalid, resolve_field};
use crate::descriptor::value::{to_status, to_string_pairs, to_text, ContextValue};
use crate::http::context::RequestContext;
use crate::http::error::DispatchError;
use crate::render::component::Component;

pub const DEFAULT_TITLE: &str = "App";
pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_DOCTYPE: &str = "<!DOCTYPE html>";
pub const DEFAULT_ROOT_ID: &str = "root";

/// `<meta>` entry. `property` takes precedence over `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub content: String,
}

impl MetaTag {
    pub fn name(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            property: None,
            content: content.into(),
        }
    }

    pub fn property(property: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: None,
            property: Some(property.into()),
            content: content.into(),
        }
    }
}

/// `<script>` entry, external (`src`) or inline (`content`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default)]
    pub defer: bool,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ScriptTag {
    pub fn src(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            ..Self::default()
        }
    }

    pub fn inline(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn module(mut self) -> Self {
        self.kind = Some("module".to_string());
        self
    }

    pub fn defer(mut self) -> Self {
        self.defer = true;
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }
}

macro_rules! serde_context_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ContextValue {
                fn from(value: $ty) -> Self {
                    ContextValue::Static(serde_json::to_value(value).unwrap_or_default())
                }
            }
        )*
    };
}

serde_context_value!(MetaTag, ScriptTag);

/// Declarative instruction for rendering a full HTML document.
#[derive(Clone, Default)]
pub struct PageDescriptor {
    content: Option<Arc<dyn Component>>,
    spa: bool,
    title: Option<ContextValue>,
    meta: Option<ContextValue>,
    links: Option<ContextValue>,
    scripts: Option<ContextValue>,
    styles: Option<ContextValue>,
    status: Option<ContextValue>,
    headers: Option<ContextValue>,
    lang: Option<ContextValue>,
    doctype: Option<ContextValue>,
    html_attributes: Option<ContextValue>,
    body_attributes: Option<ContextValue>,
    root_id: Option<ContextValue>,
}

/// A [`PageDescriptor`] with every field resolved and defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPage {
    pub title: String,
    pub meta: Vec<MetaTag>,
    pub links: Vec<Vec<(String, String)>>,
    pub scripts: Vec<ScriptTag>,
    pub styles: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub lang: String,
    pub doctype: String,
    pub html_attributes: Vec<(String, String)>,
    pub body_attributes: Vec<(String, String)>,
    pub root_id: String,
}

impl PageDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content rendered into the root element.
    pub fn content(mut self, component: impl Component + 'static) -> Self {
        self.content = Some(Arc::new(component));
        self
    }

    pub fn shared_content(mut self, component: Arc<dyn Component>) -> Self {
        self.content = Some(component);
        self
    }

    /// Render the content in the browser instead of on the server.
    pub fn spa(mut self, spa: bool) -> Self {
        self.spa = spa;
        self
    }

    pub fn title(mut self, title: impl Into<ContextValue>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn meta(mut self, meta: impl Into<ContextValue>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    pub fn meta_tag(mut self, tag: impl Into<ContextValue>) -> Self {
        self.meta.get_or_insert_with(|| ContextValue::List(Vec::new())).push(tag.into());
        self
    }

    pub fn links(mut self, links: impl Into<ContextValue>) -> Self {
        self.links = Some(links.into());
        self
    }

    /// Add a `<link>` from attribute pairs.
    pub fn link<I, K, V>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ContextValue>,
    {
        let link = attributes.into_iter().map(|(k, v)| (k, v.into())).collect();
        self.links.get_or_insert_with(|| ContextValue::List(Vec::new())).push(link);
        self
    }

    pub fn scripts(mut self, scripts: impl Into<ContextValue>) -> Self {
        self.scripts = Some(scripts.into());
        self
    }

    pub fn script(mut self, script: impl Into<ContextValue>) -> Self {
        self.scripts.get_or_insert_with(|| ContextValue::List(Vec::new())).push(script.into());
        self
    }

    /// Inline CSS placed in a `<style>` block.
    pub fn styles(mut self, styles: impl Into<ContextValue>) -> Self {
        self.styles = Some(styles.into());
        self
    }

    pub fn status(mut self, status: impl Into<ContextValue>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.headers
            .get_or_insert_with(|| ContextValue::Map(Vec::new()))
            .insert(name, value.into());
        self
    }

    pub fn headers(mut self, headers: impl Into<ContextValue>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    pub fn lang(mut self, lang: impl Into<ContextValue>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub fn doctype(mut self, doctype: impl Into<ContextValue>) -> Self {
        self.doctype = Some(doctype.into());
        self
    }

    pub fn html_attribute(mut self, name: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.html_attributes
            .get_or_insert_with(|| ContextValue::Map(Vec::new()))
            .insert(name, value.into());
        self
    }

    pub fn body_attribute(mut self, name: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.body_attributes
            .get_or_insert_with(|| ContextValue::Map(Vec::new()))
            .insert(name, value.into());
        self
    }

    /// Id of the element the content is rendered into.
    pub fn root_id(mut self, root_id: impl Into<ContextValue>) -> Self {
        self.root_id = Some(root_id.into());
        self
    }

    pub fn is_spa(&self) -> bool {
        self.spa
    }

    pub fn component(&self) -> Option<&Arc<dyn Component>> {
        self.content.as_ref()
    }

    /// Resolve every field against the request.
    pub fn resolve(&self, ctx: &RequestContext) -> Result<ResolvedPage, DispatchError> {
        let text = |field, value: Option<&ContextValue>, default: &str| -> Result<String, DispatchError> {
            match resolve_field(field, value, ctx)? {
                Value::Null => Ok(default.to_string()),
                other => to_text(field, &other).map_err(invalid(field)),
            }
        };
        let pairs = |field, value: Option<&ContextValue>| -> Result<Vec<(String, String)>, DispatchError> {
            to_string_pairs(field, &resolve_field(field, value, ctx)?).map_err(invalid(field))
        };

        let links = match resolve_field("links", self.links.as_ref(), ctx)? {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .map(|item| to_string_pairs("links", item).map_err(invalid("links")))
                .collect::<Result<_, _>>()?,
            other => return Err(invalid("links")(format!("links must be an array, got {other}"))),
        };

        Ok(ResolvedPage {
            title: text("title", self.title.as_ref(), DEFAULT_TITLE)?,
            meta: list("meta", resolve_field("meta", self.meta.as_ref(), ctx)?)?,
            links,
            scripts: list("scripts", resolve_field("scripts", self.scripts.as_ref(), ctx)?)?,
            styles: text("styles", self.styles.as_ref(), "")?,
            status: to_status("status", &resolve_field("status", self.status.as_ref(), ctx)?)
                .map_err(invalid("status"))?
                .unwrap_or(200),
            headers: pairs("headers", self.headers.as_ref())?,
            lang: text("lang", self.lang.as_ref(), DEFAULT_LANG)?,
            doctype: text("doctype", self.doctype.as_ref(), DEFAULT_DOCTYPE)?,
            html_attributes: pairs("htmlAttributes", self.html_attributes.as_ref())?,
            body_attributes: pairs("bodyAttributes", self.body_attributes.as_ref())?,
            root_id: text("rootId", self.root_id.as_ref(), DEFAULT_ROOT_ID)?,
        })
    }
}

fn list<T: serde::de::DeserializeOwned>(field: &'static str, value: Value) -> Result<Vec<T>, DispatchError> {
    match value {
        Value::Null => Ok(Vec::new()),
        value => serde_json::from_value(value).map_err(|e| invalid(field)(e.to_string())),
    }
}

impl fmt::Debug for PageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageDescriptor")
            .field("content", &self.content.as_ref().map(|c| c.name().to_string()))
            .field("spa", &self.spa)
            .field("title", &self.title)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext::builder(Method::GET, "/posts/hello").param("slug", "hello").build()
    }

    #[test]
    fn test_defaults() {
        let page = PageDescriptor::new().resolve(&ctx()).unwrap();
        assert_eq!(page.title, "App");
        assert_eq!(page.lang, "en");
        assert_eq!(page.doctype, "<!DOCTYPE html>");
        assert_eq!(page.root_id, "root");
        assert_eq!(page.status, 200);
        assert!(page.meta.is_empty() && page.scripts.is_empty() && page.links.is_empty());
    }

    #[test]
    fn test_context_fields_resolved() {
        let page = PageDescriptor::new()
            .title(ContextValue::computed(|ctx| format!("Post {}", ctx.param("slug").unwrap_or(""))))
            .meta_tag(MetaTag::name("description", "A post"))
            .meta_tag(ContextValue::computed(|ctx| {
                json!({"property": "og:url", "content": ctx.path()})
            }))
            .link([("rel", "stylesheet"), ("href", "/app.css")])
            .script(ScriptTag::src("/app.js").defer())
            .status(ContextValue::computed(|_| 202))
            .header("x-page", "post")
            .body_attribute("class", "dark")
            .resolve(&ctx())
            .unwrap();

        assert_eq!(page.title, "Post hello");
        assert_eq!(page.meta[0], MetaTag::name("description", "A post"));
        assert_eq!(page.meta[1], MetaTag::property("og:url", "/posts/hello"));
        assert_eq!(
            page.links,
            vec![vec![
                ("rel".to_string(), "stylesheet".to_string()),
                ("href".to_string(), "/app.css".to_string()),
            ]]
        );
        assert_eq!(page.scripts, vec![ScriptTag::src("/app.js").defer()]);
        assert_eq!(page.status, 202);
        assert_eq!(page.headers, vec![("x-page".to_string(), "post".to_string())]);
        assert_eq!(page.body_attributes, vec![("class".to_string(), "dark".to_string())]);
    }

    #[test]
    fn test_script_serde_names() {
        let script: ScriptTag = serde_json::from_value(json!({"src": "/m.js", "async": true, "type": "module"})).unwrap();
        assert!(script.is_async);
        assert_eq!(script.kind.as_deref(), Some("module"));
    }

    #[test]
    fn test_malformed_meta_rejected() {
        let err = PageDescriptor::new().meta(json!([{"name": "x"}])).resolve(&ctx()).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidDescriptor { field: "meta", .. }));
    }
}
