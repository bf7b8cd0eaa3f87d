//! Context-dependent values.
//!
//! A [`ContextValue`] is either a literal, a function of the request
//! context, or a list/map of further context values. Resolution walks the
//! whole structure eagerly; the first failing function aborts it.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tower::BoxError;

use crate::http::context::RequestContext;

type ResolveFn = dyn Fn(&RequestContext) -> Result<Value, BoxError> + Send + Sync;

/// A value that may depend on the current request.
#[derive(Clone)]
pub enum ContextValue {
    Static(Value),
    Dynamic(Arc<ResolveFn>),
    List(Vec<ContextValue>),
    Map(Vec<(String, ContextValue)>),
}

impl ContextValue {
    /// Value computed from the context; errors propagate to the caller.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        ContextValue::Dynamic(Arc::new(f))
    }

    /// Infallible variant of [`ContextValue::from_fn`].
    pub fn computed<F, T>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Self::from_fn(move |ctx| Ok(f(ctx).into()))
    }

    /// Request header value, or null when missing.
    pub fn header(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::computed(move |ctx| ctx.header(&name).map_or(Value::Null, Value::from))
    }

    /// Path parameter, or null when missing.
    pub fn param(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::computed(move |ctx| ctx.param(&name).map_or(Value::Null, Value::from))
    }

    /// Query parameter, or null when missing.
    pub fn query(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::computed(move |ctx| ctx.query_param(&name).map_or(Value::Null, Value::from))
    }

    /// Named context field such as `ip` or `requestTimestamp`.
    pub fn from_context(field: &'static str) -> Self {
        Self::from_fn(move |ctx| {
            ctx.field(field)
                .ok_or_else(|| format!("unknown context field `{field}`").into())
        })
    }

    /// Resolve against a request context.
    pub fn resolve(&self, ctx: &RequestContext) -> Result<Value, BoxError> {
        match self {
            ContextValue::Static(value) => Ok(value.clone()),
            ContextValue::Dynamic(f) => f(ctx),
            ContextValue::List(items) => items
                .iter()
                .map(|item| item.resolve(ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            ContextValue::Map(entries) => {
                let mut map = Map::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.resolve(ctx)?);
                }
                Ok(Value::Object(map))
            }
        }
    }

    /// Append an item, turning a static array into a list first.
    pub(crate) fn push(&mut self, item: ContextValue) {
        if let ContextValue::Static(Value::Array(items)) = self {
            let items = std::mem::take(items);
            *self = ContextValue::List(items.into_iter().map(ContextValue::Static).collect());
        }
        match self {
            ContextValue::List(items) => items.push(item),
            other => *other = ContextValue::List(vec![item]),
        }
    }

    /// Set a key, turning a static object into a map first.
    pub(crate) fn insert(&mut self, key: impl Into<String>, value: ContextValue) {
        if let ContextValue::Static(Value::Object(map)) = self {
            let map = std::mem::take(map);
            *self = ContextValue::Map(
                map.into_iter().map(|(k, v)| (k, ContextValue::Static(v))).collect(),
            );
        }
        let key = key.into();
        match self {
            ContextValue::Map(entries) => {
                entries.retain(|(existing, _)| *existing != key);
                entries.push((key, value));
            }
            other => *other = ContextValue::Map(vec![(key, value)]),
        }
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            ContextValue::Dynamic(_) => f.write_str("Dynamic(..)"),
            ContextValue::List(items) => f.debug_tuple("List").field(items).finish(),
            ContextValue::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
        }
    }
}

impl From<Value> for ContextValue {
    fn from(value: Value) -> Self {
        ContextValue::Static(value)
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Static(Value::from(value))
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Static(Value::from(value))
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Static(Value::from(value))
    }
}

impl From<u16> for ContextValue {
    fn from(value: u16) -> Self {
        ContextValue::Static(Value::from(value))
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Static(Value::from(value))
    }
}

impl From<Vec<ContextValue>> for ContextValue {
    fn from(items: Vec<ContextValue>) -> Self {
        ContextValue::List(items)
    }
}

impl<K: Into<String>> FromIterator<(K, ContextValue)> for ContextValue {
    fn from_iter<I: IntoIterator<Item = (K, ContextValue)>>(iter: I) -> Self {
        ContextValue::Map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Interpret a resolved value as an HTTP status code.
pub(crate) fn to_status(field: &'static str, value: &Value) -> Result<Option<u16>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| format!("{field} must be an integer status code, got {n}")),
        other => Err(format!("{field} must be a number, got {other}")),
    }
}

/// Interpret a resolved value as a string-to-string mapping.
///
/// Non-string scalars are stringified; nested structures are rejected.
pub(crate) fn to_string_pairs(field: &'static str, value: &Value) -> Result<Vec<(String, String)>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| Ok((key.clone(), to_text(field, value)?)))
            .collect(),
        other => Err(format!("{field} must be an object, got {other}")),
    }
}

/// Interpret a resolved scalar as text.
pub(crate) fn to_text(field: &'static str, value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(format!("{field} must be a scalar, got {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext::builder(Method::GET, "/items/42?x=42")
            .param("id", "42")
            .query_param("x", "42")
            .build()
    }

    fn x() -> ContextValue {
        ContextValue::computed(|ctx| ctx.query_param("x").and_then(|v| v.parse::<i64>().ok()))
    }

    #[test]
    fn test_resolves_nested_functions() {
        let value: ContextValue = [
            ("a", ContextValue::from(1i64)),
            ("b", x()),
            ("c", ContextValue::from(vec![1i64.into(), x(), 3i64.into()])),
        ]
        .into_iter()
        .collect();

        assert_eq!(value.resolve(&ctx()).unwrap(), json!({"a": 1, "b": 42, "c": [1, 42, 3]}));
    }

    #[test]
    fn test_static_passthrough() {
        let value = ContextValue::from(json!({"deep": [{"k": "v"}]}));
        assert_eq!(value.resolve(&ctx()).unwrap(), json!({"deep": [{"k": "v"}]}));
    }

    #[test]
    fn test_error_propagates() {
        let value = ContextValue::from(vec![
            ContextValue::from("ok"),
            ContextValue::from_fn(|_| Err("lookup failed".into())),
        ]);
        let err = value.resolve(&ctx()).unwrap_err();
        assert_eq!(err.to_string(), "lookup failed");
    }

    #[test]
    fn test_helpers() {
        assert_eq!(ContextValue::param("id").resolve(&ctx()).unwrap(), json!("42"));
        assert_eq!(ContextValue::header("x-missing").resolve(&ctx()).unwrap(), Value::Null);
        assert_eq!(ContextValue::from_context("method").resolve(&ctx()).unwrap(), json!("GET"));
        assert!(ContextValue::from_context("nope").resolve(&ctx()).is_err());
    }

    #[test]
    fn test_insert_into_static_object() {
        let mut value = ContextValue::from(json!({"a": "1"}));
        value.insert("b", ContextValue::param("id"));
        value.insert("a", ContextValue::from("replaced"));
        assert_eq!(value.resolve(&ctx()).unwrap(), json!({"b": "42", "a": "replaced"}));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(to_status("status", &json!(201)), Ok(Some(201)));
        assert!(to_status("status", &json!("201")).is_err());
        assert_eq!(
            to_string_pairs("headers", &json!({"x-n": 1})).unwrap(),
            vec![("x-n".to_string(), "1".to_string())]
        );
        assert!(to_string_pairs("headers", &json!({"x": {"y": 1}})).is_err());
    }
}
