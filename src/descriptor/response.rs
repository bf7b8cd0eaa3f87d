//! Response descriptor.

use serde_json::Value;

use crate::descriptor::value::{to_status, to_string_pairs, ContextValue};
use crate::http::context::RequestContext;
use crate::http::error::DispatchError;

/// Declarative instruction for serializing a handler result.
///
/// If `raw` resolves to a non-null value it is sent verbatim and `json` is
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct ResponseDescriptor {
    status: Option<ContextValue>,
    headers: Option<ContextValue>,
    json: Option<ContextValue>,
    raw: Option<ContextValue>,
}

/// A [`ResponseDescriptor`] with every field resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub json: Option<Value>,
    pub raw: Option<Value>,
}

impl ResponseDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON body response.
    pub fn json(value: impl Into<ContextValue>) -> Self {
        Self::new().with_json(value)
    }

    /// Raw body response.
    pub fn raw(value: impl Into<ContextValue>) -> Self {
        Self::new().with_raw(value)
    }

    pub fn status(mut self, status: impl Into<ContextValue>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Add one header. May be mixed with [`ResponseDescriptor::headers`].
    pub fn header(mut self, name: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.headers
            .get_or_insert_with(|| ContextValue::Map(Vec::new()))
            .insert(name, value.into());
        self
    }

    /// Replace all headers with a mapping (or a function producing one).
    pub fn headers(mut self, headers: impl Into<ContextValue>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    pub fn with_json(mut self, value: impl Into<ContextValue>) -> Self {
        self.json = Some(value.into());
        self
    }

    pub fn with_raw(mut self, value: impl Into<ContextValue>) -> Self {
        self.raw = Some(value.into());
        self
    }

    /// Resolve every field against the request.
    pub fn resolve(&self, ctx: &RequestContext) -> Result<ResolvedResponse, DispatchError> {
        let status = resolve_field("status", self.status.as_ref(), ctx)?;
        let headers = resolve_field("headers", self.headers.as_ref(), ctx)?;
        let json = resolve_field("json", self.json.as_ref(), ctx)?;
        let raw = resolve_field("raw", self.raw.as_ref(), ctx)?;

        Ok(ResolvedResponse {
            status: to_status("status", &status).map_err(invalid("status"))?.unwrap_or(200),
            headers: to_string_pairs("headers", &headers).map_err(invalid("headers"))?,
            json: self.json.as_ref().map(|_| json),
            raw: Some(raw).filter(|raw| !raw.is_null()),
        })
    }
}

pub(crate) fn invalid(field: &'static str) -> impl FnOnce(String) -> DispatchError {
    move |message| DispatchError::InvalidDescriptor { field, message }
}

pub(crate) fn resolve_field(
    field: &'static str,
    value: Option<&ContextValue>,
    ctx: &RequestContext,
) -> Result<Value, DispatchError> {
    value
        .map(|value| value.resolve(ctx))
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(|source| DispatchError::Resolve { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext::builder(Method::GET, "/users/9").param("id", "9").build()
    }

    #[test]
    fn test_raw_wins_over_json() {
        let resolved = ResponseDescriptor::json(json!({"ignored": true}))
            .with_raw("plain text")
            .resolve(&ctx())
            .unwrap();
        assert_eq!(resolved.raw, Some(json!("plain text")));
        assert_eq!(resolved.status, 200);
    }

    #[test]
    fn test_null_raw_is_undefined() {
        let resolved = ResponseDescriptor::json(json!([1]))
            .with_raw(ContextValue::computed(|_| Value::Null))
            .resolve(&ctx())
            .unwrap();
        assert_eq!(resolved.raw, None);
        assert_eq!(resolved.json, Some(json!([1])));
    }

    #[test]
    fn test_dynamic_fields() {
        let resolved = ResponseDescriptor::json(ContextValue::computed(|ctx| json!({"id": ctx.param("id")})))
            .status(201u16)
            .header("x-user", ContextValue::param("id"))
            .header("cache-control", "no-store")
            .resolve(&ctx())
            .unwrap();

        assert_eq!(resolved.status, 201);
        assert_eq!(resolved.json, Some(json!({"id": "9"})));
        assert_eq!(
            resolved.headers,
            vec![
                ("x-user".to_string(), "9".to_string()),
                ("cache-control".to_string(), "no-store".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_status_rejected() {
        let err = ResponseDescriptor::new().status("teapot").resolve(&ctx()).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidDescriptor { field: "status", .. }));
    }

    #[test]
    fn test_failing_function_reported() {
        let err = ResponseDescriptor::json(ContextValue::from_fn(|_| Err("no user".into())))
            .resolve(&ctx())
            .unwrap_err();
        assert!(matches!(err, DispatchError::Resolve { field: "json", .. }));
    }
}
