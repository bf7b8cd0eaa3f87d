//! Per-request context shared by guards, middlewares and the handler.

use std::net::IpAddr;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::http::reply::Reply;

/// Header consulted before the peer address when deriving the client IP.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Everything known about one in-flight request.
///
/// Created fresh per request and dropped when the response is produced.
/// The core fields are read-only; side effects go through [`Reply`].
#[derive(Debug)]
pub struct RequestContext {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    route: String,
    params: Value,
    query: Value,
    body: Value,
    request_timestamp: String,
    ip: Option<String>,
    reply: Reply,
}

impl RequestContext {
    /// Start building a context for `method` on `uri`.
    ///
    /// An unparsable `uri` falls back to `/`.
    pub fn builder(method: Method, uri: &str) -> RequestContextBuilder {
        RequestContextBuilder {
            method,
            uri: uri.parse().unwrap_or_default(),
            headers: HeaderMap::new(),
            route: None,
            params: Map::new(),
            query: Map::new(),
            body: Value::Null,
            peer_ip: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path as received.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Declared path of the matched route.
    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path parameters as a JSON object of strings.
    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    /// Query string parameters as a JSON object of strings.
    pub fn query(&self) -> &Value {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).and_then(Value::as_str)
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// ISO-8601 UTC timestamp taken when the context was built.
    pub fn request_timestamp(&self) -> &str {
        &self.request_timestamp
    }

    /// Client address, preferring the first `x-forwarded-for` entry.
    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn reply(&self) -> &Reply {
        &self.reply
    }

    /// Look up a context field by name, as a JSON value.
    ///
    /// Known names: `method`, `path`, `route`, `params`, `query`, `body`,
    /// `requestTimestamp`, `ip`. Anything else yields `None`.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "method" => Some(Value::from(self.method.as_str())),
            "path" => Some(Value::from(self.path())),
            "route" => Some(Value::from(self.route.as_str())),
            "params" => Some(self.params.clone()),
            "query" => Some(self.query.clone()),
            "body" => Some(self.body.clone()),
            "requestTimestamp" => Some(Value::from(self.request_timestamp.as_str())),
            "ip" => Some(self.ip.as_deref().map_or(Value::Null, Value::from)),
            _ => None,
        }
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug)]
pub struct RequestContextBuilder {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    route: Option<String>,
    params: Map<String, Value>,
    query: Map<String, Value>,
    body: Value,
    peer_ip: Option<IpAddr>,
}

impl RequestContextBuilder {
    pub fn uri(mut self, uri: Uri) -> Self {
        self.uri = uri;
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Declared route path; defaults to the request path.
    pub fn route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), Value::String(value.into()));
        self
    }

    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), Value::String(value.into()));
        self
    }

    pub fn query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Address reported by the transport for the connection.
    pub fn peer_ip(mut self, ip: IpAddr) -> Self {
        self.peer_ip = Some(ip);
        self
    }

    pub fn build(self) -> RequestContext {
        let ip = forwarded_for(&self.headers).or_else(|| self.peer_ip.map(|ip| ip.to_string()));
        let route = self.route.unwrap_or_else(|| self.uri.path().to_string());

        RequestContext {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            route,
            params: Value::Object(self.params),
            query: Value::Object(self.query),
            body: self.body,
            request_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            ip,
            reply: Reply::new(),
        }
    }
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_forwarded_for_wins_over_peer() {
        let ctx = RequestContext::builder(Method::GET, "/")
            .header(
                HeaderName::from_static(X_FORWARDED_FOR),
                HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
            )
            .peer_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .build();
        assert_eq!(ctx.ip(), Some("203.0.113.7"));
    }

    #[test]
    fn test_peer_ip_fallback() {
        let ctx = RequestContext::builder(Method::GET, "/")
            .peer_ip(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .build();
        assert_eq!(ctx.ip(), Some("127.0.0.1"));

        let ctx = RequestContext::builder(Method::GET, "/").build();
        assert_eq!(ctx.ip(), None);
    }

    #[test]
    fn test_timestamp_is_iso8601_utc() {
        let ctx = RequestContext::builder(Method::GET, "/").build();
        let ts = ctx.request_timestamp();
        assert!(ts.ends_with('Z'), "{ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_accessors() {
        let ctx = RequestContext::builder(Method::POST, "/users/7?page=2")
            .route("/users/:id")
            .param("id", "7")
            .query_param("page", "2")
            .body(serde_json::json!({"name": "ada"}))
            .build();

        assert_eq!(ctx.path(), "/users/7");
        assert_eq!(ctx.route(), "/users/:id");
        assert_eq!(ctx.param("id"), Some("7"));
        assert_eq!(ctx.query_param("page"), Some("2"));
        assert_eq!(ctx.body()["name"], "ada");
        assert_eq!(ctx.field("method"), Some(Value::from("POST")));
        assert_eq!(ctx.field("unknown"), None);
    }
}
