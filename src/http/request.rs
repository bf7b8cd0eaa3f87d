//! Request extraction.
//!
//! # Responsibilities
//! - Pull path params, query string and body out of an axum request
//! - Derive the peer address from connect info when available
//!
//! # Design Decisions
//! - Params and query values are strings; repeated query keys become arrays
//! - JSON bodies parse only when the content type says JSON
//! - Other bodies are kept as UTF-8 text; an empty body is null

use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequestParts, Query, RawPathParams};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Request};
use serde_json::{Map, Value};

use crate::http::context::RequestContext;
use crate::http::error::DispatchError;

/// The transport-level pieces of a request, before a context exists.
#[derive(Debug)]
pub struct ExtractedRequest {
    pub parts: Parts,
    pub params: Map<String, Value>,
    pub query: Map<String, Value>,
    pub body: Value,
}

impl ExtractedRequest {
    /// Build the per-request context for the route declared as `route`.
    pub fn into_context(self, route: &str) -> RequestContext {
        let peer_ip = peer_ip(&self.parts);
        let Parts {
            method, uri, headers, ..
        } = self.parts;

        let mut builder = RequestContext::builder(method, "/")
            .uri(uri)
            .headers(headers)
            .route(route)
            .params(self.params)
            .query(self.query)
            .body(self.body);
        if let Some(ip) = peer_ip {
            builder = builder.peer_ip(ip);
        }
        builder.build()
    }
}

/// Split a request into params, query and a parsed body.
pub async fn extract(request: Request<Body>, body_limit: usize) -> Result<ExtractedRequest, DispatchError> {
    let (mut parts, body) = request.into_parts();

    let params = match RawPathParams::from_request_parts(&mut parts, &()).await {
        Ok(raw) => raw
            .iter()
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect(),
        Err(axum::extract::rejection::RawPathParamsRejection::InvalidUtf8InPathParam(e)) => {
            return Err(DispatchError::BadRequest(e.body_text()));
        }
        Err(_) => Map::new(),
    };

    let query = parse_query(&parts)?;

    let bytes = axum::body::to_bytes(body, body_limit)
        .await
        .map_err(|e| DispatchError::Body(format!("Failed to read request body: {e}")))?;
    let body = parse_body(&parts.headers, &bytes)?;

    Ok(ExtractedRequest {
        parts,
        params,
        query,
        body,
    })
}

fn parse_query(parts: &Parts) -> Result<Map<String, Value>, DispatchError> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
        .map_err(|e| DispatchError::BadRequest(e.body_text()))?;

    let mut query = Map::new();
    for (key, value) in pairs {
        match query.get_mut(&key) {
            Some(Value::Array(values)) => values.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                query.insert(key, Value::String(value));
            }
        }
    }
    Ok(query)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

fn parse_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Value, DispatchError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    if is_json(headers) {
        return serde_json::from_slice(bytes).map_err(|e| DispatchError::Body(format!("Invalid JSON body: {e}")));
    }
    std::str::from_utf8(bytes)
        .map(|text| Value::String(text.to_string()))
        .map_err(|_| DispatchError::Body("Request body is not valid UTF-8".to_string()))
}

fn peer_ip(parts: &Parts) -> Option<IpAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
