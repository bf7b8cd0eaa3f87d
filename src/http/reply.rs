//! Reply handle.
//!
//! # Responsibilities
//! - Accumulate status and headers set by middlewares and the dispatcher
//! - Record the single payload sent for the request
//! - Turn the final state into an axum response
//!
//! # Design Decisions
//! - Header names are case-insensitive; setting one replaces earlier values
//! - A second `send` is ignored with a warning
//! - Nothing sent means `204 No Content` unless a status was set

use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use serde_json::Value;

use crate::http::error::DispatchError;

/// Body sent through a [`Reply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON value. Strings are sent as plain text.
    Json(Value),
    Text(String),
    Html(String),
    Bytes(Bytes),
    Empty,
}

impl Payload {
    fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Payload::Json(Value::String(_)) | Payload::Text(_) => Some("text/plain; charset=utf-8"),
            Payload::Json(_) => Some("application/json; charset=utf-8"),
            Payload::Html(_) => Some("text/html; charset=utf-8"),
            Payload::Bytes(_) => Some("application/octet-stream"),
            Payload::Empty => None,
        }
    }

    fn into_body(self) -> Result<Body, DispatchError> {
        let body = match self {
            Payload::Json(Value::String(text)) | Payload::Text(text) | Payload::Html(text) => Body::from(text),
            Payload::Json(value) => Body::from(serde_json::to_vec(&value)?),
            Payload::Bytes(bytes) => Body::from(bytes),
            Payload::Empty => Body::empty(),
        };
        Ok(body)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

#[derive(Debug, Default)]
struct ReplyState {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    payload: Option<Payload>,
}

/// Outgoing side of a request, shared through the context.
#[derive(Debug, Default)]
pub struct Reply {
    state: Mutex<ReplyState>,
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ReplyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set a response header, replacing any earlier value for the name.
    pub fn header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        let name = name.into();
        let value = value.into();
        let mut state = self.state();
        state.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        state.headers.push((name, value));
        self
    }

    /// Set the response status code.
    pub fn code(&self, status: u16) -> &Self {
        self.state().status = Some(status);
        self
    }

    /// Current status code, if one was set.
    pub fn status(&self) -> Option<u16> {
        self.state().status
    }

    /// Current value of a header set on this reply.
    pub fn get_header(&self, name: &str) -> Option<String> {
        self.state()
            .headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    /// Send the payload. Returns `false` if a payload was already sent.
    pub fn send(&self, payload: impl Into<Payload>) -> bool {
        let mut state = self.state();
        if state.payload.is_some() {
            tracing::warn!("Reply already sent; ignoring second payload");
            return false;
        }
        state.payload = Some(payload.into());
        true
    }

    pub fn is_sent(&self) -> bool {
        self.state().payload.is_some()
    }

    /// Consume the accumulated state into a response.
    ///
    /// The payload is taken out; later calls see an unsent reply.
    pub fn take_response(&self) -> Result<Response, DispatchError> {
        let (status, headers, payload) = {
            let mut state = self.state();
            let payload = state.payload.take();
            let default_status = if payload.is_some() { 200 } else { 204 };
            (
                state.status.unwrap_or(default_status),
                state.headers.clone(),
                payload.unwrap_or(Payload::Empty),
            )
        };

        let status = StatusCode::from_u16(status).map_err(|_| DispatchError::InvalidStatus(status))?;
        let content_type = payload.default_content_type();

        let mut response = Response::new(payload.into_body()?);
        *response.status_mut() = status;

        let response_headers = response.headers_mut();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| DispatchError::InvalidHeader { name: name.clone() })?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|_| DispatchError::InvalidHeader { name })?;
            response_headers.insert(header_name, header_value);
        }
        if let Some(content_type) = content_type {
            if !response_headers.contains_key(header::CONTENT_TYPE) {
                response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
        }

        Ok(response)
    }
}
