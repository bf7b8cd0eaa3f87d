//! Per-request dispatch.
//!
//! # Responsibilities
//! - Run the guard chain; deny with 403 on the first `false`
//! - Run the middleware chain ending in the handler
//! - Interpret the handler outcome into the reply
//!
//! # Design Decisions
//! - Strictly sequential: guards → middlewares → handler → interpretation
//! - Failures are logged here and returned; the transport maps them to 500
//! - A request nobody replied to gets 204 with whatever headers were set

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::descriptor::Outcome;
use crate::http::context::RequestContext;
use crate::http::error::DispatchError;
use crate::http::reply::Payload;
use crate::http::request::extract;
use crate::http::schema::RequestSchema;
use crate::observability::metrics;
use crate::render::PageRenderer;
use crate::routing::CollectedRoute;
use crate::tree::handler::{run_chain, Guard, Handler, Middleware};

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Executes one collected route against request contexts.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    route: String,
    method: Method,
    guards: Arc<[Guard]>,
    middlewares: Arc<[Middleware]>,
    handler: Handler,
    renderer: Arc<PageRenderer>,
}

impl Dispatcher {
    pub fn new(route: &CollectedRoute, renderer: Arc<PageRenderer>) -> Self {
        Self {
            route: route.path.clone(),
            method: route.method.clone(),
            guards: route.guards.clone().into(),
            middlewares: route.middlewares.clone().into(),
            handler: route.handler.clone(),
            renderer,
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Dispatch a request and produce its response.
    pub async fn dispatch(&self, ctx: Arc<RequestContext>) -> Result<Response, DispatchError> {
        match self.run(&ctx).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::error!(
                    method = %self.method,
                    route = %self.route,
                    request_id = ctx.header("x-request-id").unwrap_or("-"),
                    error = %e,
                    "Request dispatch failed"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, ctx: &Arc<RequestContext>) -> Result<Response, DispatchError> {
        for (index, guard) in self.guards.iter().enumerate() {
            let allowed = guard.check(Arc::clone(ctx)).await.map_err(DispatchError::Guard)?;
            if !allowed {
                tracing::debug!(method = %self.method, route = %self.route, guard = index, "Request denied by guard");
                metrics::record_guard_denied(&self.route);
                ctx.reply().code(403).send(json!({
                    "error": "Forbidden",
                    "message": "Access denied by guard",
                }));
                return ctx.reply().take_response();
            }
        }

        let outcome = run_chain(Arc::clone(ctx), Arc::clone(&self.middlewares), self.handler.clone()).await?;
        if outcome.is_none() {
            tracing::debug!(route = %self.route, "Middleware chain stopped before the handler");
        }

        self.interpret(outcome, ctx).await?;
        ctx.reply().take_response()
    }

    async fn interpret(&self, outcome: Option<Outcome>, ctx: &RequestContext) -> Result<(), DispatchError> {
        let reply = ctx.reply();
        if reply.is_sent() && matches!(outcome, Some(Outcome::Page(_) | Outcome::Response(_))) {
            tracing::warn!(route = %self.route, "Reply already sent; ignoring descriptor outcome");
            return Ok(());
        }
        match outcome {
            Some(Outcome::Page(page)) => {
                let rendered = self.renderer.render(&page, ctx).await?;
                for (name, value) in rendered.headers {
                    reply.header(name, value);
                }
                reply
                    .code(rendered.status)
                    .header("content-type", HTML_CONTENT_TYPE)
                    .send(Payload::Html(rendered.html));
            }
            Some(Outcome::Response(response)) => {
                let resolved = response.resolve(ctx)?;
                for (name, value) in resolved.headers {
                    reply.header(name, value);
                }
                reply.code(resolved.status);
                let payload = match (resolved.raw, resolved.json) {
                    (Some(Value::String(text)), _) => Payload::Text(text),
                    (Some(raw), _) => Payload::Json(raw),
                    (None, Some(json)) => Payload::Json(json),
                    (None, None) => Payload::Empty,
                };
                reply.send(payload);
            }
            Some(Outcome::Value(value)) => {
                if !reply.is_sent() {
                    reply.send(Payload::Json(value));
                }
            }
            Some(Outcome::Empty) | None => {}
        }
        Ok(())
    }
}

/// Axum-facing endpoint for one (path, method).
#[derive(Debug)]
pub struct RouteEndpoint {
    dispatcher: Dispatcher,
    schema: Option<RequestSchema>,
    body_limit: usize,
}

impl RouteEndpoint {
    pub fn new(dispatcher: Dispatcher, schema: Option<RequestSchema>, body_limit: usize) -> Self {
        Self {
            dispatcher,
            schema,
            body_limit,
        }
    }

    pub async fn handle(&self, request: Request<Body>) -> Response {
        let started = Instant::now();
        let response = match self.process(request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };
        metrics::record_request(
            self.dispatcher.method.as_str(),
            &self.dispatcher.route,
            response.status().as_u16(),
            started,
        );
        response
    }

    async fn process(&self, request: Request<Body>) -> Result<Response, DispatchError> {
        let mut extracted = extract(request, self.body_limit).await.inspect_err(|e| {
            tracing::debug!(route = %self.dispatcher.route, error = %e, "Rejected request body");
        })?;

        if let Some(schema) = &self.schema {
            schema
                .apply(&mut extracted.params, &mut extracted.query, &extracted.body)
                .inspect_err(|e| {
                    tracing::debug!(route = %self.dispatcher.route, error = %e, "Request failed schema validation");
                })?;
        }

        let ctx = Arc::new(extracted.into_context(&self.dispatcher.route));
        self.dispatcher.dispatch(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleCache, BundleOptions, CommandBundler, ComponentRegistry, PropsCache};
    use crate::descriptor::{ContextValue, PageDescriptor, ResponseDescriptor};
    use crate::render::Markup;
    use crate::tree::node::{Node, Route};
    use axum::http::StatusCode;
    use std::sync::Mutex;
    use tower::BoxError;

    fn renderer() -> Arc<PageRenderer> {
        Arc::new(PageRenderer::new(
            Arc::new(ComponentRegistry::new()),
            Arc::new(BundleCache::new(
                Arc::new(CommandBundler::default()),
                BundleOptions::default(),
                true,
            )),
            Arc::new(PropsCache::new(8)),
        ))
    }

    fn dispatcher(route: Route) -> Dispatcher {
        let node: Node = route.into();
        let routes = crate::routing::collect(Some(&node), "", &[], &[]);
        Dispatcher::new(&routes[0], renderer())
    }

    fn ctx() -> Arc<RequestContext> {
        Arc::new(RequestContext::builder(Method::GET, "/t").build())
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_guard_denial_skips_handler() {
        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        let route = Route::get(
            "/t",
            Handler::from_fn(move |_| {
                *flag.lock().unwrap() = true;
            }),
        )
        .guard(Guard::from_fn(|_| false));

        let response = dispatcher(route).dispatch(ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body(response).await,
            r#"{"error":"Forbidden","message":"Access denied by guard"}"#
        );
        assert!(!*called.lock().unwrap());
    }

    #[tokio::test]
    async fn test_guard_error_propagates() {
        let route = Route::get("/t", Handler::from_fn(|_| ()))
            .guard(Guard::new(|_| async { Err::<bool, BoxError>("token store down".into()) }));
        let err = dispatcher(route).dispatch(ctx()).await.unwrap_err();
        assert!(matches!(err, DispatchError::Guard(_)));
    }

    #[tokio::test]
    async fn test_reply_sent_after_next_wins_over_value() {
        let route = Route::get("/t", Handler::from_fn(|_| json!({"from": "handler"}))).middleware(
            Middleware::new(|ctx, next| async move {
                let result = next.run().await;
                ctx.reply().code(202).send("from middleware");
                result
            }),
        );

        let response = dispatcher(route).dispatch(ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body(response).await, "from middleware");
    }

    #[tokio::test]
    async fn test_reply_sent_before_next_wins_over_value() {
        let route = Route::get("/t", Handler::from_fn(|_| json!({"ignored": true}))).middleware(
            Middleware::new(|ctx, next| async move {
                ctx.reply().code(200).send("early");
                next.run().await
            }),
        );

        let response = dispatcher(route).dispatch(ctx()).await.unwrap();
        assert_eq!(body(response).await, "early");
    }

    #[tokio::test]
    async fn test_descriptor_ignored_after_reply_sent() {
        let deny = || {
            Middleware::new(|ctx, next| async move {
                ctx.reply().code(401).send(json!({"error": "nope"}));
                next.run().await
            })
        };

        let route = Route::get(
            "/t",
            Handler::from_fn(|_| ResponseDescriptor::json(json!({"ok": true})).header("x-from", "descriptor")),
        )
        .middleware(deny());
        let response = dispatcher(route).dispatch(ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("x-from").is_none());
        assert_eq!(body(response).await, r#"{"error":"nope"}"#);

        let route = Route::get(
            "/t",
            Handler::from_fn(|_| PageDescriptor::new().content(Markup::new("<h1>Hi</h1>")).header("x-page", "1")),
        )
        .middleware(deny());
        let response = dispatcher(route).dispatch(ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_ne!(response.headers()["content-type"], HTML_CONTENT_TYPE);
        assert!(response.headers().get("x-page").is_none());
    }

    #[tokio::test]
    async fn test_response_descriptor() {
        let route = Route::get(
            "/t",
            Handler::from_fn(|_| {
                ResponseDescriptor::json(json!({"ignored": true}))
                    .with_raw("plain text")
                    .status(201u16)
                    .header("x-kind", ContextValue::from_context("method"))
            }),
        );

        let response = dispatcher(route).dispatch(ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-kind"], "GET");
        assert_eq!(body(response).await, "plain text");
    }

    #[tokio::test]
    async fn test_page_descriptor() {
        let route = Route::get(
            "/t",
            Handler::from_fn(|_| {
                PageDescriptor::new()
                    .content(Markup::new("<h1>Hi</h1>"))
                    .header("x-page", "1")
            }),
        );

        let response = dispatcher(route).dispatch(ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], HTML_CONTENT_TYPE);
        assert_eq!(response.headers()["x-page"], "1");
        assert!(body(response).await.contains(r#"<div id="root"><h1>Hi</h1></div>"#));
    }

    #[tokio::test]
    async fn test_empty_outcome_is_no_content() {
        let route = Route::get("/t", Handler::from_fn(|_| ()));
        let response = dispatcher(route).dispatch(ctx()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
