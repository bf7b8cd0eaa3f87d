//! Guard, middleware and handler callables.
//!
//! All three take the shared [`RequestContext`] of the request being
//! dispatched and return a boxed future, so route trees can mix closures,
//! async blocks and plain functions freely.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tower::BoxError;

use crate::descriptor::Outcome;
use crate::http::context::RequestContext;
use crate::http::error::DispatchError;

type GuardFn = dyn Fn(Arc<RequestContext>) -> BoxFuture<'static, Result<bool, BoxError>> + Send + Sync;
type MiddlewareFn =
    dyn Fn(Arc<RequestContext>, Next) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;
type HandlerFn = dyn Fn(Arc<RequestContext>) -> BoxFuture<'static, Result<Outcome, BoxError>> + Send + Sync;

/// Predicate run before any middleware. `false` denies the request with 403.
#[derive(Clone)]
pub struct Guard {
    check: Arc<GuardFn>,
}

impl Guard {
    /// Create a guard from an async predicate.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
    {
        Self {
            check: Arc::new(move |ctx| f(ctx).boxed()),
        }
    }

    /// Create a guard from a synchronous, infallible predicate.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> bool + Send + Sync + 'static,
    {
        Self::new(move |ctx| {
            let allowed = f(&ctx);
            async move { Ok(allowed) }
        })
    }

    /// Evaluate the guard against a request.
    pub async fn check(&self, ctx: Arc<RequestContext>) -> Result<bool, BoxError> {
        (self.check)(ctx).await
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard")
    }
}

/// Middleware in a continuation-passing chain.
///
/// A middleware receives the context and a [`Next`]. Calling
/// [`Next::run`] continues with the following middleware and finally the
/// route handler; returning without calling it ends the chain there.
#[derive(Clone)]
pub struct Middleware {
    call: Arc<MiddlewareFn>,
}

impl Middleware {
    /// Create a middleware from an async function of `(ctx, next)`.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<RequestContext>, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            call: Arc::new(move |ctx, next| f(ctx, next).boxed()),
        }
    }

    /// Middleware that runs a side effect and always continues.
    pub fn tap<F>(f: F) -> Self
    where
        F: Fn(&RequestContext) + Send + Sync + 'static,
    {
        Self::new(move |ctx, next| {
            f(&ctx);
            next.run()
        })
    }

    async fn call(&self, ctx: Arc<RequestContext>, next: Next) -> Result<(), BoxError> {
        (self.call)(ctx, next).await
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// Route handler producing an [`Outcome`].
#[derive(Clone)]
pub struct Handler {
    call: Arc<HandlerFn>,
}

impl Handler {
    /// Create a handler from an async function.
    ///
    /// The output may be anything convertible into an [`Outcome`]: a JSON
    /// value, a response or page descriptor, or `()`.
    pub fn new<F, Fut, O>(f: F) -> Self
    where
        F: Fn(Arc<RequestContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, BoxError>> + Send + 'static,
        O: Into<Outcome>,
    {
        Self {
            call: Arc::new(move |ctx| {
                let fut = f(ctx);
                async move { fut.await.map(Into::into) }.boxed()
            }),
        }
    }

    /// Create a handler from a synchronous, infallible function.
    pub fn from_fn<F, O>(f: F) -> Self
    where
        F: Fn(&RequestContext) -> O + Send + Sync + 'static,
        O: Into<Outcome>,
    {
        Self {
            call: Arc::new(move |ctx| {
                let outcome = f(&ctx).into();
                async move { Ok(outcome) }.boxed()
            }),
        }
    }

    /// Invoke the handler.
    pub async fn call(&self, ctx: Arc<RequestContext>) -> Result<Outcome, BoxError> {
        (self.call)(ctx).await
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler")
    }
}

/// Continuation handed to a middleware.
///
/// The end of the chain is the route handler; its outcome is stored for
/// the dispatcher rather than returned through the middlewares.
pub struct Next {
    ctx: Arc<RequestContext>,
    chain: Arc<[Middleware]>,
    index: usize,
    handler: Handler,
    outcome: Arc<Mutex<Option<Outcome>>>,
}

impl Next {
    /// Run the rest of the chain.
    pub fn run(self) -> BoxFuture<'static, Result<(), BoxError>> {
        async move {
            match self.chain.get(self.index).cloned() {
                Some(middleware) => {
                    let next = Next {
                        ctx: Arc::clone(&self.ctx),
                        chain: Arc::clone(&self.chain),
                        index: self.index + 1,
                        handler: self.handler.clone(),
                        outcome: Arc::clone(&self.outcome),
                    };
                    middleware.call(Arc::clone(&self.ctx), next).await
                }
                None => {
                    let outcome = self
                        .handler
                        .call(Arc::clone(&self.ctx))
                        .await
                        .map_err(|e| Box::new(DispatchError::Handler(e)) as BoxError)?;
                    *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
                    Ok(())
                }
            }
        }
        .boxed()
    }

    /// Number of middlewares still ahead of the handler.
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.index)
    }
}

/// Run a middleware chain ending in `handler`.
///
/// Returns `None` when some middleware stopped the chain without calling
/// its continuation, so the handler never ran.
pub(crate) async fn run_chain(
    ctx: Arc<RequestContext>,
    chain: Arc<[Middleware]>,
    handler: Handler,
) -> Result<Option<Outcome>, DispatchError> {
    let outcome = Arc::new(Mutex::new(None));
    let next = Next {
        ctx,
        chain,
        index: 0,
        handler,
        outcome: Arc::clone(&outcome),
    };

    next.run().await.map_err(|e| match e.downcast::<DispatchError>() {
        Ok(dispatch) => *dispatch,
        Err(other) => DispatchError::Middleware(other),
    })?;

    let result = outcome.lock().unwrap_or_else(PoisonError::into_inner).take();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;

    fn ctx() -> Arc<RequestContext> {
        Arc::new(RequestContext::builder(Method::GET, "/t").build())
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str, proceed: bool) -> Middleware {
        let log = Arc::clone(log);
        Middleware::new(move |_ctx, next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{label}:before"));
                let result = if proceed { next.run().await } else { Ok(()) };
                log.lock().unwrap().push(format!("{label}:after"));
                result
            }
        })
    }

    #[tokio::test]
    async fn test_chain_runs_in_order_then_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<[Middleware]> = vec![recorder(&log, "a", true), recorder(&log, "b", true)].into();
        let handler_log = Arc::clone(&log);
        let handler = Handler::from_fn(move |_ctx| {
            handler_log.lock().unwrap().push("handler".to_string());
            json!({"ok": true})
        });

        let outcome = run_chain(ctx(), chain, handler).await.unwrap();
        assert!(matches!(outcome, Some(Outcome::Value(_))));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:before", "b:before", "handler", "b:after", "a:after"]
        );
    }

    #[tokio::test]
    async fn test_chain_stops_without_next() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<[Middleware]> = vec![
            recorder(&log, "a", false),
            recorder(&log, "b", true),
        ]
        .into();
        let handler_log = Arc::clone(&log);
        let handler = Handler::from_fn(move |_ctx| {
            handler_log.lock().unwrap().push("handler".to_string());
        });

        let outcome = run_chain(ctx(), chain, handler).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(*log.lock().unwrap(), vec!["a:before", "a:after"]);
    }

    #[tokio::test]
    async fn test_handler_error_keeps_its_kind() {
        let chain: Arc<[Middleware]> = vec![Middleware::new(|_ctx, next| next.run())].into();
        let handler = Handler::new(|_ctx| async { Err::<(), BoxError>("boom".into()) });

        let err = run_chain(ctx(), chain, handler).await.unwrap_err();
        assert!(matches!(err, DispatchError::Handler(_)));
    }

    #[tokio::test]
    async fn test_middleware_error_is_reported() {
        let chain: Arc<[Middleware]> =
            vec![Middleware::new(|_ctx, _next| async { Err::<(), BoxError>("nope".into()) })].into();
        let handler = Handler::from_fn(|_ctx| ());

        let err = run_chain(ctx(), chain, handler).await.unwrap_err();
        assert!(matches!(err, DispatchError::Middleware(_)));
    }

    #[tokio::test]
    async fn test_guard_from_fn() {
        let guard = Guard::from_fn(|ctx| ctx.header("x-allow").is_some());
        assert!(!guard.check(ctx()).await.unwrap());
    }
}
