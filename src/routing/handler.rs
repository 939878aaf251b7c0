//! Handlers and the per-router stage chain.
//!
//! ```text
//! Router::dispatch
//!     → Next::run (stage 0: authorization)
//!     → Next::run (stage 1: permission)
//!     → Handler::call
//! ```
//!
//! A stage either calls `next.run(..)` exactly once or returns its own
//! response without calling it (short-circuit).

use async_trait::async_trait;
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

use crate::routing::context::RouteContext;

/// Terminal request handler. Opaque to the router.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request<Body>, ctx: RouteContext) -> BoxFuture<'static, Response>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request<Body>, RouteContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, req: Request<Body>, ctx: RouteContext) -> BoxFuture<'static, Response> {
        let fut = self(req, ctx);
        async move { fut.await.into_response() }.boxed()
    }
}

/// A pluggable stage between route resolution and the handler.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: Request<Body>, ctx: RouteContext, next: Next<'_>) -> Response;
}

/// The remainder of the chain, handed to each stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(stages: &'a [Arc<dyn Middleware>], handler: &'a dyn Handler) -> Self {
        Self { stages, handler }
    }

    /// Run the next stage, or the handler once no stages remain.
    pub async fn run(self, req: Request<Body>, ctx: RouteContext) -> Response {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage
                    .handle(req, ctx, Next::new(rest, self.handler))
                    .await
            }
            None => self.handler.call(req, ctx).await,
        }
    }
}
