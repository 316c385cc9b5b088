//! Handler abstraction.
//!
//! A handler is anything that accepts an `Arc<UpdateContext>` and returns a
//! [`HandlerResult`]. Internally every handler is a
//! `tower::Service<Arc<UpdateContext>>`, so the middleware chain is ordinary
//! tower [`Layer`](tower::Layer)s stacked on top.
//!
//! ```rust,ignore
//! async fn start(ctx: Arc<UpdateContext>) -> HandlerResult {
//!     info!(chat_id = ?ctx.chat_id(), "start requested");
//!     Ok(())
//! }
//!
//! router.handle_command("/start", handler_fn(start));
//! ```

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tower::util::BoxCloneSyncService;

use courier_core::{HandlerError, HandlerResult, UpdateContext};

/// Boxed `'static + Send` future.
pub type BoxFuture<T> = futures::future::BoxFuture<'static, T>;

/// A type-erased, `Clone + Send + Sync` handler service.
///
/// Everything that flows through the router and the middleware chain ends up
/// as one of these.
pub type BoxedHandler = BoxCloneSyncService<Arc<UpdateContext>, (), HandlerError>;

// ============================================================================
// Handler
// ============================================================================

/// An async function over the update context.
///
/// Implemented for every `Fn(Arc<UpdateContext>) -> impl Future<Output =
/// HandlerResult>` closure or function item that is `Clone`.
pub trait Handler: Clone + Send + Sync + 'static {
    fn call(&self, ctx: Arc<UpdateContext>) -> BoxFuture<HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Arc<UpdateContext>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Arc<UpdateContext>) -> BoxFuture<HandlerResult> {
        Box::pin((self)(ctx))
    }
}

// ============================================================================
// HandlerService
// ============================================================================

/// A tower [`Service`] that calls a single [`Handler`].
#[derive(Clone)]
pub struct HandlerService<H> {
    handler: H,
}

impl<H: Handler> HandlerService<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }
}

impl<H: Handler> Service<Arc<UpdateContext>> for HandlerService<H> {
    type Response = ();
    type Error = HandlerError;
    type Future = BoxFuture<HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<UpdateContext>) -> Self::Future {
        self.handler.call(ctx)
    }
}

/// Wraps an async function into a handler service.
pub fn handler_fn<F, Fut>(handler: F) -> HandlerService<F>
where
    F: Fn(Arc<UpdateContext>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    HandlerService::new(handler)
}

/// Type-erases a handler service.
pub fn boxed<S>(service: S) -> BoxedHandler
where
    S: Service<Arc<UpdateContext>, Response = (), Error = HandlerError>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    BoxCloneSyncService::new(service)
}
