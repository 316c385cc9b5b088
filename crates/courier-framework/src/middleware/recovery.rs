use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service, ServiceExt};

use courier_core::{HandlerError, HandlerResult, UpdateContext, recovery};

use crate::handler::BoxFuture;

/// Converts a panic anywhere downstream into [`HandlerError::Panicked`].
///
/// Both the synchronous `call` and the returned future run under the
/// invoker, so a misbehaving handler cannot unwind into the ingestion loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryLayer;

impl<S> Layer<S> for RecoveryLayer {
    type Service = RecoveryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RecoveryService { inner }
    }
}

#[derive(Clone)]
pub struct RecoveryService<S> {
    inner: S,
}

impl<S> Service<Arc<UpdateContext>> for RecoveryService<S>
where
    S: Service<Arc<UpdateContext>, Response = (), Error = HandlerError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = ();
    type Error = HandlerError;
    type Future = BoxFuture<HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<UpdateContext>) -> Self::Future {
        let inner = self.inner.clone();
        Box::pin(async move {
            match recovery::invoke(async move { inner.oneshot(ctx).await }).await {
                Ok(result) => result,
                Err(panicked) => Err(panicked.into()),
            }
        })
    }
}
