use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service, ServiceExt};
use tracing::{info, trace};

use courier_core::{HandlerError, HandlerResult, UpdateContext};

use crate::handler::BoxFuture;

/// Measures wall-clock duration of the downstream call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingLayer;

impl<S> Layer<S> for TimingLayer {
    type Service = TimingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimingService { inner }
    }
}

#[derive(Clone)]
pub struct TimingService<S> {
    inner: S,
}

impl<S> Service<Arc<UpdateContext>> for TimingService<S>
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
            let update_id = ctx.update_id();
            let start = Instant::now();
            trace!(update_id, "Timer started");

            let result = inner.oneshot(ctx).await;

            info!(
                update_id,
                duration_ms = start.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "Handler finished"
            );
            result
        })
    }
}
