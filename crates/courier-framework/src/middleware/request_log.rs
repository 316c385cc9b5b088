use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service, ServiceExt};
use tracing::{error, info};

use courier_core::{HandlerError, HandlerResult, UpdateContext};

use crate::handler::BoxFuture;

/// Logs receipt of each update and the outcome of the downstream call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogLayer;

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService { inner }
    }
}

#[derive(Clone)]
pub struct RequestLogService<S> {
    inner: S,
}

impl<S> Service<Arc<UpdateContext>> for RequestLogService<S>
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
            info!(update_id, chat_id = ?ctx.chat_id(), "Received update");

            let result = inner.oneshot(ctx).await;
            match &result {
                Ok(()) => info!(update_id, "Handler executed successfully"),
                Err(e) => error!(update_id, error = %e, "Handler returned error"),
            }
            result
        })
    }
}
