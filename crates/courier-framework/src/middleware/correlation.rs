use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service, ServiceExt};
use tracing::{Instrument, info};

use courier_core::{HandlerError, HandlerResult, UpdateContext, generate_correlation_id};

use crate::handler::BoxFuture;

/// Assigns a fresh correlation token to every update.
///
/// The token is stored on the [`UpdateContext`] and everything downstream
/// runs inside a span carrying it, so handler log lines are correlated with
/// the middleware lines for the same update.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationLayer;

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService { inner }
    }
}

#[derive(Clone)]
pub struct CorrelationService<S> {
    inner: S,
}

impl<S> Service<Arc<UpdateContext>> for CorrelationService<S>
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
        ctx.set_correlation_id(generate_correlation_id());
        let span = ctx.span();
        Box::pin(
            async move {
                info!("Assigned correlation id");
                inner.oneshot(ctx).await
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{boxed, handler_fn};
    use courier_core::Update;
    use courier_core::testing::CapturedLogs;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    #[tokio::test]
    async fn token_reaches_handler_and_its_logs() {
        let logs = CapturedLogs::new();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let seen = Arc::new(Mutex::new(None));
        let seen_in_handler = Arc::clone(&seen);
        let handler = boxed(handler_fn(move |ctx: Arc<UpdateContext>| {
            let seen = Arc::clone(&seen_in_handler);
            async move {
                *seen.lock() = ctx.correlation_id();
                info!("inside handler");
                Ok(())
            }
        }));

        CorrelationLayer
            .layer(handler)
            .oneshot(Arc::new(UpdateContext::new(Update::new(4))))
            .await
            .unwrap();

        let token = seen.lock().clone().expect("handler saw a token");
        assert_eq!(token.len(), 32);

        let handler_line = logs.position("inside handler").unwrap();
        assert!(logs.events()[handler_line].contains(&token));
    }

    #[tokio::test]
    async fn each_call_gets_a_new_token() {
        let handler = boxed(handler_fn(|_ctx: Arc<UpdateContext>| async { Ok(()) }));
        let svc = CorrelationLayer.layer(handler);

        let first = Arc::new(UpdateContext::new(Update::new(1)));
        let second = Arc::new(UpdateContext::new(Update::new(2)));
        svc.clone().oneshot(Arc::clone(&first)).await.unwrap();
        svc.oneshot(Arc::clone(&second)).await.unwrap();

        assert_ne!(first.correlation_id(), second.correlation_id());
    }
}
