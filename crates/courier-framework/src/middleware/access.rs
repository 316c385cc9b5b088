use std::collections::HashSet;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service, ServiceExt};
use tracing::{debug, warn};

use courier_core::{HandlerError, HandlerResult, UpdateContext};

use crate::handler::BoxFuture;

/// Rejects updates that do not come from an allowed chat.
///
/// Updates without a chat to check are rejected with
/// [`HandlerError::MissingMessage`]; chats outside the allow-list with
/// [`HandlerError::AccessDenied`]. Rejected updates never reach downstream.
#[derive(Debug, Clone)]
pub struct AccessControlLayer {
    allowed: Arc<HashSet<i64>>,
}

impl AccessControlLayer {
    pub fn new(allowed_chat_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            allowed: Arc::new(allowed_chat_ids.into_iter().collect()),
        }
    }
}

impl<S> Layer<S> for AccessControlLayer {
    type Service = AccessControlService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessControlService {
            inner,
            allowed: Arc::clone(&self.allowed),
        }
    }
}

#[derive(Clone)]
pub struct AccessControlService<S> {
    inner: S,
    allowed: Arc<HashSet<i64>>,
}

impl<S> Service<Arc<UpdateContext>> for AccessControlService<S>
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
        let allowed = Arc::clone(&self.allowed);
        Box::pin(async move {
            let update_id = ctx.update_id();
            let Some(chat_id) = ctx.chat_id() else {
                warn!(update_id, "Rejected update without message");
                return Err(HandlerError::MissingMessage);
            };

            if !allowed.contains(&chat_id) {
                warn!(update_id, chat_id, "Access denied");
                return Err(HandlerError::AccessDenied { chat_id });
            }

            debug!(update_id, chat_id, "Access granted");
            inner.oneshot(ctx).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{boxed, handler_fn};
    use courier_core::{Chat, Message, Update};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn counting(counter: Arc<AtomicUsize>) -> crate::BoxedHandler {
        boxed(handler_fn(move |_ctx: Arc<UpdateContext>| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    fn from_chat(chat_id: i64) -> Arc<UpdateContext> {
        Arc::new(UpdateContext::new(
            Update::new(1).with_message(Message::new(1, Chat::new(chat_id)).with_text("hi")),
        ))
    }

    #[tokio::test]
    async fn allowed_chat_passes_through() {
        let counter = Arc::new(AtomicUsize::new(0));
        let svc = AccessControlLayer::new([10, 20]).layer(counting(Arc::clone(&counter)));

        svc.oneshot(from_chat(20)).await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_chat_is_denied() {
        let counter = Arc::new(AtomicUsize::new(0));
        let svc = AccessControlLayer::new([10]).layer(counting(Arc::clone(&counter)));

        let err = svc.oneshot(from_chat(99)).await.unwrap_err();

        assert!(matches!(err, HandlerError::AccessDenied { chat_id: 99 }));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn update_without_message_is_rejected() {
        let counter = Arc::new(AtomicUsize::new(0));
        let svc = AccessControlLayer::new([10]).layer(counting(Arc::clone(&counter)));

        let err = svc
            .oneshot(Arc::new(UpdateContext::new(Update::new(3))))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::MissingMessage));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
