//! Middleware chain.
//!
//! A [`Middleware`] turns one [`BoxedHandler`] into another. Any tower
//! [`Layer`] over handler services can be used as one via
//! [`Middleware::from_layer`].
//!
//! [`compose`] applies a list of middleware in **reverse** order so that the
//! first entry ends up outermost:
//!
//! ```text
//! compose(H, [A, B, C])  ==  A(B(C(H)))
//!
//! update ──▶ A ──▶ B ──▶ C ──▶ H
//! result ◀── A ◀── B ◀── C ◀── H
//! ```
//!
//! Each stage may short-circuit by returning an error without calling the
//! next one. Stacking the same layers with `tower::ServiceBuilder` in list
//! order yields the identical call order.

mod access;
mod correlation;
mod recovery;
mod request_log;
mod timing;

use std::sync::Arc;

use tower::{Layer, Service};

use courier_core::{HandlerError, UpdateContext};

use crate::handler::{BoxedHandler, boxed};

pub use access::{AccessControlLayer, AccessControlService};
pub use correlation::{CorrelationLayer, CorrelationService};
pub use recovery::{RecoveryLayer, RecoveryService};
pub use request_log::{RequestLogLayer, RequestLogService};
pub use timing::{TimingLayer, TimingService};

/// A handler-to-handler wrapping combinator.
#[derive(Clone)]
pub struct Middleware {
    name: &'static str,
    wrap: Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>,
}

impl Middleware {
    /// Creates middleware from a wrapping function.
    pub fn new<F>(name: &'static str, wrap: F) -> Self
    where
        F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
    {
        Self {
            name,
            wrap: Arc::new(wrap),
        }
    }

    /// Creates middleware from a tower layer.
    pub fn from_layer<L>(name: &'static str, layer: L) -> Self
    where
        L: Layer<BoxedHandler> + Send + Sync + 'static,
        L::Service: Service<Arc<UpdateContext>, Response = (), Error = HandlerError>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<Arc<UpdateContext>>>::Future: Send + 'static,
    {
        Self::new(name, move |inner| boxed(layer.layer(inner)))
    }

    /// Request logging.
    pub fn request_log() -> Self {
        Self::from_layer("request_log", RequestLogLayer)
    }

    /// Correlation token assignment.
    pub fn correlation() -> Self {
        Self::from_layer("correlation", CorrelationLayer)
    }

    /// Chat allow-list.
    pub fn access_control(allowed_chat_ids: impl IntoIterator<Item = i64>) -> Self {
        Self::from_layer("access_control", AccessControlLayer::new(allowed_chat_ids))
    }

    /// Downstream duration logging.
    pub fn timing() -> Self {
        Self::from_layer("timing", TimingLayer)
    }

    /// Panic containment.
    pub fn recovery() -> Self {
        Self::from_layer("recovery", RecoveryLayer)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wraps `inner` with this middleware.
    pub fn apply(&self, inner: BoxedHandler) -> BoxedHandler {
        (self.wrap)(inner)
    }
}

impl Layer<BoxedHandler> for Middleware {
    type Service = BoxedHandler;

    fn layer(&self, inner: BoxedHandler) -> Self::Service {
        self.apply(inner)
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Middleware")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Wraps `handler` with `middleware`, first entry outermost.
pub fn compose<I>(handler: BoxedHandler, middleware: I) -> BoxedHandler
where
    I: IntoIterator<Item = Middleware>,
    I::IntoIter: DoubleEndedIterator,
{
    middleware
        .into_iter()
        .rev()
        .fold(handler, |inner, m| m.apply(inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use courier_core::{Chat, HandlerResult, Message, Update};
    use parking_lot::Mutex;
    use tower::ServiceExt;

    fn recording(label: &'static str, trace: Arc<Mutex<Vec<String>>>) -> Middleware {
        Middleware::new(label, move |inner: BoxedHandler| {
            let trace = Arc::clone(&trace);
            boxed(tower::service_fn(move |ctx: Arc<UpdateContext>| {
                let trace = Arc::clone(&trace);
                let inner = inner.clone();
                async move {
                    trace.lock().push(format!("{label}:in"));
                    let result = inner.oneshot(ctx).await;
                    trace.lock().push(format!("{label}:out"));
                    result
                }
            }))
        })
    }

    fn update() -> Arc<UpdateContext> {
        Arc::new(UpdateContext::new(
            Update::new(1).with_message(Message::new(1, Chat::new(1)).with_text("hi")),
        ))
    }

    #[tokio::test]
    async fn first_middleware_is_outermost() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let handler_trace = Arc::clone(&trace);
        let handler = boxed(handler_fn(move |_ctx: Arc<UpdateContext>| {
            let trace = Arc::clone(&handler_trace);
            async move {
                trace.lock().push("H".to_string());
                Ok(())
            }
        }));

        let chain = compose(
            handler,
            vec![
                recording("A", Arc::clone(&trace)),
                recording("B", Arc::clone(&trace)),
                recording("C", Arc::clone(&trace)),
            ],
        );
        chain.oneshot(update()).await.unwrap();

        assert_eq!(
            *trace.lock(),
            ["A:in", "B:in", "C:in", "H", "C:out", "B:out", "A:out"]
        );
    }

    #[tokio::test]
    async fn short_circuit_skips_downstream() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let gate = Middleware::new("gate", |_inner: BoxedHandler| {
            boxed(tower::service_fn(|_ctx: Arc<UpdateContext>| async {
                HandlerResult::Err(HandlerError::failed("blocked"))
            }))
        });
        let handler_trace = Arc::clone(&trace);
        let handler = boxed(handler_fn(move |_ctx: Arc<UpdateContext>| {
            let trace = Arc::clone(&handler_trace);
            async move {
                trace.lock().push("H".to_string());
                Ok(())
            }
        }));

        let chain = compose(handler, vec![recording("A", Arc::clone(&trace)), gate]);
        let err = chain.oneshot(update()).await.unwrap_err();

        assert_eq!(err.to_string(), "blocked");
        assert_eq!(*trace.lock(), ["A:in", "A:out"]);
    }

    #[tokio::test]
    async fn service_builder_matches_compose_order() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let handler = boxed(handler_fn(|_ctx: Arc<UpdateContext>| async { Ok(()) }));

        let chain = tower::ServiceBuilder::new()
            .layer(recording("A", Arc::clone(&trace)))
            .layer(recording("B", Arc::clone(&trace)))
            .service(handler);
        chain.oneshot(update()).await.unwrap();

        assert_eq!(*trace.lock(), ["A:in", "B:in", "B:out", "A:out"]);
    }
}
