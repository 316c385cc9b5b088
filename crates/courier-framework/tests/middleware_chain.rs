use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use courier_core::testing::CapturedLogs;
use courier_core::{Chat, HandlerError, Message, Update, UpdateContext};
use courier_framework::{Middleware, Router, boxed, compose, handler_fn};
use tower::ServiceExt;
use tower::limit::ConcurrencyLimitLayer;
use tracing::info;

fn from_chat(update_id: i64, chat_id: i64, text: &str) -> Arc<UpdateContext> {
    Arc::new(UpdateContext::new(
        Update::new(update_id).with_message(Message::new(1, Chat::new(chat_id)).with_text(text)),
    ))
}

#[tokio::test]
async fn stages_run_in_list_order() {
    let logs = CapturedLogs::new();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    let handler = boxed(handler_fn(|_ctx: Arc<UpdateContext>| async {
        info!("terminal handler executing");
        Ok(())
    }));
    let chain = compose(
        handler,
        [
            Middleware::request_log(),
            Middleware::access_control([42]),
            Middleware::timing(),
            Middleware::recovery(),
        ],
    );

    chain.oneshot(from_chat(1, 42, "hello")).await.unwrap();

    let received = logs.position("Received update").unwrap();
    let access = logs.position("Access granted").unwrap();
    let timer = logs.position("Timer started").unwrap();
    let handler = logs.position("terminal handler executing").unwrap();
    let finished = logs.position("Handler finished").unwrap();
    let success = logs.position("Handler executed successfully").unwrap();

    assert!(received < access);
    assert!(access < timer);
    assert!(timer < handler);
    assert!(handler < finished);
    assert!(finished < success);
}

#[tokio::test]
async fn denied_update_stops_before_inner_stages() {
    let logs = CapturedLogs::new();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    let counter = Arc::new(AtomicUsize::new(0));
    let handler_counter = Arc::clone(&counter);
    let handler = boxed(handler_fn(move |_ctx: Arc<UpdateContext>| {
        let counter = Arc::clone(&handler_counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }));
    let chain = compose(
        handler,
        [
            Middleware::request_log(),
            Middleware::access_control([42]),
            Middleware::timing(),
        ],
    );

    let err = chain.oneshot(from_chat(1, 7, "hello")).await.unwrap_err();

    assert!(matches!(err, HandlerError::AccessDenied { chat_id: 7 }));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(logs.position("Timer started").is_none());
    assert!(logs.position("Handler returned error").is_some());
}

#[tokio::test]
async fn router_terminates_a_full_chain() {
    let counter = Arc::new(AtomicUsize::new(0));
    let handler_counter = Arc::clone(&counter);

    let router = Router::new();
    router.handle_command(
        "/ping",
        handler_fn(move |ctx: Arc<UpdateContext>| {
            let counter = Arc::clone(&handler_counter);
            async move {
                assert!(ctx.correlation_id().is_some());
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    );

    let chain = compose(
        boxed(router.clone()),
        [
            Middleware::correlation(),
            Middleware::request_log(),
            Middleware::timing(),
            Middleware::recovery(),
        ],
    );

    chain.clone().oneshot(from_chat(1, 5, "/ping")).await.unwrap();
    chain.oneshot(from_chat(2, 5, "/pong")).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn readiness_gated_layer_runs_inside_builtin_stack() {
    let counter = Arc::new(AtomicUsize::new(0));
    let handler_counter = Arc::clone(&counter);
    let handler = boxed(handler_fn(move |_ctx: Arc<UpdateContext>| {
        let counter = Arc::clone(&handler_counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }));

    let chain = compose(
        handler,
        [
            Middleware::correlation(),
            Middleware::request_log(),
            Middleware::access_control([42]),
            Middleware::timing(),
            Middleware::recovery(),
            Middleware::from_layer("limit", ConcurrencyLimitLayer::new(1)),
        ],
    );

    chain.clone().oneshot(from_chat(1, 42, "first")).await.unwrap();
    chain.oneshot(from_chat(2, 42, "second")).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
