use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use courier_core::testing::CapturedLogs;
use courier_core::{
    Animation, CallbackQuery, Chat, Document, HandlerError, Message, Update, UpdateContext, User,
};
use courier_framework::{BoxedHandler, Router, boxed, handler_fn};
use tokio_test::{assert_ready_ok, task};
use tower::ServiceExt;

fn counting(counter: &Arc<AtomicUsize>) -> BoxedHandler {
    let counter = Arc::clone(counter);
    boxed(handler_fn(move |_ctx: Arc<UpdateContext>| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }))
}

fn text_update(id: i64, text: &str) -> Update {
    Update::new(id).with_message(Message::new(id, Chat::new(100)).with_text(text))
}

fn document_update(id: i64) -> Update {
    Update::new(id).with_message(Message::new(id, Chat::new(100)).with_document(Document {
        file_id: "BQACAgIAAxkBAAIB".into(),
        file_name: Some("notes.txt".into()),
        ..Default::default()
    }))
}

#[tokio::test]
async fn update_without_message_invokes_nothing() {
    let counter = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.handle_command("/start", counting(&counter));
    router.handle_document(counting(&counter));

    router.route_update(Update::new(1)).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn registered_command_runs_exactly_once() {
    let start = Arc::new(AtomicUsize::new(0));
    let help = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.handle_command("/start", counting(&start));
    router.handle_command("/help", counting(&help));

    router.route_update(text_update(1, "/start")).await.unwrap();

    assert_eq!(start.load(Ordering::SeqCst), 1);
    assert_eq!(help.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn command_key_is_the_entire_text() {
    let counter = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.handle_command("/echo", counting(&counter));

    router.route_update(text_update(1, "/echo hello")).await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    router.route_update(text_update(2, "/echo")).await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_command_warns_and_succeeds() {
    let logs = CapturedLogs::new();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    let counter = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.handle_command("/start", counting(&counter));

    router.route_update(text_update(1, "/foo")).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(logs.count_level("WARN"), 1);
    assert!(logs.contents().contains("No handler registered for command"));
}

#[tokio::test]
async fn command_text_never_falls_through_to_content_handlers() {
    let document = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.handle_document(counting(&document));

    let mut update = document_update(1);
    if let Some(message) = update.message.as_mut() {
        message.text = Some("/unknown".into());
    }
    router.route_update(update).await.unwrap();

    assert_eq!(document.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn document_handler_runs_for_document_message() {
    let counter = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.handle_document(counting(&counter));

    router.route_update(document_update(7)).await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn document_without_handlers_is_a_quiet_success() {
    let logs = CapturedLogs::new();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    let router = Router::new();
    router.route_update(document_update(7)).await.unwrap();

    assert_eq!(logs.count_level("WARN"), 0);
    assert_eq!(logs.count_level("ERROR"), 0);
    assert!(logs.contents().contains("Received message without command"));
}

#[tokio::test]
async fn document_wins_over_animation() {
    let document = Arc::new(AtomicUsize::new(0));
    let animation = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.handle_document(counting(&document));
    router.handle_animation(counting(&animation));

    let message = Message::new(1, Chat::new(1))
        .with_document(Document::default())
        .with_animation(Animation::default());
    router
        .route_update(Update::new(1).with_message(message))
        .await
        .unwrap();

    assert_eq!(document.load(Ordering::SeqCst), 1);
    assert_eq!(animation.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn animation_used_when_no_document_handler() {
    let animation = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.handle_animation(counting(&animation));

    let message = Message::new(1, Chat::new(1))
        .with_document(Document::default())
        .with_animation(Animation::default());
    router
        .route_update(Update::new(1).with_message(message))
        .await
        .unwrap();

    assert_eq!(animation.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn re_registration_replaces_previous_handler() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.handle_command("/start", counting(&first));
    router.handle_command("/start", counting(&second));

    router.route_update(text_update(1, "/start")).await.unwrap();

    assert_eq!(router.command_count(), 1);
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn callback_is_dispatched_by_token() {
    let refresh = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.handle_callback("refresh", counting(&refresh));

    let query = |data: &str| CallbackQuery {
        id: "cb".into(),
        from: User::default(),
        message: None,
        data: Some(data.into()),
    };

    router
        .route_update(Update::new(1).with_callback_query(query("refresh")))
        .await
        .unwrap();
    router
        .route_update(Update::new(2).with_callback_query(query("other")))
        .await
        .unwrap();

    assert_eq!(refresh.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn explicit_failure_is_returned_and_logged() {
    let logs = CapturedLogs::new();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    let router = Router::new();
    router.handle_command(
        "/fail",
        handler_fn(|_ctx: Arc<UpdateContext>| async { Err(HandlerError::failed("quota exceeded")) }),
    );

    let err = router.route_update(text_update(1, "/fail")).await.unwrap_err();

    assert_eq!(err.to_string(), "quota exceeded");
    assert_eq!(logs.count_level("ERROR"), 1);
}

#[tokio::test]
async fn panicking_handler_yields_error_and_one_error_log() {
    let logs = CapturedLogs::new();
    let _guard = tracing::subscriber::set_default(logs.subscriber());

    let router = Router::new();
    router.handle_command(
        "/crash",
        handler_fn(|ctx: Arc<UpdateContext>| async move {
            let items: Vec<i64> = Vec::new();
            let _ = items[ctx.update_id() as usize];
            Ok(())
        }),
    );

    let err = router.route_update(text_update(3, "/crash")).await.unwrap_err();

    assert!(err.is_panic());
    assert_eq!(logs.count_level("ERROR"), 1);

    // The router stays usable afterwards.
    router.route_update(text_update(4, "/other")).await.unwrap();
}

#[test]
fn router_service_is_always_ready() {
    let mut router = Router::new();
    let mut ready = task::spawn(ServiceExt::<Arc<UpdateContext>>::ready(&mut router));

    assert_ready_ok!(ready.poll());
}
