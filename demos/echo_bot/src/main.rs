//! Echo Bot Example
//!
//! A small demonstration of Courier: commands, an inline keyboard with
//! callback handlers, a document handler and one custom middleware.
//!
//! # Routing
//!
//! The router picks at most one handler per update:
//!
//! ```text
//! Update
//! ├── callback_query.data  → "menu:ping" | "menu:about"
//! └── message
//!     ├── text == "/start" | "/help" | "/ping" | "/menu"
//!     └── document         → document handler
//! ```
//!
//! # Usage
//!
//! ```bash
//! COURIER_BOT__TOKEN=123456:ABC cargo run --package echo-bot
//! cargo run --package echo-bot -- --config courier.toml --profile dev
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use clap::Parser;
use courier::prelude::*;
use serde_json::json;
use tower::ServiceExt;
use tracing::{debug, error, info};

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "A small command bot built on Courier")]
struct Args {
    /// Configuration file, instead of searching the default locations.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `dev` or `prod`.
    #[arg(short, long)]
    profile: Option<String>,
}

const HELP_TEXT: &str = "Echo Bot - Commands
/start - Greeting
/help  - This help
/ping  - Pong!
/menu  - Inline keyboard

Send a file and I will describe it.";

// ============================================================================
// Handlers
// ============================================================================

/// Builds a handler that answers with a fixed text.
fn reply(client: BotClient, text: &'static str) -> BoxedHandler {
    boxed(handler_fn(move |ctx: Arc<UpdateContext>| {
        let client = client.clone();
        async move {
            let chat_id = ctx.chat_id().ok_or(HandlerError::MissingMessage)?;
            client.send_message(chat_id, text).await?;
            Ok(())
        }
    }))
}

/// `/start` greets the sender by name.
fn start(client: BotClient) -> BoxedHandler {
    boxed(handler_fn(move |ctx: Arc<UpdateContext>| {
        let client = client.clone();
        async move {
            let message = ctx.message().ok_or(HandlerError::MissingMessage)?;
            let name = message
                .from
                .as_ref()
                .map(|user| user.first_name.as_str())
                .filter(|name| !name.is_empty())
                .unwrap_or("there");

            client
                .send_message(message.chat.id, &format!("Hello, {name}! Try /help."))
                .await?;
            Ok(())
        }
    }))
}

/// `/menu` sends an inline keyboard whose buttons route to the callbacks.
fn menu(client: BotClient) -> BoxedHandler {
    boxed(handler_fn(move |ctx: Arc<UpdateContext>| {
        let client = client.clone();
        async move {
            let chat_id = ctx.chat_id().ok_or(HandlerError::MissingMessage)?;
            let keyboard = json!({
                "inline_keyboard": [[
                    { "text": "Ping", "callback_data": "menu:ping" },
                    { "text": "About", "callback_data": "menu:about" },
                ]]
            });

            client
                .send_message_with_markup(chat_id, "Pick one:", keyboard)
                .await?;
            Ok(())
        }
    }))
}

/// Answers a button press and rewrites the menu message in place.
fn menu_choice(client: BotClient, answer: &'static str) -> BoxedHandler {
    boxed(handler_fn(move |ctx: Arc<UpdateContext>| {
        let client = client.clone();
        async move {
            let Some(query) = ctx.callback_query() else {
                return Ok(());
            };

            client.answer_callback_query(&query.id, Some(answer)).await?;

            if let Some(message) = &query.message {
                client
                    .edit_message_text(message.chat.id, message.message_id, answer)
                    .await?;
            }
            Ok(())
        }
    }))
}

/// Describes any received document.
fn document(client: BotClient) -> BoxedHandler {
    boxed(handler_fn(move |ctx: Arc<UpdateContext>| {
        let client = client.clone();
        async move {
            let message = ctx.message().ok_or(HandlerError::MissingMessage)?;
            let Some(doc) = &message.document else {
                return Ok(());
            };

            let text = format!(
                "Got a file\n\
                • Name: {}\n\
                • Type: {}\n\
                • Size: {} bytes",
                doc.file_name.as_deref().unwrap_or("unnamed"),
                doc.mime_type.as_deref().unwrap_or("unknown"),
                doc.file_size.unwrap_or_default(),
            );

            client.send_message(message.chat.id, &text).await?;
            Ok(())
        }
    }))
}

// ============================================================================
// Middleware
// ============================================================================

/// Counts every update that reaches the router.
fn update_counter() -> Middleware {
    let seen = Arc::new(AtomicU64::new(0));

    Middleware::new("update_counter", move |inner: BoxedHandler| {
        let seen = Arc::clone(&seen);
        boxed(inner.map_request(move |ctx: Arc<UpdateContext>| {
            let total = seen.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(total, update_id = ctx.update_id(), "Update counted");
            ctx
        }))
    })
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = CourierRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }

    let runtime = builder.build()?.with_middleware(update_counter());
    let client = runtime.client()?;

    match client.get_me().await {
        Ok(me) => info!(id = me.id, username = ?me.username, "Authorized"),
        Err(e) => error!(error = %e, "getMe failed, continuing anyway"),
    }

    let router = runtime.router();
    router.handle_command("/start", start(client.clone()));
    router.handle_command("/help", reply(client.clone(), HELP_TEXT));
    router.handle_command("/ping", reply(client.clone(), "Pong!"));
    router.handle_command("/menu", menu(client.clone()));
    router.handle_callback("menu:ping", menu_choice(client.clone(), "Pong!"));
    router.handle_callback(
        "menu:about",
        menu_choice(client.clone(), "Echo Bot, running on Courier"),
    );
    router.handle_document(document(client));

    runtime.run().await?;

    Ok(())
}
