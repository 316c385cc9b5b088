//! # Courier
//!
//! A bot framework for Telegram-style Bot APIs built on tokio and tower.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌───────────────────────────┐     ┌────────┐     ┌─────────┐
//! │ Poller / Webhook │────▶│ correlation → request_log │────▶│ Router │────▶│ Handler │
//! │   (transport)    │     │ → access → timing → recov │     │        │     │         │
//! └──────────────────┘     └───────────────────────────┘     └────────┘     └─────────┘
//! ```
//!
//! - **Runtime**: loads configuration, initialises logging, picks the
//!   ingestion path and handles shutdown signals
//! - **Transport**: the Bot API client, the long-poll loop, the webhook
//!   receiver
//! - **Middleware**: tower layers wrapped around every update
//! - **Router**: at most one handler per update, chosen by command, callback
//!   data or content type
//! - **Handlers**: `async fn(Arc<UpdateContext>) -> HandlerResult`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! async fn ping(ctx: Arc<UpdateContext>) -> HandlerResult {
//!     info!(chat_id = ?ctx.chat_id(), "pong");
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::new();
//!     runtime.router().handle_command("/ping", handler_fn(ping));
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): `courier.toml` configuration files
//! - `yaml-config`: `courier.yaml` configuration files
//! - `json-log`: JSON log output

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;
pub use courier_transport as transport;

/// Commonly used types for building a bot.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime
    pub use courier_runtime::{CourierConfig, CourierRuntime, RuntimeError};

    // Handlers and routing
    pub use courier_framework::{BoxedHandler, Middleware, Router, boxed, compose, handler_fn};

    // Update model and per-call context
    pub use courier_core::{
        BotApi, CallbackQuery, Chat, HandlerError, HandlerResult, Message, Update,
        UpdateContext, User,
    };

    // Outbound client
    pub use courier_transport::BotClient;

    // Logging
    pub use courier_runtime::prelude::*;
}
