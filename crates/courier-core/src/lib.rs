//! # Courier Core
//!
//! The foundation of the Courier bot framework.
//!
//! This crate owns everything the ingestion-and-dispatch pipeline agrees on:
//!
//! - **Data model**: [`Update`], [`Message`], [`Chat`] and the typed content
//!   payloads the router inspects.
//! - **Per-call context**: [`UpdateContext`], the object handed to every
//!   middleware and handler for one update.
//! - **Error taxonomy**: [`TransportError`] for fetch/send failures and
//!   [`HandlerError`] for everything a handler invocation can return.
//! - **Panic containment**: [`recovery::invoke`] runs a unit of work and turns
//!   a panic into a logged [`Panicked`] value instead of unwinding further.
//! - **Correlation**: [`generate_correlation_id`] for cross-log correlation.
//! - **Transport seams**: the [`UpdateSource`] and [`BotApi`] traits
//!   implemented by `courier-transport`.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌────────┐     ┌─────────┐
//! │ Poller /     │────▶│ Middleware chain │────▶│ Router │────▶│ Handler │
//! │ Webhook      │     │  (tower layers)  │     │        │     │         │
//! └──────────────┘     └──────────────────┘     └────────┘     └─────────┘
//!        ▲                                                          │
//!        └───────────── recovery::invoke brackets each call ────────┘
//! ```

pub mod api;
pub mod context;
pub mod correlation;
pub mod error;
pub mod model;
pub mod recovery;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use api::{BotApi, UpdateSource};
pub use context::UpdateContext;
pub use correlation::{generate_correlation_id, with_timeout_and_correlation};
pub use error::{HandlerError, HandlerResult, TransportError, TransportResult};
pub use model::{
    Animation, Audio, CallbackQuery, Chat, Contact, Document, Location, Message, Update, User,
    Video,
};
pub use recovery::Panicked;
