//! Per-call context for one update.
//!
//! One [`UpdateContext`] is created per inbound update and shared as
//! `Arc<UpdateContext>` by every middleware layer and the handler that
//! eventually runs. Middleware can write into it (the correlation layer
//! records its token here) and handlers read it back, so per-request data is
//! passed explicitly instead of through ambient state.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::Span;

use crate::model::{CallbackQuery, Message, Update};

/// The context handed to middleware and handlers.
pub struct UpdateContext {
    update: Update,
    correlation_id: RwLock<Option<String>>,
    received_at: Instant,
}

impl UpdateContext {
    /// Wraps a freshly received update.
    pub fn new(update: Update) -> Self {
        Self {
            update,
            correlation_id: RwLock::new(None),
            received_at: Instant::now(),
        }
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    pub fn update_id(&self) -> i64 {
        self.update.update_id
    }

    pub fn message(&self) -> Option<&Message> {
        self.update.message.as_ref()
    }

    pub fn callback_query(&self) -> Option<&CallbackQuery> {
        self.update.callback_query.as_ref()
    }

    /// Chat the update belongs to: the message's chat, or for a callback
    /// query the chat of the message carrying the pressed button.
    pub fn chat_id(&self) -> Option<i64> {
        self.message().map(|m| m.chat.id).or_else(|| {
            self.callback_query()
                .and_then(|q| q.message.as_ref())
                .map(|m| m.chat.id)
        })
    }

    /// Message text, empty when there is no message or no text.
    pub fn text(&self) -> &str {
        self.message().map(Message::text).unwrap_or_default()
    }

    /// Records the correlation token assigned to this update.
    pub fn set_correlation_id(&self, id: impl Into<String>) {
        *self.correlation_id.write() = Some(id.into());
    }

    /// The correlation token, if a correlation layer ran.
    pub fn correlation_id(&self) -> Option<String> {
        self.correlation_id.read().clone()
    }

    /// Time since the update was received.
    pub fn elapsed(&self) -> Duration {
        self.received_at.elapsed()
    }

    /// A span identifying this update in logs.
    pub fn span(&self) -> Span {
        match self.correlation_id() {
            Some(id) => tracing::info_span!(
                "update",
                update_id = self.update_id(),
                correlation_id = %id
            ),
            None => tracing::info_span!("update", update_id = self.update_id()),
        }
    }
}

impl From<Update> for UpdateContext {
    fn from(update: Update) -> Self {
        Self::new(update)
    }
}

impl std::fmt::Debug for UpdateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateContext")
            .field("update_id", &self.update_id())
            .field("correlation_id", &self.correlation_id())
            .finish_non_exhaustive()
    }
}
