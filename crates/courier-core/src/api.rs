//! Transport capability traits.
//!
//! The dispatch pipeline never talks HTTP itself. It depends on these two
//! seams, implemented by `courier-transport`'s `BotClient` and by test doubles.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportResult;
use crate::model::{Message, Update, User};

/// Something that can hand out batches of pending updates.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetches up to `limit` updates with `update_id >= offset`, waiting up
    /// to `timeout_secs` for at least one to arrive. An `offset` of zero
    /// fetches everything still pending.
    async fn fetch_updates(
        &self,
        offset: i64,
        limit: u32,
        timeout_secs: u32,
    ) -> TransportResult<Vec<Update>>;
}

/// Outbound calls against the platform's Bot API.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Returns the bot's own account.
    async fn get_me(&self) -> TransportResult<User>;

    async fn send_message(&self, chat_id: i64, text: &str) -> TransportResult<Message>;

    /// Sends a message with an arbitrary `reply_markup` object.
    async fn send_message_with_markup(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Value,
    ) -> TransportResult<Message>;

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> TransportResult<Message>;

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> TransportResult<()>;

    /// Registers `url` as the push endpoint, disabling long polling upstream.
    async fn set_webhook(&self, url: &str) -> TransportResult<()>;

    /// Removes the push endpoint so long polling can be used.
    async fn delete_webhook(&self) -> TransportResult<()>;
}
