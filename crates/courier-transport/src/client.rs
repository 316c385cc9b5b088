//! Bot API HTTP client.
//!
//! Every call goes to `{api_url}/bot{token}/{method}` and decodes the
//! platform envelope:
//!
//! ```json
//! { "ok": true,  "result": ... }
//! { "ok": false, "error_code": 409, "description": "Conflict: ..." }
//! ```
//!
//! Calls run under the panic-safe invoker and are logged once on failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error, info};

use courier_core::{
    BotApi, Message, TransportError, TransportResult, Update, UpdateSource, User, recovery,
};

/// Public Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Default request timeout; must exceed the long-poll wait.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(75);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> TransportResult<T> {
        if !self.ok {
            return Err(TransportError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self.description.unwrap_or_default(),
            });
        }
        self.result
            .ok_or_else(|| TransportError::Decode("response has no result".into()))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`BotClient`].
#[derive(Debug, Clone)]
pub struct BotClientBuilder {
    token: String,
    api_url: String,
    timeout: Duration,
}

impl BotClientBuilder {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Overrides the API base URL (self-hosted API servers, tests).
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> TransportResult<BotClient> {
        let http = ClientBuilder::new()
            .timeout(self.timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(BotClient {
            http,
            api_url: self.api_url.trim_end_matches('/').to_string(),
            token: self.token,
        })
    }
}

// =============================================================================
// BotClient
// =============================================================================

/// Client for the platform's Bot API.
#[derive(Clone)]
pub struct BotClient {
    http: Client,
    api_url: String,
    token: String,
}

impl BotClient {
    /// Creates a client against the public API with default settings.
    pub fn new(token: impl Into<String>) -> TransportResult<Self> {
        Self::builder(token).build()
    }

    pub fn builder(token: impl Into<String>) -> BotClientBuilder {
        BotClientBuilder::new(token)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Sends `request`, bracketed by the invoker, and logs a failure once.
    async fn call<T>(&self, method: &'static str, request: RequestBuilder) -> TransportResult<T>
    where
        T: DeserializeOwned,
    {
        let result = match recovery::invoke(Self::execute::<T>(request)).await {
            Ok(result) => result,
            Err(panicked) => Err(panicked.into()),
        };

        match &result {
            Ok(_) => debug!(method, "API call succeeded"),
            Err(e) => error!(method, error = %e, "API call failed"),
        }
        result
    }

    async fn execute<T>(request: RequestBuilder) -> TransportResult<T>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        if !status.is_success() {
            // Error responses usually still carry the envelope.
            return match serde_json::from_slice::<ApiResponse<Value>>(&body) {
                Ok(envelope) if !envelope.ok => Err(TransportError::Api {
                    code: envelope.error_code.unwrap_or(i64::from(status.as_u16())),
                    description: envelope.description.unwrap_or_default(),
                }),
                _ => Err(TransportError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                }),
            };
        }

        serde_json::from_slice::<ApiResponse<T>>(&body)?.into_result()
    }

    /// Long-polls for pending updates. An `offset` of zero is omitted so the
    /// remote returns everything still unconfirmed.
    pub async fn get_updates(
        &self,
        offset: i64,
        limit: u32,
        timeout_secs: u32,
    ) -> TransportResult<Vec<Update>> {
        let mut query = vec![
            ("limit", limit.to_string()),
            ("timeout", timeout_secs.to_string()),
        ];
        if offset > 0 {
            query.push(("offset", offset.to_string()));
        }

        let request = self.http.get(self.method_url("getUpdates")).query(&query);
        let updates: Vec<Update> = self.call("getUpdates", request).await?;
        debug!(offset, count = updates.len(), "Fetched updates");
        Ok(updates)
    }
}

impl std::fmt::Debug for BotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl UpdateSource for BotClient {
    async fn fetch_updates(
        &self,
        offset: i64,
        limit: u32,
        timeout_secs: u32,
    ) -> TransportResult<Vec<Update>> {
        self.get_updates(offset, limit, timeout_secs).await
    }
}

#[async_trait]
impl BotApi for BotClient {
    async fn get_me(&self) -> TransportResult<User> {
        self.call("getMe", self.http.get(self.method_url("getMe")))
            .await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> TransportResult<Message> {
        let request = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": text }));
        let message: Message = self.call("sendMessage", request).await?;
        info!(chat_id, message_id = message.message_id, "Sent message");
        Ok(message)
    }

    async fn send_message_with_markup(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Value,
    ) -> TransportResult<Message> {
        let request = self.http.post(self.method_url("sendMessage")).json(&json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": reply_markup,
        }));
        let message: Message = self.call("sendMessage", request).await?;
        info!(chat_id, message_id = message.message_id, "Sent message with markup");
        Ok(message)
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> TransportResult<Message> {
        let request = self.http.post(self.method_url("editMessageText")).json(&json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        }));
        let message: Message = self.call("editMessageText", request).await?;
        info!(chat_id, message_id, "Edited message");
        Ok(message)
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> TransportResult<()> {
        let mut body = json!({ "callback_query_id": callback_query_id });
        if let Some(text) = text {
            body["text"] = Value::from(text);
        }
        let request = self
            .http
            .post(self.method_url("answerCallbackQuery"))
            .json(&body);
        let _: bool = self.call("answerCallbackQuery", request).await?;
        Ok(())
    }

    async fn set_webhook(&self, url: &str) -> TransportResult<()> {
        let request = self
            .http
            .post(self.method_url("setWebhook"))
            .json(&json!({ "url": url }));
        let _: bool = self.call("setWebhook", request).await?;
        info!(url, "Webhook set");
        Ok(())
    }

    async fn delete_webhook(&self) -> TransportResult<()> {
        let request = self.http.get(self.method_url("deleteWebhook"));
        let _: bool = self.call("deleteWebhook", request).await?;
        info!("Webhook deleted");
        Ok(())
    }
}
