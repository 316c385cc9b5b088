//! Configuration schema definitions.
//!
//! ```toml
//! [bot]
//! token = "123456:ABC"
//!
//! [ingestion]
//! mode = "webhook"
//!
//! [webhook]
//! listen_addr = "0.0.0.0:8443"
//! public_url = "https://bot.example.com/hook"
//! path = "/hook"
//!
//! [access]
//! allowed_chat_ids = [42, -1001234567890]
//!
//! [logging]
//! level = "debug"
//! filters = { hyper = "warn" }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use courier_transport::{DEFAULT_API_URL, PollerConfig, WebhookConfig};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CourierConfig {
    pub bot: BotConfig,
    pub ingestion: IngestionConfig,
    pub polling: PollingConfig,
    pub webhook: WebhookSettings,
    pub access: AccessConfig,
    pub logging: LoggingConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// Bot API credentials and client settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Bot token issued by the platform. Required to run.
    pub token: String,
    pub api_url: String,
    /// HTTP timeout for every API call. Must exceed the long-poll wait.
    pub request_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 75,
        }
    }
}

impl BotConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("BotConfig")
            .field("token", &token)
            .field("api_url", &self.api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

// =============================================================================
// Ingestion
// =============================================================================

/// Which ingestion path feeds the router. The two are mutually exclusive
/// upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionMode {
    #[default]
    Polling,
    Webhook,
}

impl fmt::Display for IngestionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polling => f.write_str("polling"),
            Self::Webhook => f.write_str("webhook"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub mode: IngestionMode,
}

/// Long-poll settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Updates per fetch, 1..=100.
    pub limit: u32,
    /// Long-poll wait passed to `getUpdates`.
    pub timeout_secs: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            limit: 100,
            timeout_secs: 60,
        }
    }
}

impl PollingConfig {
    pub fn to_poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.interval_ms),
            limit: self.limit,
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Webhook receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub listen_addr: String,
    /// Endpoint path. `/` accepts every path.
    pub path: String,
    /// Public HTTPS URL registered with `setWebhook`.
    pub public_url: Option<String>,
    pub shutdown_timeout_secs: u64,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8443".to_string(),
            path: "/".to_string(),
            public_url: None,
            shutdown_timeout_secs: 5,
        }
    }
}

impl WebhookSettings {
    pub fn to_webhook_config(&self) -> WebhookConfig {
        WebhookConfig {
            path: self.path.clone(),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        }
    }
}

/// Chat allow list. Empty disables access control.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub allowed_chat_ids: Vec<i64>,
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Target file when `output = "file"`.
    pub file_path: Option<PathBuf>,
    pub span_events: SpanEventConfig,
    /// Per-target levels, e.g. `{ courier_transport = "debug" }`.
    pub filters: HashMap<String, LogLevel>,
    pub thread_ids: bool,
    /// Include file name and line number.
    pub file_location: bool,
}
