//! Runtime error types.

use thiserror::Error;

use courier_core::TransportError;
use courier_transport::{PollerError, WebhookError};

use crate::config::ConfigError;

/// Errors that end [`CourierRuntime::run`](crate::CourierRuntime::run).
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Creating the client or an ingestion-switching call failed.
    #[error("Bot API error: {0}")]
    Api(#[from] TransportError),

    #[error("Poller error: {0}")]
    Poller(#[from] PollerError),

    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
