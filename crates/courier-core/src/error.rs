//! Unified error types for the Courier core.

use thiserror::Error;

use crate::recovery::Panicked;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised while talking to the remote platform, in either direction.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The HTTP request could not be sent or its response not read.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The remote answered with a non-success status and no usable envelope.
    #[error("unexpected HTTP status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The remote answered with `ok: false`.
    #[error("API error ({code}): {description}")]
    Api {
        /// Platform error code, `0` when the remote did not send one.
        code: i64,
        /// Human-readable reason supplied by the remote.
        description: String,
    },

    /// The response body was not the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The call panicked inside the client.
    #[error("transport call panicked: {0}")]
    Panicked(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<Panicked> for TransportError {
    fn from(panicked: Panicked) -> Self {
        Self::Panicked(panicked.message)
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

// =============================================================================
// Handler Errors
// =============================================================================

/// Everything a handler invocation boundary can return.
///
/// Handlers, middleware and the router all speak this type, so a fault deep
/// inside a handler surfaces as an ordinary value rather than an unwinding
/// panic.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// The handler reported a failure explicitly.
    #[error("{0}")]
    Failed(String),

    /// The handler panicked; the panic was contained.
    #[error("handler panicked: {message}")]
    Panicked {
        /// Textual description of the panic payload.
        message: String,
    },

    /// Access control rejected the update's chat.
    #[error("access denied for chat {chat_id}")]
    AccessDenied {
        /// The rejected chat.
        chat_id: i64,
    },

    /// The update carries no message to inspect.
    #[error("update has no message")]
    MissingMessage,

    /// An outbound call made by the handler failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HandlerError {
    /// Creates an explicit handler failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns `true` if this error stands for a contained panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }
}

impl From<Panicked> for HandlerError {
    fn from(panicked: Panicked) -> Self {
        Self::Panicked {
            message: panicked.message,
        }
    }
}

/// Result type returned by every handler and middleware.
pub type HandlerResult = Result<(), HandlerError>;
