//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why a [`CourierConfig`](super::CourierConfig) could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {} does not exist", path.display())]
    FileNotFound { path: PathBuf },

    /// A file, environment variable or override did not fit the schema.
    #[error("config could not be parsed: {0}")]
    ParseError(String),

    #[error("config rejected: {message}")]
    ValidationError { message: String },

    /// A key the selected ingestion mode needs is empty or absent.
    #[error("`{field}` must be set")]
    MissingField { field: String },

    #[error("`{url}` is not a usable URL: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
