//! Configuration validation.
//!
//! Unknown enum values (log level, format, ingestion mode) are already
//! rejected when the configuration is extracted; this module checks the
//! cross-field and range constraints serde cannot express.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CourierConfig, IngestionMode, LoggingConfig, PollingConfig, WebhookSettings};

/// Validates the entire configuration.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    validate_logging(&config.logging)?;

    match config.ingestion.mode {
        IngestionMode::Polling => {
            validate_polling(&config.polling)?;
            if config.bot.request_timeout_secs <= u64::from(config.polling.timeout_secs) {
                return Err(ConfigError::validation(format!(
                    "bot.request_timeout_secs ({}) must exceed polling.timeout_secs ({})",
                    config.bot.request_timeout_secs, config.polling.timeout_secs
                )));
            }
        }
        IngestionMode::Webhook => validate_webhook(&config.webhook)?,
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.filters.keys().any(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation("Log filter targets cannot be empty"));
    }
    Ok(())
}

fn validate_polling(polling: &PollingConfig) -> ConfigResult<()> {
    if !(1..=100).contains(&polling.limit) {
        return Err(ConfigError::validation(format!(
            "polling.limit must be between 1 and 100, got {}",
            polling.limit
        )));
    }

    if polling.interval_ms == 0 {
        return Err(ConfigError::validation(
            "polling.interval_ms must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_webhook(webhook: &WebhookSettings) -> ConfigResult<()> {
    if webhook.listen_addr.is_empty() {
        return Err(ConfigError::missing_field("webhook.listen_addr"));
    }

    validate_path(&webhook.path)?;

    let url = webhook
        .public_url
        .as_deref()
        .ok_or_else(|| ConfigError::missing_field("webhook.public_url"))?;
    validate_url(url)?;

    if webhook.shutdown_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "webhook.shutdown_timeout_secs must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_url(url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field("webhook.public_url"));
    }

    const SCHEMES: [&str; 2] = ["http://", "https://"];
    if !SCHEMES.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {:?}", SCHEMES),
        ));
    }

    Ok(())
}

fn validate_path(path: &str) -> ConfigResult<()> {
    if !path.starts_with('/') {
        return Err(ConfigError::validation("webhook.path must start with '/'"));
    }
    Ok(())
}
