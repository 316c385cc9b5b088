//! Configuration for a Courier bot.
//!
//! Settings are layered with figment (defaults, files, `COURIER_*` environment
//! variables, programmatic overrides) and checked by [`validate_config`]
//! before the runtime uses them.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AccessConfig, BotConfig, CourierConfig, IngestionConfig, IngestionMode, LogFormat, LogLevel,
    LogOutput, LoggingConfig, PollingConfig, SpanEventConfig, WebhookSettings,
};
pub use validation::validate_config;
