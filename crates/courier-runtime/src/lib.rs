//! Courier Runtime - orchestration layer for the Courier bot framework.
//!
//! This crate provides:
//! - Layered configuration ([`config`]) with figment: files, `COURIER_*`
//!   environment variables and programmatic overrides
//! - Logging initialisation ([`logging`])
//! - [`CourierRuntime`], which owns the router and middleware stack and runs
//!   polling or webhook ingestion until shutdown
//!
//! ```ignore
//! use courier_runtime::CourierRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::new();
//!     runtime.router().handle_command("/ping", handler_fn(ping));
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, CourierConfig, IngestionMode, load_config,
    load_config_from_file, validate_config,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{CourierRuntime, RuntimeBuilder, wait_for_shutdown};

// Re-export tracing for use by applications
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and span helpers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
