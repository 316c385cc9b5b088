//! # Courier Transport
//!
//! Network side of the Courier bot framework: the Bot API client and the two
//! ingestion paths that feed updates into a handler chain.
//!
//! ## Features
//!
//! - `http-client`: [`BotClient`], the outbound Bot API client, which is also
//!   the production [`UpdateSource`](courier_core::UpdateSource)
//! - `http-server`: [`WebhookReceiver`], push ingestion over axum
//! - `full`: both
//!
//! The [`Poller`] is always available; it only needs an `UpdateSource`.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐   fetch_updates   ┌──────────┐
//! │ Poller (tick loop) │ ◀──────────────── │ BotClient│ ◀── getUpdates
//! └─────────┬──────────┘                   └──────────┘
//!           │                    ┌──────────────────┐
//!           ├───────────────────▶│ BoxedHandler     │
//!           │                    │ (middleware +    │
//! ┌─────────┴──────────┐         │  router)         │
//! │ WebhookReceiver    │────────▶└──────────────────┘
//! └────────────────────┘ POST /
//! ```
//!
//! The two paths are mutually exclusive upstream: `set_webhook` disables
//! `getUpdates` and `delete_webhook` re-enables it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier_transport::{BotClient, Poller, PollerConfig};
//!
//! let client = Arc::new(BotClient::new(token)?);
//! let poller = Poller::new(client, boxed(router.clone()), PollerConfig::default());
//! poller.start(&shutdown)?;
//! ```

#[cfg(feature = "http-client")]
pub mod client;
pub mod poller;
#[cfg(feature = "http-server")]
pub mod webhook;

pub use poller::{Poller, PollerConfig, PollerError, PollerState};

#[cfg(feature = "http-client")]
pub use client::{BotClient, BotClientBuilder, DEFAULT_API_URL, DEFAULT_REQUEST_TIMEOUT};

#[cfg(feature = "http-server")]
pub use webhook::{
    ACK_BODY, BoundWebhook, WebhookConfig, WebhookError, WebhookReceiver, WebhookResult,
};
