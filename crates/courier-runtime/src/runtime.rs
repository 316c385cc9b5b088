//! Runtime orchestration.
//!
//! [`CourierRuntime`] ties configuration, logging, the Bot API client, the
//! [`Router`] and the middleware stack together, and runs whichever
//! ingestion path the configuration selects until shutdown.
//!
//! ```rust,ignore
//! let runtime = CourierRuntime::builder()
//!     .config_file("courier.toml")
//!     .build()?;
//!
//! runtime.router().handle_command("/start", handler_fn(start));
//! runtime.run().await?;
//! ```
//!
//! The handler chain for every update is, outermost first:
//!
//! ```text
//! correlation → request_log → access_control (if configured) → timing
//!     → recovery → user middleware → router
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use courier_core::{BotApi, TransportResult};
use courier_framework::{BoxedHandler, Middleware, Router, boxed, compose};
use courier_transport::{BotClient, Poller, WebhookReceiver};

use crate::config::{
    ConfigError, ConfigLoader, ConfigResult, CourierConfig, IngestionMode, validate_config,
};
use crate::error::RuntimeResult;
use crate::logging;

/// A configured bot, ready to run.
pub struct CourierRuntime {
    config: CourierConfig,
    router: Router,
    middleware: Vec<Middleware>,
    client: TransportResult<BotClient>,
}

impl CourierRuntime {
    /// Loads configuration from the default locations, falling back to the
    /// built-in defaults when loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new().load_validated().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config ({e}), using defaults");
            CourierConfig::default()
        });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Initializes logging and the Bot API client from `config`.
    pub fn from_config(config: &CourierConfig) -> Self {
        logging::init_from_config(&config.logging);

        let client = BotClient::builder(config.bot.token.clone())
            .api_url(config.bot.api_url.clone())
            .timeout(config.bot.request_timeout())
            .build();
        if let Err(e) = &client {
            error!(error = %e, "Failed to build Bot API client");
        }

        info!(
            mode = %config.ingestion.mode,
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            router: Router::new(),
            middleware: Vec::new(),
            client,
        }
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// The dispatch table. Handlers may be registered before or during
    /// [`run`](Self::run).
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// A client for outbound calls from handlers.
    pub fn client(&self) -> TransportResult<BotClient> {
        self.client.clone()
    }

    /// Appends middleware inside the built-in stack, nearest the router.
    pub fn add_middleware(&mut self, middleware: Middleware) {
        self.middleware.push(middleware);
    }

    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.add_middleware(middleware);
        self
    }

    /// The full handler chain ending in the router.
    pub fn handler(&self) -> BoxedHandler {
        let allowed = &self.config.access.allowed_chat_ids;

        let mut stack = vec![Middleware::correlation(), Middleware::request_log()];
        if !allowed.is_empty() {
            stack.push(Middleware::access_control(allowed.iter().copied()));
        }
        stack.push(Middleware::timing());
        stack.push(Middleware::recovery());
        stack.extend(self.middleware.iter().cloned());

        compose(boxed(self.router.clone()), stack)
    }

    // =========================================================================
    // Running
    // =========================================================================

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        if self.config.bot.token.is_empty() {
            return Err(ConfigError::missing_field("bot.token").into());
        }
        validate_config(&self.config)?;
        let client = self.client()?;

        match self.config.ingestion.mode {
            IngestionMode::Polling => self.run_polling(client, shutdown).await,
            IngestionMode::Webhook => self.run_webhook(client, shutdown).await,
        }
    }

    async fn run_polling<F>(&self, client: BotClient, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        // getUpdates is refused while a webhook is registered.
        client.delete_webhook().await?;

        let poller = Poller::new(
            Arc::new(client),
            self.handler(),
            self.config.polling.to_poller_config(),
        );
        let token = CancellationToken::new();
        poller.start(&token)?;

        info!("Courier is running in polling mode. Press Ctrl+C to stop.");
        shutdown.await;

        poller.stop()?;
        poller.join().await;
        info!(offset = poller.offset(), "Polling stopped");
        Ok(())
    }

    async fn run_webhook<F>(&self, client: BotClient, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let settings = &self.config.webhook;
        let public_url = settings
            .public_url
            .as_deref()
            .ok_or_else(|| ConfigError::missing_field("webhook.public_url"))?;

        let bound = WebhookReceiver::new(settings.to_webhook_config())
            .bind(&settings.listen_addr)
            .await?;
        client.set_webhook(public_url).await?;

        info!(
            addr = %bound.local_addr(),
            url = public_url,
            "Courier is running in webhook mode. Press Ctrl+C to stop."
        );

        let token = CancellationToken::new();
        let serve = bound.serve(token.clone(), self.handler());
        tokio::pin!(serve);

        tokio::select! {
            result = &mut serve => {
                warn!("Webhook server exited before shutdown was requested");
                return result.map_err(Into::into);
            }
            _ = shutdown => token.cancel(),
        }

        serve.await?;
        Ok(())
    }
}

impl Default for CourierRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CourierRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierRuntime")
            .field("mode", &self.config.ingestion.mode)
            .field("router", &self.router)
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}

/// Completes on Ctrl+C, or SIGTERM on Unix.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal as unix_signal};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builds a [`CourierRuntime`] from a customised [`ConfigLoader`].
pub struct RuntimeBuilder {
    loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
        }
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Layers programmatic overrides above every other source.
    pub fn merge<T: serde::Serialize>(mut self, overrides: T) -> Self {
        self.loader = self.loader.merge(overrides);
        self
    }

    /// Loads and validates the configuration, then builds the runtime.
    pub fn build(self) -> ConfigResult<CourierRuntime> {
        let config = self.loader.load_validated()?;
        Ok(CourierRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
