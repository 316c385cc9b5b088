//! Webhook receiver.
//!
//! Push ingestion over a single HTTP endpoint:
//!
//! | Request                  | Response            | Handler invoked |
//! |--------------------------|---------------------|-----------------|
//! | `POST`, valid update     | `200` + `OK`        | yes             |
//! | `POST`, malformed body   | `400`, empty body   | no              |
//! | any other method         | `405`, empty body   | no              |
//!
//! The acknowledgment never depends on what the handler does: a failure or
//! panic inside it is logged and absorbed, so the platform does not retry.
//!
//! Shutdown is a bounded drain: when the shutdown token fires, the listener
//! stops accepting, in-flight requests get [`WebhookConfig::shutdown_timeout`]
//! to finish, and anything still running after that is aborted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{error, info, warn};

use courier_core::{Update, UpdateContext, recovery};
use courier_framework::BoxedHandler;

/// Literal acknowledgment body.
pub const ACK_BODY: &str = "OK";

/// Largest update body read, matching axum's default body limit.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Receiver settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Endpoint path. `/` accepts every path.
    pub path: String,
    /// Upper bound on the graceful drain.
    pub shutdown_timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("webhook server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("webhook server task failed: {0}")]
    Task(String),

    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}

pub type WebhookResult<T> = Result<T, WebhookError>;

#[derive(Clone)]
struct WebhookState {
    handler: BoxedHandler,
}

// =============================================================================
// WebhookReceiver
// =============================================================================

/// HTTP endpoint feeding pushed updates into a handler.
#[derive(Debug, Clone, Default)]
pub struct WebhookReceiver {
    config: WebhookConfig,
}

impl WebhookReceiver {
    pub fn new(config: WebhookConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Builds the axum application serving the endpoint.
    pub fn router(&self, handler: BoxedHandler) -> Router {
        let state = Arc::new(WebhookState { handler });
        let path = normalize_path(&self.config.path);

        if path == "/" {
            Router::new().fallback(receive).with_state(state)
        } else {
            Router::new().route(&path, any(receive)).with_state(state)
        }
    }

    /// Binds the listening socket without serving yet.
    pub async fn bind(self, addr: &str) -> WebhookResult<BoundWebhook> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| WebhookError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        Ok(BoundWebhook {
            receiver: self,
            listener,
            local_addr,
        })
    }

    /// Binds `addr` and serves until `shutdown` fires.
    pub async fn listen_and_serve(
        self,
        shutdown: CancellationToken,
        addr: &str,
        handler: BoxedHandler,
    ) -> WebhookResult<()> {
        self.bind(addr).await?.serve(shutdown, handler).await
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

// =============================================================================
// BoundWebhook
// =============================================================================

/// A receiver with its socket bound.
#[derive(Debug)]
pub struct BoundWebhook {
    receiver: WebhookReceiver,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BoundWebhook {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves on a separate task until `shutdown` fires, then drains.
    pub async fn serve(self, shutdown: CancellationToken, handler: BoxedHandler) -> WebhookResult<()> {
        let app = self.receiver.router(handler);
        let timeout = self.receiver.config.shutdown_timeout;
        let drain = CancellationToken::new();

        info!(
            addr = %self.local_addr,
            path = %self.receiver.config.path,
            "Webhook server listening"
        );

        let server = axum::serve(self.listener, app)
            .with_graceful_shutdown(drain.clone().cancelled_owned());
        let mut task = tokio::spawn(server.into_future());

        tokio::select! {
            finished = &mut task => {
                return match finished {
                    Ok(result) => result.map_err(WebhookError::from),
                    Err(e) => Err(WebhookError::Task(e.to_string())),
                };
            }
            _ = shutdown.cancelled() => {}
        }

        info!(timeout_ms = timeout.as_millis() as u64, "Shutting down webhook server");
        drain.cancel();

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => {
                info!("Webhook server stopped");
                result.map_err(WebhookError::from)
            }
            Ok(Err(e)) => Err(WebhookError::Task(e.to_string())),
            Err(_) => {
                task.abort();
                warn!(timeout_ms = timeout.as_millis() as u64, "Webhook drain timed out");
                Err(WebhookError::ShutdownTimeout(timeout))
            }
        }
    }
}

// =============================================================================
// Request handling
// =============================================================================

async fn receive(
    State(state): State<Arc<WebhookState>>,
    request: Request,
) -> Response {
    // Other methods are refused before the body is touched.
    if request.method() != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let body = match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            error!(error = %e, "Failed to read webhook body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            error!(error = %e, len = body.len(), "Failed to decode webhook update");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let update_id = update.update_id;
    info!(update_id, "Webhook update received");

    let ctx = Arc::new(UpdateContext::new(update));
    if let Ok(Err(e)) = recovery::invoke(state.handler.clone().oneshot(ctx)).await {
        error!(update_id, error = %e, "Webhook handler failed");
    }

    (StatusCode::OK, ACK_BODY).into_response()
}
