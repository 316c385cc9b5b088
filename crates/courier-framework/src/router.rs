//! Update router.
//!
//! The router owns the dispatch table and picks **at most one** handler per
//! update:
//!
//! ```text
//! update ─┬─ callback_query? ──▶ callbacks[data]       (unknown → warn, Ok)
//!         ├─ no message?     ──▶ Ok, nothing to do
//!         ├─ text starts '/' ──▶ commands[whole text]  (unknown → warn, Ok)
//!         ├─ document?       ──▶ document slot
//!         ├─ animation?      ──▶ animation slot
//!         └─ otherwise       ──▶ debug, Ok
//! ```
//!
//! Unmatched traffic is expected on an uncurated stream and is never an
//! error. Every matched handler runs under the panic-safe invoker: a panic
//! is logged once by the invoker and returned as [`HandlerError::Panicked`];
//! an explicit failure is logged here and returned.
//!
//! The table sits behind read/write locks, so handlers may be (re)registered
//! while updates are being routed. Registration overwrites silently.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::RwLock;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, warn};

use courier_core::{HandlerError, HandlerResult, Update, UpdateContext, recovery};

use crate::handler::{BoxFuture, BoxedHandler, boxed};

/// Which dispatch slot matched an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    Command,
    Callback,
    Document,
    Animation,
}

impl RouteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Callback => "callback",
            Self::Document => "document",
            Self::Animation => "animation",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct DispatchTable {
    commands: RwLock<HashMap<String, BoxedHandler>>,
    callbacks: RwLock<HashMap<String, BoxedHandler>>,
    document: RwLock<Option<BoxedHandler>>,
    animation: RwLock<Option<BoxedHandler>>,
}

/// Command/callback/content-type dispatcher.
///
/// Cloning is cheap and clones share the same table, so one router can feed
/// both the poller and the webhook receiver.
#[derive(Clone, Default)]
pub struct Router {
    table: Arc<DispatchTable>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers `handler` for messages whose entire text equals `command`.
    pub fn handle_command<S>(&self, command: impl Into<String>, handler: S)
    where
        S: Service<Arc<UpdateContext>, Response = (), Error = HandlerError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let command = command.into();
        debug!(command = %command, "Registered command handler");
        self.table.commands.write().insert(command, boxed(handler));
    }

    /// Registers `handler` for callback queries carrying exactly `data`.
    pub fn handle_callback<S>(&self, data: impl Into<String>, handler: S)
    where
        S: Service<Arc<UpdateContext>, Response = (), Error = HandlerError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let data = data.into();
        debug!(callback_data = %data, "Registered callback handler");
        self.table.callbacks.write().insert(data, boxed(handler));
    }

    /// Sets the handler for messages carrying a document.
    pub fn handle_document<S>(&self, handler: S)
    where
        S: Service<Arc<UpdateContext>, Response = (), Error = HandlerError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        *self.table.document.write() = Some(boxed(handler));
    }

    /// Sets the handler for messages carrying an animation.
    pub fn handle_animation<S>(&self, handler: S)
    where
        S: Service<Arc<UpdateContext>, Response = (), Error = HandlerError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        *self.table.animation.write() = Some(boxed(handler));
    }

    pub fn command_count(&self) -> usize {
        self.table.commands.read().len()
    }

    pub fn callback_count(&self) -> usize {
        self.table.callbacks.read().len()
    }

    pub fn has_document_handler(&self) -> bool {
        self.table.document.read().is_some()
    }

    pub fn has_animation_handler(&self) -> bool {
        self.table.animation.read().is_some()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Routes a bare update.
    pub async fn route_update(&self, update: Update) -> HandlerResult {
        self.route(Arc::new(UpdateContext::new(update))).await
    }

    /// Routes one update to at most one handler.
    pub async fn route(&self, ctx: Arc<UpdateContext>) -> HandlerResult {
        let update_id = ctx.update_id();

        if let Some(query) = ctx.callback_query() {
            let Some(data) = query.data.clone() else {
                debug!(update_id, "Received callback query without data");
                return Ok(());
            };
            let handler = self.table.callbacks.read().get(&data).cloned();
            return match handler {
                Some(handler) => self.dispatch(handler, ctx, RouteKind::Callback, &data).await,
                None => {
                    warn!(update_id, callback_data = %data, "No handler registered for callback");
                    Ok(())
                }
            };
        }

        let Some(message) = ctx.message() else {
            debug!(update_id, "Received update without message");
            return Ok(());
        };

        if let Some(command) = message.command() {
            let command = command.to_owned();
            let handler = self.table.commands.read().get(&command).cloned();
            return match handler {
                Some(handler) => {
                    self.dispatch(handler, ctx, RouteKind::Command, &command)
                        .await
                }
                None => {
                    warn!(update_id, command = %command, "No handler registered for command");
                    Ok(())
                }
            };
        }

        let has_document = message.document.is_some();
        let has_animation = message.animation.is_some();

        if has_document {
            let handler = self.table.document.read().clone();
            if let Some(handler) = handler {
                return self.dispatch(handler, ctx, RouteKind::Document, "").await;
            }
        }

        if has_animation {
            let handler = self.table.animation.read().clone();
            if let Some(handler) = handler {
                return self.dispatch(handler, ctx, RouteKind::Animation, "").await;
            }
        }

        debug!(update_id, "Received message without command");
        Ok(())
    }

    async fn dispatch(
        &self,
        handler: BoxedHandler,
        ctx: Arc<UpdateContext>,
        kind: RouteKind,
        key: &str,
    ) -> HandlerResult {
        let update_id = ctx.update_id();

        match recovery::invoke(handler.oneshot(ctx)).await {
            Ok(Ok(())) => {
                info!(update_id, route = %kind, key, "Handled update successfully");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(update_id, route = %kind, key, error = %e, "Handler failed");
                Err(e)
            }
            // The invoker already logged the panic.
            Err(panicked) => Err(panicked.into()),
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("commands", &self.command_count())
            .field("callbacks", &self.callback_count())
            .field("document", &self.has_document_handler())
            .field("animation", &self.has_animation_handler())
            .finish()
    }
}

/// The router is itself a handler service, so it can terminate a middleware
/// chain.
impl Service<Arc<UpdateContext>> for Router {
    type Response = ();
    type Error = HandlerError;
    type Future = BoxFuture<HandlerResult>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<UpdateContext>) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { router.route(ctx).await })
    }
}
