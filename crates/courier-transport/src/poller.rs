//! Long-poll update loop.
//!
//! One background task ticks every [`PollerConfig::interval`], fetches a batch
//! from the [`UpdateSource`] and routes each update, in order, through the
//! handler chain. The cursor advances past every update that was routed,
//! whatever the handler returned, so a failing or panicking update is never
//! redelivered.
//!
//! ```text
//!  Idle ──start()──▶ Running ──stop() / cancel──▶ Stopped
//! ```
//!
//! A poller runs at most once: `start` on a running or stopped poller is an
//! error.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use courier_core::{Update, UpdateContext, UpdateSource, recovery};
use courier_framework::BoxedHandler;

/// Long-poll tuning.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between fetches.
    pub interval: Duration,
    /// Maximum updates per fetch (1..=100).
    pub limit: u32,
    /// Long-poll wait handed to the remote.
    pub timeout_secs: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            limit: 100,
            timeout_secs: 60,
        }
    }
}

/// Lifecycle of a [`Poller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollerError {
    #[error("poller is already running")]
    AlreadyRunning,

    #[error("poller has been stopped and cannot be restarted")]
    Stopped,
}

/// Periodic fetch-and-route loop over an [`UpdateSource`].
pub struct Poller {
    source: Arc<dyn UpdateSource>,
    handler: BoxedHandler,
    config: PollerConfig,
    offset: Arc<AtomicI64>,
    state: Arc<Mutex<PollerState>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new(source: Arc<dyn UpdateSource>, handler: BoxedHandler, config: PollerConfig) -> Self {
        Self {
            source,
            handler,
            config,
            offset: Arc::new(AtomicI64::new(0)),
            state: Arc::new(Mutex::new(PollerState::Idle)),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Next offset to request: one past the highest update id routed so far.
    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> PollerState {
        *self.state.lock()
    }

    /// Spawns the polling task. The loop also ends when `shutdown` is
    /// cancelled.
    pub fn start(&self, shutdown: &CancellationToken) -> Result<(), PollerError> {
        {
            let mut state = self.state.lock();
            match *state {
                PollerState::Running => return Err(PollerError::AlreadyRunning),
                PollerState::Stopped => return Err(PollerError::Stopped),
                PollerState::Idle => *state = PollerState::Running,
            }
        }

        let worker = PollWorker {
            source: Arc::clone(&self.source),
            handler: self.handler.clone(),
            config: self.config.clone(),
            offset: Arc::clone(&self.offset),
        };
        let cancel = self.cancel.clone();
        let shutdown = shutdown.clone();
        let state = Arc::clone(&self.state);

        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            limit = self.config.limit,
            timeout_secs = self.config.timeout_secs,
            "Poller started"
        );

        let handle = tokio::spawn(async move {
            worker.run(cancel, shutdown).await;
            *state.lock() = PollerState::Stopped;
            info!("Poller stopped");
        });
        *self.task.lock() = Some(handle);

        Ok(())
    }

    /// Stops the loop. A no-op on a poller that never started or has
    /// already stopped.
    pub fn stop(&self) -> Result<(), PollerError> {
        let mut state = self.state.lock();
        if *state == PollerState::Running {
            debug!("Stopping poller");
            self.cancel.cancel();
            *state = PollerState::Stopped;
        }
        Ok(())
    }

    /// Waits for the polling task to exit.
    pub async fn join(&self) {
        let handle = self.task.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!(error = %e, "Poller task failed");
        }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("config", &self.config)
            .field("offset", &self.offset())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Worker
// =============================================================================

struct PollWorker {
    source: Arc<dyn UpdateSource>,
    handler: BoxedHandler,
    config: PollerConfig,
    offset: Arc<AtomicI64>,
}

impl PollWorker {
    async fn run(self, cancel: CancellationToken, shutdown: CancellationToken) {
        let period = self.config.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Cancellation is observed at tick boundaries only; the fetch and
            // the routing pass of the current tick always complete.
            if let Some(updates) = self.fetch().await {
                for update in updates {
                    self.route(update).await;
                }
            }
        }
    }

    async fn fetch(&self) -> Option<Vec<Update>> {
        let offset = self.offset.load(Ordering::SeqCst);
        let call = self
            .source
            .fetch_updates(offset, self.config.limit, self.config.timeout_secs);

        match recovery::invoke(call).await {
            Ok(Ok(updates)) => {
                if !updates.is_empty() {
                    debug!(offset, count = updates.len(), "Received update batch");
                }
                Some(updates)
            }
            Ok(Err(e)) => {
                error!(offset, error = %e, "Error fetching updates");
                None
            }
            Err(_) => {
                warn!(offset, "Update fetch panicked");
                None
            }
        }
    }

    async fn route(&self, update: Update) {
        let update_id = update.update_id;
        let ctx = Arc::new(UpdateContext::new(update));

        // A panic has already been logged by the invoker.
        if let Ok(Err(e)) = recovery::invoke(self.handler.clone().oneshot(ctx)).await {
            error!(update_id, error = %e, "Error routing update");
        }

        self.offset
            .fetch_max(update_id.saturating_add(1), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use courier_core::{
        Chat, HandlerError, Message, TransportError, TransportResult, testing::CapturedLogs,
    };
    use courier_framework::{boxed, handler_fn};

    struct ScriptedSource {
        script: Mutex<VecDeque<TransportResult<Vec<Update>>>>,
        requested: Mutex<Vec<i64>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<TransportResult<Vec<Update>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requested: Mutex::new(Vec::new()),
            })
        }

        fn requested(&self) -> Vec<i64> {
            self.requested.lock().clone()
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedSource {
        async fn fetch_updates(
            &self,
            offset: i64,
            _limit: u32,
            _timeout_secs: u32,
        ) -> TransportResult<Vec<Update>> {
            self.requested.lock().push(offset);
            let next = self.script.lock().pop_front();
            next.unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn text(id: i64) -> Update {
        Update::new(id).with_message(Message::new(id, Chat::new(1)).with_text("/start"))
    }

    fn config() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(1),
            limit: 100,
            timeout_secs: 0,
        }
    }

    fn counting(calls: &Arc<AtomicUsize>) -> BoxedHandler {
        let calls = Arc::clone(calls);
        boxed(handler_fn(move |_ctx: Arc<UpdateContext>| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn cursor_advances_past_failures_and_fetch_errors() {
        let source = ScriptedSource::new(vec![
            Ok(vec![text(1), text(2)]),
            Err(TransportError::Http("connection reset".into())),
            Ok(vec![text(5)]),
        ]);
        let handler = boxed(handler_fn(|ctx: Arc<UpdateContext>| async move {
            if ctx.update_id() == 2 {
                Err(HandlerError::failed("boom"))
            } else {
                Ok(())
            }
        }));

        let poller = Poller::new(source.clone(), handler, config());
        let shutdown = CancellationToken::new();
        poller.start(&shutdown).unwrap();

        tokio::time::sleep(Duration::from_millis(4500)).await;
        poller.stop().unwrap();
        poller.join().await;

        assert_eq!(poller.offset(), 6);
        assert_eq!(source.requested(), vec![0, 3, 3, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_waits_one_interval() {
        let source = ScriptedSource::new(vec![]);
        let calls = Arc::new(AtomicUsize::new(0));
        let poller = Poller::new(source.clone(), counting(&calls), config());
        poller.start(&CancellationToken::new()).unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(source.requested().is_empty());

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(source.requested(), vec![0]);

        poller.stop().unwrap();
        poller.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let poller = Poller::new(ScriptedSource::new(vec![]), counting(&calls), config());
        let shutdown = CancellationToken::new();

        poller.start(&shutdown).unwrap();
        assert_eq!(poller.start(&shutdown), Err(PollerError::AlreadyRunning));

        poller.stop().unwrap();
        poller.join().await;
        assert_eq!(poller.start(&shutdown), Err(PollerError::Stopped));
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let calls = Arc::new(AtomicUsize::new(0));
        let poller = Poller::new(ScriptedSource::new(vec![]), counting(&calls), config());

        poller.stop().unwrap();

        assert_eq!(poller.state(), PollerState::Idle);
        poller.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let poller = Poller::new(ScriptedSource::new(vec![]), counting(&calls), config());
        let shutdown = CancellationToken::new();
        poller.start(&shutdown).unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        shutdown.cancel();
        poller.join().await;

        assert_eq!(poller.state(), PollerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_handler_still_advances_cursor() {
        let logs = CapturedLogs::new();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let source = ScriptedSource::new(vec![Ok(vec![text(10)])]);
        let handler = boxed(handler_fn(|_ctx: Arc<UpdateContext>| async {
            let empty: Vec<u8> = Vec::new();
            let _ = empty[1];
            Ok(())
        }));

        let poller = Poller::new(source, handler, config());
        poller.start(&CancellationToken::new()).unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        poller.stop().unwrap();
        poller.join().await;

        assert_eq!(poller.offset(), 11);
        assert!(logs.contents().contains("Recovered from panic"));
    }

    #[tokio::test(start_paused = true)]
    async fn cursor_saturates_at_the_largest_update_id() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = ScriptedSource::new(vec![Ok(vec![Update::new(i64::MAX)])]);

        let poller = Poller::new(source.clone(), counting(&calls), config());
        poller.start(&CancellationToken::new()).unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(poller.state(), PollerState::Running);
        poller.stop().unwrap();
        poller.join().await;

        assert_eq!(poller.offset(), i64::MAX);
        assert_eq!(source.requested(), [0, i64::MAX]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
