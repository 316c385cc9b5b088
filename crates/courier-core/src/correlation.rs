//! Correlation identifiers for tying log lines of one request together.

use std::future::Future;
use std::time::Duration;

use tokio::time::error::Elapsed;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

/// Returns a fresh opaque identifier: 32 lowercase hex characters drawn from
/// the OS random source.
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Runs `fut` under a deadline inside a span carrying a fresh correlation id.
pub async fn with_timeout_and_correlation<F>(
    timeout: Duration,
    fut: F,
) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    let correlation_id = generate_correlation_id();
    let span = info_span!("correlated", correlation_id = %correlation_id);

    async move {
        debug!(timeout_ms = timeout.as_millis() as u64, "Starting correlated operation");
        tokio::time::timeout(timeout, fut).await
    }
    .instrument(span)
    .await
}
