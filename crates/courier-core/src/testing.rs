//! Log capture for tests.
//!
//! ```rust,ignore
//! let logs = CapturedLogs::new();
//! let _guard = tracing::subscriber::set_default(logs.subscriber());
//! // ... exercise code ...
//! assert_eq!(logs.count_level("ERROR"), 1);
//! ```

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// An in-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a plain-text subscriber writing every level into this sink.
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(Level::TRACE)
            .finish()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    /// Lines that start a log event (continuation lines are skipped).
    pub fn events(&self) -> Vec<String> {
        const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        self.contents()
            .lines()
            .filter(|line| {
                let trimmed = line.trim_start();
                LEVELS.iter().any(|level| trimmed.starts_with(level))
            })
            .map(str::to_owned)
            .collect()
    }

    /// Number of events logged at `level` (e.g. `"ERROR"`).
    pub fn count_level(&self, level: &str) -> usize {
        self.events()
            .iter()
            .filter(|line| line.trim_start().starts_with(level))
            .count()
    }

    /// Index of the first event containing `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.events().iter().position(|line| line.contains(needle))
    }
}

impl std::fmt::Debug for CapturedLogs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedLogs")
            .field("bytes", &self.buffer.lock().len())
            .finish()
    }
}

/// Writer handed out per event by [`CapturedLogs`].
pub struct CapturedWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}
