//! Log capture for assertions on structured records.

use serde_json::Value;
use tracing::subscriber::DefaultGuard;

use crate::buffer::SharedBuffer;

/// Captured JSON log output.
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    buffer: SharedBuffer,
}

impl CapturedLogs {
    /// Every record, one JSON object per line.
    #[must_use]
    pub fn records(&self) -> Vec<Value> {
        self.buffer
            .contents()
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Records whose message equals `message`.
    #[must_use]
    pub fn with_message(&self, message: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|record| record["fields"]["message"] == message)
            .collect()
    }

    /// Raw output.
    #[must_use]
    pub fn raw(&self) -> String {
        self.buffer.contents()
    }
}

/// Capture every log record emitted on the current thread until the guard
/// is dropped.
///
/// Use with a current-thread runtime (`#[tokio::test]`'s default) so that
/// spawned work stays on the capturing thread.
#[must_use]
pub fn capture_logs() -> (DefaultGuard, CapturedLogs) {
    let buffer = SharedBuffer::new();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(buffer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (guard, CapturedLogs { buffer })
}
