//! Telemetry error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up logging or tracing.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Unknown format, malformed filter directive or unusable log path.
    #[error("invalid logging configuration: {0}")]
    InvalidConfig(String),

    /// The log directory could not be created.
    #[error("cannot prepare log directory {path}: {source}")]
    LogDirectory {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A global subscriber is already installed.
    #[error("failed to install subscriber: {0}")]
    Install(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
