//! Error types shared by every gitgate layer.

use thiserror::Error;

/// Errors that can terminate a command execution.
///
/// Every layer returns one of these to its caller; the entry point prints the
/// message to the session's error stream and exits non-zero.
#[derive(Debug, Error)]
pub enum GateError {
    /// Unrecognized command, or a recognized command that is not available.
    ///
    /// The message is deliberately identical in both cases.
    #[error("Disallowed command")]
    DisallowedCommand,

    /// Malformed argument shape detected before any side effect.
    #[error("{0}")]
    InvalidArguments(String),

    /// The control plane refused the operation.
    #[error("{0}")]
    AccessDenied(String),

    /// The control plane or the storage backend could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// Missing or invalid configuration (backend address, client certificate, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure during the actual data transfer.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A dependency reported itself unhealthy.
    #[error("{0}")]
    Unavailable(String),

    /// Session stream I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`GateError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unrecognized command or malformed arguments; nothing happened.
    DisallowedCommand,
    /// Policy failure reported by the control plane.
    AccessDenied,
    /// Control plane or backend unreachable.
    Transport,
    /// Configuration problem.
    Configuration,
    /// Handler-level transfer failure.
    Protocol,
    /// Dependency unhealthy.
    Unavailable,
}

impl GateError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DisallowedCommand | Self::InvalidArguments(_) => ErrorKind::DisallowedCommand,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Protocol(_) | Self::Io(_) => ErrorKind::Protocol,
            Self::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Build a transport error from anything displayable.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Build a protocol error from anything displayable.
    pub fn protocol(err: impl std::fmt::Display) -> Self {
        Self::Protocol(err.to_string())
    }

    /// Build a configuration error from anything displayable.
    pub fn configuration(err: impl std::fmt::Display) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Result type for gitgate operations.
pub type GateResult<T> = Result<T, GateError>;
