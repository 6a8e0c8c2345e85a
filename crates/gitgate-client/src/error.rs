//! Client construction errors.

use gitgate_core::GateError;
use thiserror::Error;

/// Errors raised while building the control-plane HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The control-plane URL uses an unsupported scheme.
    #[error("unknown gitlab URL prefix: {0}")]
    UnknownScheme(String),

    /// An explicitly configured client certificate or key failed to load.
    #[error("failed to load client certificate: {0}")]
    ClientCertificate(String),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Result type for client construction.
pub type ClientResult<T> = Result<T, ClientError>;

impl From<ClientError> for GateError {
    fn from(err: ClientError) -> Self {
        GateError::Configuration(err.to_string())
    }
}
