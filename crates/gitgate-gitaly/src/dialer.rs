//! The seam between the bootstrap and the network.

use std::sync::Arc;

use async_trait::async_trait;
use gitgate_core::{GateResult, ReadWriter};

use crate::credentials::RpcCredentials;
use crate::metadata::CallContext;
use crate::proto::{SshReceivePackRequest, SshUploadArchiveRequest, SshUploadPackRequest};

/// Client name reported to the backend.
pub const CLIENT_NAME: &str = "gitgate-shell";

/// How to dial a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialOptions {
    /// Per-call credential; `None` when the descriptor carries no token.
    pub credentials: Option<RpcCredentials>,
    /// Correlation id stamped on every call.
    pub correlation_id: String,
    /// Client name stamped on every call.
    pub client_name: String,
}

impl DialOptions {
    /// Options for a call correlated with `correlation_id`.
    #[must_use]
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            credentials: None,
            correlation_id: correlation_id.into(),
            client_name: CLIENT_NAME.to_owned(),
        }
    }

    /// Attach a per-call credential.
    #[must_use]
    pub fn with_credentials(mut self, credentials: RpcCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// Opens backend connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Dial `address` once. No retry.
    ///
    /// # Errors
    ///
    /// - [`GateError::Configuration`](gitgate_core::GateError::Configuration)
    ///   for an unsupported address
    /// - [`GateError::Transport`](gitgate_core::GateError::Transport) when
    ///   the backend cannot be reached
    async fn dial(
        &self,
        address: &str,
        options: &DialOptions,
    ) -> GateResult<Arc<dyn GitalyConnection>>;
}

/// An open backend connection.
///
/// Each transfer call streams the session input to the backend, copies the
/// backend's output to the session streams and returns the exit status.
#[async_trait]
pub trait GitalyConnection: Send + Sync {
    /// `SSHUploadPack`.
    async fn ssh_upload_pack(
        &self,
        call: &CallContext,
        request: SshUploadPackRequest,
        streams: ReadWriter,
    ) -> GateResult<i32>;

    /// `SSHReceivePack`.
    async fn ssh_receive_pack(
        &self,
        call: &CallContext,
        request: SshReceivePackRequest,
        streams: ReadWriter,
    ) -> GateResult<i32>;

    /// `SSHUploadArchive`.
    async fn ssh_upload_archive(
        &self,
        call: &CallContext,
        request: SshUploadArchiveRequest,
        streams: ReadWriter,
    ) -> GateResult<i32>;

    /// Release the connection. Idempotent.
    fn close(&self);
}
