//! The access verifier: `POST /allowed`.
//!
//! One call per command execution, never retried or cached. Anything other
//! than an explicit grant aborts the command.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gitgate_core::{CommandContext, CommandType, GateError, GateResult, Who};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Principal;
use crate::http::{HttpClient, REQUEST_ID_HEADER, error_message, is_denial};

/// Custom-action status returned by the control plane.
const MULTIPLE_CHOICES: StatusCode = StatusCode::MULTIPLE_CHOICES;

/// What is being asked of the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    /// Requested operation.
    pub command_type: CommandType,
    /// Repository path from the session command line.
    pub repository: String,
    /// Authenticated principal.
    pub who: Who,
    /// Client address to check IP restrictions against.
    pub check_ip: String,
}

#[derive(Serialize)]
struct AllowedBody<'a> {
    action: &'a str,
    project: &'a str,
    changes: &'a str,
    protocol: &'a str,
    #[serde(flatten)]
    principal: Principal<'a>,
    #[serde(skip_serializing_if = "str::is_empty")]
    check_ip: &'a str,
}

impl<'a> AllowedBody<'a> {
    fn new(request: &'a AccessRequest) -> Self {
        Self {
            action: request.command_type.as_str(),
            project: &request.repository,
            changes: "_any",
            protocol: "ssh",
            principal: Principal::from(&request.who),
            check_ip: &request.check_ip,
        }
    }
}

/// Repository handle understood by the storage backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryDescriptor {
    /// Storage shard name.
    pub storage_name: String,
    /// Path relative to the storage root.
    pub relative_path: String,
    /// Quarantine object directory.
    pub git_object_directory: String,
    /// Alternate object directories.
    pub git_alternate_object_directories: Vec<String>,
    /// Repository identifier (e.g. `project-1`).
    pub gl_repository: String,
    /// Human-readable project path.
    pub gl_project_path: String,
}

/// Where and how to reach the storage backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendDescriptor {
    /// Repository handle.
    #[serde(rename = "repository")]
    pub repo: RepositoryDescriptor,
    /// Backend address (`unix:`, `tcp://` or `tls://`).
    pub address: String,
    /// Per-call token.
    pub token: String,
    /// Feature flags to forward.
    pub features: HashMap<String, String>,
}

/// Data for a custom action.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CustomPayload {
    /// Action name (e.g. `geo_proxy_to_primary`).
    pub action: String,
    /// Action data, echoed back to every endpoint.
    pub data: CustomPayloadData,
}

/// The `data` object of a [`CustomPayload`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomPayloadData {
    /// Endpoints to call, in order.
    pub api_endpoints: Vec<String>,
    /// Message to show the user before the first call.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub info_message: String,
    /// Everything else, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The control plane's policy decision.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AccessResponse {
    /// Whether access is granted.
    pub status: bool,
    /// Reason, shown to the user on denial.
    pub message: String,
    /// Repository identifier.
    pub gl_repository: String,
    /// Project path.
    pub gl_project_path: String,
    /// User id (`gl_id`).
    #[serde(rename = "gl_id")]
    pub user_id: String,
    /// Username.
    #[serde(rename = "gl_username")]
    pub username: String,
    /// Key type (`key`, `deploy_key`, ...).
    #[serde(rename = "gl_key_type")]
    pub key_type: String,
    /// Numeric key id.
    #[serde(rename = "gl_key_id")]
    pub key_id: i64,
    /// Extra git configuration for the backend call.
    pub git_config_options: Vec<String>,
    /// Storage backend descriptor.
    #[serde(rename = "gitaly")]
    pub backend: BackendDescriptor,
    /// Git protocol version the control plane expects.
    pub git_protocol: String,
    /// Custom action data.
    pub payload: CustomPayload,
    /// Messages to print on the client's stderr.
    pub gl_console_messages: Vec<String>,
    /// Principal description.
    pub who: String,
    /// Correlation id to continue with.
    #[serde(skip)]
    pub correlation_id: String,
    /// Whether the control plane asked for a custom action.
    #[serde(skip)]
    pub custom_action: bool,
}

impl AccessResponse {
    /// Whether execution must be handed to a custom action.
    #[must_use]
    pub fn is_custom_action(&self) -> bool {
        self.custom_action
    }
}

/// Asks the control plane whether a command may run.
#[async_trait]
pub trait AccessVerifier: Send + Sync {
    /// Perform exactly one verification call.
    ///
    /// # Errors
    ///
    /// - [`GateError::AccessDenied`] when the control plane refuses
    /// - [`GateError::Transport`] for unreachable servers, unexpected
    ///   statuses and malformed bodies
    async fn verify(
        &self,
        ctx: &CommandContext,
        request: &AccessRequest,
    ) -> GateResult<AccessResponse>;
}

/// [`AccessVerifier`] backed by the internal API.
#[derive(Debug, Clone)]
pub struct ApiAccessVerifier {
    client: Arc<HttpClient>,
}

impl ApiAccessVerifier {
    /// Create a verifier using `client`.
    #[must_use]
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AccessVerifier for ApiAccessVerifier {
    async fn verify(
        &self,
        ctx: &CommandContext,
        request: &AccessRequest,
    ) -> GateResult<AccessResponse> {
        let response = self
            .client
            .post(ctx, "/allowed", &AllowedBody::new(request))
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), command = %request.command_type, "access check");

        if is_denial(status) {
            return Err(GateError::AccessDenied(error_message(response).await));
        }
        if !(status.is_success() || status == MULTIPLE_CHOICES) {
            return Err(GateError::Transport(error_message(response).await));
        }

        let correlation_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map_or_else(|| ctx.correlation_id().to_owned(), str::to_owned);

        let mut body: AccessResponse = response
            .json()
            .await
            .map_err(|e| GateError::transport(format!("Parsing failed: {e}")))?;

        if !body.status {
            return Err(GateError::AccessDenied(body.message));
        }

        body.correlation_id = correlation_id;
        body.custom_action = status == MULTIPLE_CHOICES;
        Ok(body)
    }
}
