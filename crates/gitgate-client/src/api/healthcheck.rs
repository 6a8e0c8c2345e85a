//! `GET /check`.

use gitgate_core::{CommandContext, GateResult};
use serde::Deserialize;

use crate::http::{HttpClient, ensure_success, parse_json};

/// Control-plane health.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HealthResponse {
    /// Internal API version.
    pub api_version: String,
    /// Control-plane version.
    pub gitlab_version: String,
    /// Control-plane revision.
    pub gitlab_revision: String,
    /// Whether Redis is reachable.
    pub redis: bool,
}

/// Query the control plane's health.
///
/// # Errors
///
/// Returns [`gitgate_core::GateError::Transport`] if the API is unavailable.
pub async fn check(client: &HttpClient, ctx: &CommandContext) -> GateResult<HealthResponse> {
    let response = ensure_success(client.get(ctx, "/check").await?).await?;
    parse_json(response).await
}
