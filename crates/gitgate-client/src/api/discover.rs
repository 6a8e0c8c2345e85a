//! `GET /discover`: who is on the other end of the key.

use gitgate_core::{CommandContext, GateResult, Who};
use serde::Deserialize;

use super::query;
use crate::http::{HttpClient, ensure_success, parse_json};

/// The user behind a key, username or principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DiscoverResponse {
    /// Numeric user id.
    #[serde(rename = "id")]
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// Username; empty for anonymous keys (e.g. deploy keys).
    pub username: String,
}

impl DiscoverResponse {
    /// Whether no user is associated with the principal.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }
}

/// Look up the user for `who`.
///
/// # Errors
///
/// Returns [`gitgate_core::GateError::Transport`] on any failure.
pub async fn discover(
    client: &HttpClient,
    ctx: &CommandContext,
    who: &Who,
) -> GateResult<DiscoverResponse> {
    let (param, value) = who.param();
    let path = format!("/discover?{}", query(&[(param, value)]));
    let response = ensure_success(client.get(ctx, &path).await?).await?;
    // An unknown principal comes back as `null`.
    let user: Option<DiscoverResponse> = parse_json(response).await?;
    Ok(user.unwrap_or_default())
}
