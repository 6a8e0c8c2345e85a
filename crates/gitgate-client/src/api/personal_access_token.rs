//! `POST /personal_access_token`.

use chrono::{Days, NaiveDate};
use gitgate_core::{CommandContext, GateResult, Who};
use serde::{Deserialize, Serialize};

use super::Principal;
use crate::http::{HttpClient, ensure_success, parse_json};

/// A token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// Token name.
    pub name: String,
    /// Requested scopes.
    pub scopes: Vec<String>,
    /// Expiry date, if any.
    pub expires_at: Option<NaiveDate>,
}

impl TokenRequest {
    /// Compute the expiry date `ttl_days` after `today`.
    #[must_use]
    pub fn expiry_after(today: NaiveDate, ttl_days: u64) -> Option<NaiveDate> {
        today.checked_add_days(Days::new(ttl_days))
    }
}

#[derive(Serialize)]
struct TokenBody<'a> {
    #[serde(flatten)]
    principal: Principal<'a>,
    name: &'a str,
    scopes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

/// The issued token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TokenResponse {
    /// Whether a token was issued.
    pub success: bool,
    /// The token.
    pub token: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Expiry date, if any.
    pub expires_at: Option<String>,
    /// Failure reason.
    pub message: String,
}

/// Issue a personal access token.
///
/// # Errors
///
/// Returns [`gitgate_core::GateError::Transport`] on any failure.
pub async fn issue(
    client: &HttpClient,
    ctx: &CommandContext,
    who: &Who,
    request: &TokenRequest,
) -> GateResult<TokenResponse> {
    let body = TokenBody {
        principal: Principal::from(who),
        name: &request.name,
        scopes: &request.scopes,
        expires_at: request.expires_at.map(|d| d.format("%Y-%m-%d").to_string()),
    };
    let response = client.post(ctx, "/personal_access_token", &body).await?;
    parse_json(ensure_success(response).await?).await
}
