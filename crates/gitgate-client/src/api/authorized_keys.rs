//! `GET /authorized_keys`: look up a public key.

use gitgate_core::{CommandContext, GateResult};
use reqwest::StatusCode;
use serde::Deserialize;

use super::query;
use crate::http::{HttpClient, ensure_success, parse_json};

/// A registered key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthorizedKey {
    /// Key id.
    pub id: i64,
    /// The key as registered.
    pub key: String,
}

/// Find the key matching `key`; `None` if the control plane does not know it.
///
/// # Errors
///
/// Returns [`gitgate_core::GateError::Transport`] on any other failure.
pub async fn find(
    client: &HttpClient,
    ctx: &CommandContext,
    key: &str,
) -> GateResult<Option<AuthorizedKey>> {
    let path = format!("/authorized_keys?{}", query(&[("key", key)]));
    let response = client.get(ctx, &path).await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    parse_json(ensure_success(response).await?).await.map(Some)
}
