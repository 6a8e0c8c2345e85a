//! Two-factor endpoints: recovery codes and OTP verification.

use gitgate_core::{CommandContext, GateResult, Who};
use serde::{Deserialize, Serialize};

use super::Principal;
use crate::http::{HttpClient, ensure_success, parse_json};

#[derive(Serialize)]
struct OtpBody<'a> {
    #[serde(flatten)]
    principal: Principal<'a>,
    otp_attempt: &'a str,
}

/// Result of `POST /two_factor_recovery_codes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecoveryCodesResponse {
    /// Whether new codes were generated.
    pub success: bool,
    /// The new codes.
    pub recovery_codes: Vec<String>,
    /// Failure reason.
    pub message: String,
}

/// Result of `POST /two_factor_otp_check`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OtpCheckResponse {
    /// Whether the OTP was accepted.
    pub success: bool,
    /// Failure reason.
    pub message: String,
}

/// Regenerate the user's two-factor recovery codes.
///
/// # Errors
///
/// Returns [`gitgate_core::GateError::Transport`] on any failure.
pub async fn recovery_codes(
    client: &HttpClient,
    ctx: &CommandContext,
    who: &Who,
) -> GateResult<RecoveryCodesResponse> {
    let response = client
        .post(ctx, "/two_factor_recovery_codes", &Principal::from(who))
        .await?;
    parse_json(ensure_success(response).await?).await
}

/// Check a one-time password.
///
/// # Errors
///
/// Returns [`gitgate_core::GateError::Transport`] on any failure.
pub async fn verify_otp(
    client: &HttpClient,
    ctx: &CommandContext,
    who: &Who,
    otp: &str,
) -> GateResult<OtpCheckResponse> {
    let body = OtpBody {
        principal: Principal::from(who),
        otp_attempt: otp,
    };
    let response = client.post(ctx, "/two_factor_otp_check", &body).await?;
    parse_json(ensure_success(response).await?).await
}
