//! Per-call authorization for the storage backend.
//!
//! Version 2 tokens are never sent in the clear: every call carries
//! `Bearer v2.<hex hmac-sha256(token, ts)>.<ts>` for the current unix time.

use gitgate_core::{GateError, GateResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Metadata key the credential is sent under.
pub const AUTHORIZATION_KEY: &str = "authorization";

/// A per-call credential derived from the backend token.
#[derive(Clone, PartialEq, Eq)]
pub struct RpcCredentials {
    token: String,
}

impl std::fmt::Debug for RpcCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcCredentials").finish_non_exhaustive()
    }
}

impl RpcCredentials {
    /// Version 2 credentials for `token`.
    #[must_use]
    pub fn v2(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The token the credential is derived from.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Authorization value for the current time.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Configuration`] if the token cannot key the MAC.
    pub fn authorization(&self) -> GateResult<String> {
        self.authorization_at(chrono::Utc::now().timestamp())
    }

    /// Authorization value for a given unix timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Configuration`] if the token cannot key the MAC.
    pub fn authorization_at(&self, issued_at: i64) -> GateResult<String> {
        let message = issued_at.to_string();
        let mut mac = HmacSha256::new_from_slice(self.token.as_bytes())
            .map_err(|e| GateError::configuration(format!("invalid backend token: {e}")))?;
        mac.update(message.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("Bearer v2.{signature}.{message}"))
    }
}
