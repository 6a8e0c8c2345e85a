//! Outgoing call metadata and the derived call context.

use std::collections::HashMap;

use gitgate_core::CommandContext;
use tonic::metadata::{MetadataKey, MetadataMap, MetadataValue};
use tracing::warn;

/// Only feature flags with this prefix are forwarded to the backend.
pub const FEATURE_FLAG_PREFIX: &str = "gitaly-feature-";

/// Who is making the call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallIdentity {
    /// Numeric key id.
    pub key_id: i64,
    /// Key type.
    pub key_type: String,
    /// User id.
    pub user_id: String,
    /// Username.
    pub username: String,
    /// Client address.
    pub remote_ip: String,
}

/// Ordered metadata attached to every backend call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallMetadata {
    entries: Vec<(String, String)>,
}

impl CallMetadata {
    /// Start from the feature flags, keeping only recognised ones.
    #[must_use]
    pub fn from_features(features: &HashMap<String, String>) -> Self {
        let mut entries: Vec<(String, String)> = features
            .iter()
            .filter(|(key, _)| key.starts_with(FEATURE_FLAG_PREFIX))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        entries.sort();
        Self { entries }
    }

    /// Append identity metadata.
    #[must_use]
    pub fn with_identity(mut self, identity: &CallIdentity) -> Self {
        self.entries.extend([
            ("key_id".to_owned(), identity.key_id.to_string()),
            ("key_type".to_owned(), identity.key_type.clone()),
            ("user_id".to_owned(), identity.user_id.clone()),
            ("username".to_owned(), identity.username.clone()),
            ("remote_ip".to_owned(), identity.remote_ip.clone()),
        ]);
        self
    }

    /// First value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Copy the entries into gRPC request metadata.
    ///
    /// Entries that are not valid ASCII metadata are dropped with a warning.
    pub fn apply(&self, map: &mut MetadataMap) {
        for (key, value) in &self.entries {
            let parsed = (
                MetadataKey::from_bytes(key.as_bytes()),
                MetadataValue::try_from(value.as_str()),
            );
            match parsed {
                (Ok(key), Ok(value)) => {
                    map.append(key, value);
                },
                _ => warn!(key = %key, "dropping invalid call metadata entry"),
            }
        }
    }
}

/// Context handed to a backend handler.
///
/// Carries the derived cancellation token and correlation id together with
/// the call metadata. Cancelled when the bootstrap returns.
#[derive(Debug, Clone)]
pub struct CallContext {
    ctx: CommandContext,
    metadata: CallMetadata,
}

impl CallContext {
    /// Bundle a derived context with its metadata.
    #[must_use]
    pub fn new(ctx: CommandContext, metadata: CallMetadata) -> Self {
        Self { ctx, metadata }
    }

    /// The underlying command context.
    #[must_use]
    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    /// Correlation id propagated to the backend.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        self.ctx.correlation_id()
    }

    /// Outgoing metadata.
    #[must_use]
    pub fn metadata(&self) -> &CallMetadata {
        &self.metadata
    }

    /// Whether the call has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.ctx.is_cancelled()
    }

    /// Resolves once the call is cancelled.
    pub async fn cancelled(&self) {
        self.ctx.cancelled().await;
    }
}
