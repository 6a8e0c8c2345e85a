//! Request-scoped execution context.
//!
//! A [`CommandContext`] is created once per session and passed by parameter
//! through every layer: the control-plane call, the RPC bootstrap, and the
//! protocol handler. It is never stored in a global.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Correlation id plus cancellation signal for one command execution.
#[derive(Debug, Clone)]
pub struct CommandContext {
    correlation_id: String,
    cancel: CancellationToken,
}

impl CommandContext {
    /// Create a context with a freshly generated correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_correlation_id(random_correlation_id())
    }

    /// Create a context carrying the given correlation id.
    #[must_use]
    pub fn with_correlation_id(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Create a context from an upstream correlation id, generating one if
    /// the upstream value is absent or empty.
    #[must_use]
    pub fn inherit_or_generate(upstream: Option<String>) -> Self {
        match upstream {
            Some(id) if !id.trim().is_empty() => Self::with_correlation_id(id.trim()),
            _ => {
                let ctx = Self::new();
                tracing::debug!(
                    correlation_id = %ctx.correlation_id,
                    "no upstream correlation id, generated one"
                );
                ctx
            },
        }
    }

    /// The correlation id.
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Derive a child context: same correlation id, cancelled when the parent
    /// is cancelled, cancellable on its own without affecting the parent.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            correlation_id: self.correlation_id.clone(),
            cancel: self.cancel.child_token(),
        }
    }

    /// Derive a child context that adopts `correlation_id` when it is non-empty.
    #[must_use]
    pub fn child_with_correlation(&self, correlation_id: &str) -> Self {
        let mut child = self.child();
        if !correlation_id.is_empty() {
            correlation_id.clone_into(&mut child.correlation_id);
        }
        child
    }

    /// Signal cancellation to this context and all of its children.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation is signalled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

impl Default for CommandContext {
    fn default() -> Self {
        Self::new()
    }
}

fn random_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = CommandContext::new();
        let b = CommandContext::new();
        assert_ne!(a.correlation_id(), b.correlation_id());
        assert_eq!(a.correlation_id().len(), 32);
    }

    #[test]
    fn test_inherit_or_generate() {
        let inherited = CommandContext::inherit_or_generate(Some("abc".to_string()));
        assert_eq!(inherited.correlation_id(), "abc");

        let generated = CommandContext::inherit_or_generate(Some("  ".to_string()));
        assert!(!generated.correlation_id().trim().is_empty());
    }

    #[test]
    fn test_child_cancellation_does_not_reach_parent() {
        let parent = CommandContext::with_correlation_id("p");
        let child = parent.child_with_correlation("c");
        assert_eq!(child.correlation_id(), "c");

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_parent_cancellation_reaches_child() {
        let parent = CommandContext::with_correlation_id("p");
        let child = parent.child_with_correlation("");
        assert_eq!(child.correlation_id(), "p");

        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves() {
        let ctx = CommandContext::new();
        let waiter = ctx.clone();
        ctx.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter.cancelled())
            .await
            .unwrap();
    }
}
