//! Scoped teardown for one bootstrap invocation.

use std::sync::Arc;

use gitgate_core::CommandContext;
use gitgate_telemetry::TracingSession;

use crate::dialer::GitalyConnection;

/// Owns whatever the bootstrap has acquired so far.
///
/// Release happens once, in a fixed order: cancel the call context, close
/// the tracing session, close the connection. Resources never acquired are
/// skipped. Dropping the guard releases too, so early returns and panics
/// unwind through the same path.
#[derive(Default)]
pub struct SessionGuard {
    cancel: Option<CommandContext>,
    tracing: Option<Box<dyn TracingSession>>,
    connection: Option<Arc<dyn GitalyConnection>>,
}

impl SessionGuard {
    /// An empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of the tracing session.
    pub fn hold_tracing(&mut self, session: Box<dyn TracingSession>) {
        self.tracing = Some(session);
    }

    /// Take ownership of the call context's cancellation.
    pub fn hold_context(&mut self, ctx: CommandContext) {
        self.cancel = Some(ctx);
    }

    /// Take ownership of the connection.
    pub fn hold_connection(&mut self, connection: Arc<dyn GitalyConnection>) {
        self.connection = Some(connection);
    }

    /// Release everything held. Later calls are no-ops.
    pub fn release(&mut self) {
        if let Some(ctx) = self.cancel.take() {
            ctx.cancel();
        }
        if let Some(mut session) = self.tracing.take() {
            session.close();
        }
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("context", &self.cancel.is_some())
            .field("tracing", &self.tracing.is_some())
            .field("connection", &self.connection.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    type Events = Arc<Mutex<Vec<&'static str>>>;

    struct Session(Events);

    impl TracingSession for Session {
        fn span(&self) -> tracing::Span {
            tracing::Span::none()
        }

        fn close(&mut self) {
            self.0.lock().unwrap().push("tracing.close");
        }
    }

    #[test]
    fn test_release_order_and_idempotence() {
        let events: Events = Arc::default();
        let ctx = CommandContext::new();

        let mut guard = SessionGuard::new();
        guard.hold_tracing(Box::new(Session(Arc::clone(&events))));
        guard.hold_context(ctx.clone());

        guard.release();
        assert!(ctx.is_cancelled());
        guard.release();
        drop(guard);

        assert_eq!(*events.lock().unwrap(), vec!["tracing.close"]);
    }

    #[test]
    fn test_drop_releases() {
        let events: Events = Arc::default();
        let ctx = CommandContext::new();
        {
            let mut guard = SessionGuard::new();
            guard.hold_context(ctx.clone());
            guard.hold_tracing(Box::new(Session(Arc::clone(&events))));
        }
        assert!(ctx.is_cancelled());
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
