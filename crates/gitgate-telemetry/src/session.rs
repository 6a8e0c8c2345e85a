//! Per-command tracing sessions.
//!
//! A tracing session is opened by the RPC bootstrap for the lifetime of a
//! single backend call. It is configured from the process configuration's
//! connection string, never from the ambient environment: forced-command
//! sessions do not reliably pass environment variables through.

use std::time::Instant;

use tracing::{Span, info_span, warn};
use url::Url;

/// Starts tracing sessions.
pub trait TracerFactory: Send + Sync {
    /// Start a session named after `service_name`.
    ///
    /// Never fails: a missing or malformed connection string yields a
    /// disabled session.
    fn start(&self, service_name: &str, connection_string: Option<&str>)
    -> Box<dyn TracingSession>;
}

/// A running tracing session.
pub trait TracingSession: Send {
    /// Span that backend call work should be instrumented with.
    fn span(&self) -> Span;

    /// Finish the session. Calling it more than once has no further effect.
    fn close(&mut self);
}

/// Parsed `<scheme>://<driver>?<k>=<v>&...` connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// Driver name (the URL host).
    pub driver: String,
    /// Driver options, in the order they appear.
    pub options: Vec<(String, String)>,
}

impl ConnectionString {
    /// Parse a connection string.
    ///
    /// # Errors
    ///
    /// Returns the URL parse error, or a description when no driver is named.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let url = Url::parse(raw).map_err(|e| e.to_string())?;
        let driver = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| format!("no tracing driver in {raw:?}"))?
            .to_owned();
        let options = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(Self { driver, options })
    }

    fn options_field(&self) -> String {
        self.options
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Production tracer backed by `tracing` spans.
#[derive(Debug, Clone, Default)]
pub struct SpanTracer;

impl SpanTracer {
    /// Create a tracer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TracerFactory for SpanTracer {
    fn start(
        &self,
        service_name: &str,
        connection_string: Option<&str>,
    ) -> Box<dyn TracingSession> {
        let Some(raw) = connection_string.filter(|s| !s.is_empty()) else {
            return Box::new(SpanSession::disabled());
        };

        match ConnectionString::parse(raw) {
            Ok(conn) => Box::new(SpanSession::enabled(session_span(service_name, &conn))),
            Err(error) => {
                warn!(%error, "ignoring malformed tracing connection string");
                Box::new(SpanSession::disabled())
            },
        }
    }
}

/// The span for one session. Span names are static, so each transfer
/// service has its own.
fn session_span(service_name: &str, conn: &ConnectionString) -> Span {
    macro_rules! session_span {
        ($name:literal) => {
            info_span!(
                $name,
                service = %format!("gitgate-{service_name}"),
                driver = %conn.driver,
                options = %conn.options_field(),
                elapsed_ms = tracing::field::Empty,
            )
        };
    }

    match service_name {
        "git-upload-pack" => session_span!("gitgate-git-upload-pack"),
        "git-receive-pack" => session_span!("gitgate-git-receive-pack"),
        "git-upload-archive" => session_span!("gitgate-git-upload-archive"),
        _ => session_span!("gitgate-session"),
    }
}

/// Session returned by [`SpanTracer`].
#[derive(Debug)]
pub struct SpanSession {
    span: Option<Span>,
    started: Instant,
}

impl SpanSession {
    fn enabled(span: Span) -> Self {
        Self {
            span: Some(span),
            started: Instant::now(),
        }
    }

    fn disabled() -> Self {
        Self {
            span: None,
            started: Instant::now(),
        }
    }

    /// Whether this session records anything.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.span.is_some()
    }
}

impl TracingSession for SpanSession {
    fn span(&self) -> Span {
        self.span.clone().unwrap_or_else(Span::none)
    }

    fn close(&mut self) {
        if let Some(span) = self.span.take() {
            let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
            span.record("elapsed_ms", elapsed);
        }
    }
}
