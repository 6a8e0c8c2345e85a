//! gitgate Telemetry - Logging and tracing for the gitgate SSH command gateway.
//!
//! This crate provides:
//! - Logging setup from the `[logging]` configuration section
//! - Per-command tracing sessions configured from a connection string
//!
//! # Example
//!
//! ```rust,no_run
//! use gitgate_telemetry::{LogConfig, LogFormat, SpanTracer, TracerFactory, setup_logging};
//!
//! # fn main() -> Result<(), gitgate_telemetry::TelemetryError> {
//! setup_logging(&LogConfig::new("info").with_format(LogFormat::Json))?;
//!
//! let mut session = SpanTracer::new().start("git-upload-pack", Some("opentracing://jaeger"));
//! tracing::info!(parent: &session.span(), "inside the session");
//! session.close();
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;
mod session;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
pub use session::{ConnectionString, SpanSession, SpanTracer, TracerFactory, TracingSession};
