//! gitgate Test - Shared test utilities for the gitgate workspace.
//!
//! This crate provides stand-ins for every external collaborator of a
//! command execution, to be used as a dev-dependency from integration tests:
//!
//! - [`StubApi`]: an HTTP control plane over TCP or a Unix socket
//! - [`RecordingDialer`] / [`RecordingTracer`] / [`MockAccessVerifier`]:
//!   seam implementations that log into a shared [`EventLog`]
//! - [`SharedBuffer`] and [`capture_logs`] for asserting on output
//! - PEM and response fixtures
//!
//! # Usage
//!
//! ```rust,ignore
//! use gitgate_test::{EventLog, RecordingDialer};
//!
//! #[tokio::test]
//! async fn test_dials_once() {
//!     let log = EventLog::new();
//!     let dialer = RecordingDialer::new(log.clone());
//!     // ... run a command ...
//!     assert_eq!(dialer.dial_count(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod buffer;
pub mod fixtures;
pub mod logs;
pub mod mocks;
pub mod stub_api;

pub use buffer::SharedBuffer;
pub use fixtures::*;
pub use logs::{CapturedLogs, capture_logs};
pub use mocks::*;
pub use stub_api::{RecordedRequest, StubApi, StubResponse};
