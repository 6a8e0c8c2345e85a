//! Prelude module - commonly used types for convenient import.
//!
//! Use `use gitgate_test::prelude::*;` to import all essential types.

pub use crate::{
    ConnectionScript, EventLog, MockAccessVerifier, RecordingDialer, RecordingTracer,
    SharedBuffer, StubApi, StubResponse, capture_logs, test_access_response, test_shell_args,
};
