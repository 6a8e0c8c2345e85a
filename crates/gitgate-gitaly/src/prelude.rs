//! Prelude module - commonly used types for convenient import.
//!
//! Use `use gitgate_gitaly::prelude::*;` to import all essential types.

pub use crate::{
    CallContext, Dialer, ExecutionRecord, GitalyCommand, GitalyConnection, TonicDialer,
    check_exit_status,
};

pub use crate::proto::{SshReceivePackRequest, SshUploadArchiveRequest, SshUploadPackRequest};
