//! Prelude module - commonly used types for convenient import.

// Dispatch
pub use crate::{Command, Services, build_command};

// Data plane
pub use crate::{ApiCustomAction, CustomAction, GitTransferCommand, InputEnd, Transfer};
