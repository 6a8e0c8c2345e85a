//! Prelude module - commonly used types for convenient import.
//!
//! Use `use gitgate_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{ErrorKind, GateError, GateResult};

// Arguments
pub use crate::{CommandArgs, CommandType, Executable, ExecutableKind, ShellArgs, Who};

// Session
pub use crate::{CommandContext, ReadWriter, SessionEnv};
