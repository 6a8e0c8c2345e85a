//! gitgate Core - Foundation types for the gitgate SSH command gateway.
//!
//! This crate provides:
//! - The error taxonomy shared by every layer ([`GateError`])
//! - Executable kinds and command-argument parsing
//! - Read-only access to the SSH session environment
//! - The request-scoped [`CommandContext`] (correlation id + cancellation)
//! - The session stream bundle ([`ReadWriter`])
//! - `remote:`-framed console messages for git clients

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod args;
pub mod console;
pub mod context;
pub mod error;
pub mod executable;
pub mod readwriter;
pub mod session_env;

pub use args::{
    AuthorizedKeysArgs, AuthorizedPrincipalsArgs, CommandArgs, CommandType, ShellArgs, Who,
};
pub use context::CommandContext;
pub use error::{ErrorKind, GateError, GateResult};
pub use executable::{Executable, ExecutableKind};
pub use readwriter::ReadWriter;
pub use session_env::SessionEnv;
