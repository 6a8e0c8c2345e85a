//! gitgate Command - dispatch and command implementations.
//!
//! This crate provides:
//! - The dispatch table ([`build_command`]): maps an entry point and its
//!   parsed arguments to a command without performing any I/O
//! - The data-plane commands (upload-pack, receive-pack, upload-archive)
//! - The control-plane commands (discover, two-factor, LFS, personal access
//!   tokens, authorized keys and principals, health check)
//! - The custom action handler taking over data-plane sessions on request

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod access;
pub mod authorized_keys;
pub mod authorized_principals;
pub mod custom_action;
pub mod discover;
pub mod dispatch;
pub mod healthcheck;
pub mod lfs_authenticate;
pub mod personal_access_token;
pub mod pktline;
pub mod services;
pub mod transfer;
pub mod two_factor;

mod output;

pub use custom_action::{ApiCustomAction, CustomAction, InputEnd};
pub use dispatch::build_command;
pub use services::Services;
pub use transfer::{GitTransferCommand, Transfer};

use async_trait::async_trait;
use gitgate_core::{CommandContext, GateResult};

/// A constructed command, ready to run once.
///
/// Commands own the session streams they were built with, so `execute`
/// consumes the command.
#[async_trait]
pub trait Command: Send {
    /// Run the command to completion.
    async fn execute(self: Box<Self>, ctx: &CommandContext) -> GateResult<()>;
}
