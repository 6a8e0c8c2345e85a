//! gitgate Gitaly - the storage backend RPC session bootstrap.
//!
//! This crate provides:
//! - [`GitalyCommand`]: one backend connection per command, with guaranteed
//!   ordered teardown
//! - Call metadata (feature flags and identity) and per-call credentials
//! - The [`Dialer`] / [`GitalyConnection`] seam and its tonic implementation
//! - The `gitaly.SSHService` transfer messages

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod command;
pub mod credentials;
pub mod dialer;
pub mod guard;
pub mod metadata;
pub mod proto;
pub mod transport;

pub use command::{ExecutionRecord, GitalyCommand};
pub use credentials::RpcCredentials;
pub use dialer::{DialOptions, Dialer, GitalyConnection};
pub use guard::SessionGuard;
pub use metadata::{CallContext, CallIdentity, CallMetadata};
pub use transport::{TonicDialer, check_exit_status};
