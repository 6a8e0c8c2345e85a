//! gitgate Client - the control-plane HTTP client.
//!
//! This crate provides:
//! - The HTTP Client Factory ([`build_client`]): Unix socket, plaintext or
//!   TLS transport chosen by URL scheme
//! - The access verifier ([`AccessVerifier`], [`ApiAccessVerifier`])
//! - The remaining internal API calls under [`api`]

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod api;
pub mod error;
pub mod http;
pub mod options;
pub mod trust;

pub use api::allowed::{
    AccessRequest, AccessResponse, AccessVerifier, ApiAccessVerifier, BackendDescriptor,
    CustomPayload, CustomPayloadData, RepositoryDescriptor,
};
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, build_client};
pub use options::ClientOptions;
pub use trust::TrustStore;
