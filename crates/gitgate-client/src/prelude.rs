//! Prelude module - commonly used types for convenient import.
//!
//! Use `use gitgate_client::prelude::*;` to import all essential types.

pub use crate::{ClientError, ClientOptions, ClientResult, HttpClient, build_client};

pub use crate::{AccessRequest, AccessResponse, AccessVerifier, ApiAccessVerifier};
