//! Test fixtures for common types.

use std::collections::HashMap;
use std::path::PathBuf;

use gitgate_client::{AccessResponse, BackendDescriptor, RepositoryDescriptor};
use gitgate_core::{ShellArgs, Who};

/// Directory holding the PEM fixtures.
#[must_use]
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// A self-signed CA certificate.
#[must_use]
pub fn test_ca_cert() -> PathBuf {
    fixtures_dir().join("ca.pem")
}

/// A client certificate signed by [`test_ca_cert`].
#[must_use]
pub fn test_client_cert() -> PathBuf {
    fixtures_dir().join("client.pem")
}

/// The key of [`test_client_cert`].
#[must_use]
pub fn test_client_key() -> PathBuf {
    fixtures_dir().join("client-key.pem")
}

/// Shell arguments for `command_line` run by `key-123`.
///
/// # Panics
///
/// Panics if `command_line` is not valid shell words.
#[must_use]
pub fn test_shell_args(command_line: &str) -> ShellArgs {
    ShellArgs::from_command_line(Who::KeyId("123".to_owned()), command_line).unwrap()
}

/// A granted access response for key 123 of `test-user`, pointing at
/// `address`.
#[must_use]
pub fn test_access_response(address: &str) -> AccessResponse {
    AccessResponse {
        status: true,
        gl_repository: "project-1".to_owned(),
        gl_project_path: "group/repo".to_owned(),
        user_id: "1".to_owned(),
        username: "test-user".to_owned(),
        key_type: "key".to_owned(),
        key_id: 123,
        correlation_id: "test-correlation-id".to_owned(),
        backend: BackendDescriptor {
            repo: RepositoryDescriptor {
                storage_name: "default".to_owned(),
                relative_path: "@hashed/group/repo.git".to_owned(),
                gl_repository: "project-1".to_owned(),
                gl_project_path: "group/repo".to_owned(),
                ..RepositoryDescriptor::default()
            },
            address: address.to_owned(),
            token: "t".to_owned(),
            features: HashMap::from([
                ("gitaly-feature-cache".to_owned(), "true".to_owned()),
                ("unrelated".to_owned(), "true".to_owned()),
            ]),
        },
        ..AccessResponse::default()
    }
}
