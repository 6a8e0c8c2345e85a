//! Read-only snapshot of the SSH session environment.
//!
//! sshd exports a handful of variables into forced-command processes. They
//! are captured once at startup and passed down explicitly; nothing in the
//! command path reads or writes the process environment afterwards.

/// Variable holding the git wire protocol version requested by the client.
pub const GIT_PROTOCOL_ENV: &str = "GIT_PROTOCOL";
/// Variable holding `client_ip client_port server_ip server_port`.
pub const SSH_CONNECTION_ENV: &str = "SSH_CONNECTION";
/// Variable holding the command line the client asked to run.
pub const SSH_ORIGINAL_COMMAND_ENV: &str = "SSH_ORIGINAL_COMMAND";

/// Snapshot of the session environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEnv {
    /// Git protocol version (`GIT_PROTOCOL`), empty when unset.
    pub git_protocol_version: String,
    /// Whether `SSH_CONNECTION` was present.
    pub is_ssh_connection: bool,
    /// The client's original command line (`SSH_ORIGINAL_COMMAND`).
    pub original_command: String,
    /// Client address: first field of `SSH_CONNECTION`.
    pub remote_addr: String,
}

impl SessionEnv {
    /// Capture the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a snapshot from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let connection = lookup(SSH_CONNECTION_ENV).unwrap_or_default();

        Self {
            git_protocol_version: lookup(GIT_PROTOCOL_ENV).unwrap_or_default(),
            is_ssh_connection: !connection.is_empty(),
            original_command: lookup(SSH_ORIGINAL_COMMAND_ENV).unwrap_or_default(),
            remote_addr: connection
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// The git protocol version.
    #[must_use]
    pub fn git_protocol_version(&self) -> &str {
        &self.git_protocol_version
    }

    /// The client address, empty outside an SSH session.
    #[must_use]
    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// The original command line.
    #[must_use]
    pub fn original_command(&self) -> &str {
        &self.original_command
    }
}
