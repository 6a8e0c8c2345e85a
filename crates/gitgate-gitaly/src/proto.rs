//! Wire messages of the storage backend's `gitaly.SSHService`.
//!
//! Only the three SSH transfer calls are modelled. Field tags match the
//! service's protobuf definitions.

use gitgate_client::RepositoryDescriptor;

/// gRPC service name.
pub const SSH_SERVICE: &str = "gitaly.SSHService";

/// A repository as the backend addresses it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Repository {
    /// Storage shard.
    #[prost(string, tag = "2")]
    pub storage_name: String,
    /// Path relative to the storage root.
    #[prost(string, tag = "3")]
    pub relative_path: String,
    /// Quarantine object directory.
    #[prost(string, tag = "4")]
    pub git_object_directory: String,
    /// Alternate object directories.
    #[prost(string, repeated, tag = "5")]
    pub git_alternate_object_directories: Vec<String>,
    /// Repository identifier.
    #[prost(string, tag = "6")]
    pub gl_repository: String,
    /// Project path.
    #[prost(string, tag = "8")]
    pub gl_project_path: String,
}

impl From<&RepositoryDescriptor> for Repository {
    fn from(repo: &RepositoryDescriptor) -> Self {
        Self {
            storage_name: repo.storage_name.clone(),
            relative_path: repo.relative_path.clone(),
            git_object_directory: repo.git_object_directory.clone(),
            git_alternate_object_directories: repo.git_alternate_object_directories.clone(),
            gl_repository: repo.gl_repository.clone(),
            gl_project_path: repo.gl_project_path.clone(),
        }
    }
}

/// Process exit status reported by the backend.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExitStatus {
    /// Exit code.
    #[prost(int32, tag = "1")]
    pub value: i32,
}

/// `SSHUploadPack` request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SshUploadPackRequest {
    /// Set on the first message only.
    #[prost(message, optional, tag = "1")]
    pub repository: Option<Repository>,
    /// Client input chunk.
    #[prost(bytes = "vec", tag = "2")]
    pub stdin: Vec<u8>,
    /// Extra `-c` options for git.
    #[prost(string, repeated, tag = "4")]
    pub git_config_options: Vec<String>,
    /// Git protocol version.
    #[prost(string, tag = "5")]
    pub git_protocol: String,
}

/// `SSHReceivePack` request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SshReceivePackRequest {
    /// Set on the first message only.
    #[prost(message, optional, tag = "1")]
    pub repository: Option<Repository>,
    /// Client input chunk.
    #[prost(bytes = "vec", tag = "2")]
    pub stdin: Vec<u8>,
    /// Pushing user id.
    #[prost(string, tag = "3")]
    pub gl_id: String,
    /// Repository identifier.
    #[prost(string, tag = "4")]
    pub gl_repository: String,
    /// Pushing username.
    #[prost(string, tag = "5")]
    pub gl_username: String,
    /// Git protocol version.
    #[prost(string, tag = "6")]
    pub git_protocol: String,
    /// Extra `-c` options for git.
    #[prost(string, repeated, tag = "7")]
    pub git_config_options: Vec<String>,
}

/// `SSHUploadArchive` request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SshUploadArchiveRequest {
    /// Set on the first message only.
    #[prost(message, optional, tag = "1")]
    pub repository: Option<Repository>,
    /// Client input chunk.
    #[prost(bytes = "vec", tag = "2")]
    pub stdin: Vec<u8>,
}

/// Response shared by the three transfer calls.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SshResponse {
    /// Output chunk for the client.
    #[prost(bytes = "vec", tag = "1")]
    pub stdout: Vec<u8>,
    /// Error output chunk for the client.
    #[prost(bytes = "vec", tag = "2")]
    pub stderr: Vec<u8>,
    /// Set on the last message.
    #[prost(message, optional, tag = "3")]
    pub exit_status: Option<ExitStatus>,
}

/// Requests whose follow-up messages carry only a stdin chunk.
pub trait StdinRequest: ::prost::Message + Default + Send + Sync + 'static {
    /// A follow-up message carrying `chunk`.
    fn stdin(chunk: Vec<u8>) -> Self;
}

impl StdinRequest for SshUploadPackRequest {
    fn stdin(chunk: Vec<u8>) -> Self {
        Self {
            stdin: chunk,
            ..Self::default()
        }
    }
}

impl StdinRequest for SshReceivePackRequest {
    fn stdin(chunk: Vec<u8>) -> Self {
        Self {
            stdin: chunk,
            ..Self::default()
        }
    }
}

impl StdinRequest for SshUploadArchiveRequest {
    fn stdin(chunk: Vec<u8>) -> Self {
        Self {
            stdin: chunk,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_repository_from_descriptor() {
        let descriptor = RepositoryDescriptor {
            storage_name: "default".to_owned(),
            relative_path: "@hashed/aa/bb.git".to_owned(),
            gl_repository: "project-1".to_owned(),
            gl_project_path: "group/repo".to_owned(),
            ..RepositoryDescriptor::default()
        };
        let repo = Repository::from(&descriptor);
        assert_eq!(repo.storage_name, "default");
        assert_eq!(repo.gl_project_path, "group/repo");
    }

    #[test]
    fn test_follow_up_message_only_carries_stdin() {
        let msg = SshReceivePackRequest::stdin(b"0000".to_vec());
        assert!(msg.repository.is_none());
        assert!(msg.gl_id.is_empty());

        let decoded = SshReceivePackRequest::decode(msg.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.stdin, b"0000");
    }
}
