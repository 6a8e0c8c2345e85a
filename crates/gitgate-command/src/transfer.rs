//! Data-plane commands: fetch, push and archive.
//!
//! Each run follows the same sequence: check the token shape, verify
//! access, hand over to a custom action if the control plane asks for one,
//! otherwise open a storage backend session and stream the transfer.

use async_trait::async_trait;
use gitgate_core::{
    CommandContext, CommandType, GateError, GateResult, ReadWriter, SessionEnv, ShellArgs,
};
use gitgate_gitaly::proto::{
    Repository, SshReceivePackRequest, SshUploadArchiveRequest, SshUploadPackRequest,
};
use gitgate_gitaly::{ExecutionRecord, GitalyCommand, check_exit_status};
use tracing::debug;

use crate::Command;
use crate::access::{access_request, check_ip, verify_access};
use crate::custom_action::InputEnd;
use crate::services::Services;

/// Raw token count of a data-plane command line: `<command> <repository>`.
const TRANSFER_TOKENS: usize = 2;

/// Which transfer a data-plane command performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// `git-upload-pack`: the client fetches.
    UploadPack,
    /// `git-receive-pack`: the client pushes.
    ReceivePack,
    /// `git-upload-archive`: the client downloads an archive.
    UploadArchive,
}

impl Transfer {
    /// The command type checked with the control plane.
    #[must_use]
    pub fn command_type(self) -> CommandType {
        match self {
            Self::UploadPack => CommandType::UploadPack,
            Self::ReceivePack => CommandType::ReceivePack,
            Self::UploadArchive => CommandType::UploadArchive,
        }
    }

    /// Service name used for tracing and the execution record.
    #[must_use]
    pub fn service_name(self) -> &'static str {
        self.command_type().as_str()
    }

    /// Where a client request ends when relayed by a custom action.
    #[must_use]
    pub fn input_end(self) -> InputEnd {
        match self {
            Self::ReceivePack => InputEnd::Flush,
            Self::UploadPack | Self::UploadArchive => InputEnd::Done,
        }
    }
}

/// A fetch, push or archive session.
#[derive(Debug)]
pub struct GitTransferCommand {
    transfer: Transfer,
    args: ShellArgs,
    env: SessionEnv,
    streams: ReadWriter,
    services: Services,
}

impl GitTransferCommand {
    /// Build the command. Performs no I/O.
    #[must_use]
    pub fn new(
        transfer: Transfer,
        args: ShellArgs,
        env: SessionEnv,
        streams: ReadWriter,
        services: Services,
    ) -> Self {
        Self {
            transfer,
            args,
            env,
            streams,
            services,
        }
    }

    /// The git protocol version to advertise to the backend.
    ///
    /// Forced-command sessions with an explicit client address do not
    /// reliably inherit the session environment, so the version recorded
    /// with the arguments is used for them.
    fn git_protocol(&self) -> String {
        if self.args.remote_addr.is_some() {
            self.args.git_protocol_version.clone()
        } else {
            self.env.git_protocol_version().to_owned()
        }
    }
}

#[async_trait]
impl Command for GitTransferCommand {
    async fn execute(self: Box<Self>, ctx: &CommandContext) -> GateResult<()> {
        let [_, repository] = self.args.ssh_args.as_slice() else {
            debug!(
                tokens = self.args.ssh_args.len(),
                expected = TRANSFER_TOKENS,
                "rejecting malformed transfer command"
            );
            return Err(GateError::DisallowedCommand);
        };

        let git_protocol = self.git_protocol();
        let remote_ip = check_ip(&self.args, &self.env);
        let request = access_request(
            self.transfer.command_type(),
            repository,
            &self.args,
            &self.env,
        );

        let Self {
            transfer,
            mut streams,
            services,
            ..
        } = *self;

        let response = verify_access(
            ctx,
            services.verifier.as_ref(),
            request,
            &mut streams.err_output,
        )
        .await?;

        if response.is_custom_action() {
            return services
                .custom_action
                .execute(ctx, &response, transfer.input_end(), streams)
                .await;
        }

        let command = GitalyCommand::from_access(transfer.service_name(), &response)
            .with_config(&services.config);
        let record = ExecutionRecord::from_access(&response, git_protocol.clone(), remote_ip);
        let repository = Repository::from(&response.backend.repo);

        command
            .run(
                ctx,
                &record,
                services.dialer.as_ref(),
                services.tracer.as_ref(),
                |call, connection| async move {
                    let code = match transfer {
                        Transfer::UploadPack => {
                            let request = SshUploadPackRequest {
                                repository: Some(repository),
                                git_config_options: response.git_config_options,
                                git_protocol,
                                ..SshUploadPackRequest::default()
                            };
                            connection.ssh_upload_pack(&call, request, streams).await?
                        },
                        Transfer::ReceivePack => {
                            let request = SshReceivePackRequest {
                                repository: Some(repository),
                                gl_id: response.user_id,
                                gl_repository: response.gl_repository,
                                gl_username: response.username,
                                git_protocol,
                                git_config_options: response.git_config_options,
                                ..SshReceivePackRequest::default()
                            };
                            connection.ssh_receive_pack(&call, request, streams).await?
                        },
                        Transfer::UploadArchive => {
                            let request = SshUploadArchiveRequest {
                                repository: Some(repository),
                                ..SshUploadArchiveRequest::default()
                            };
                            connection.ssh_upload_archive(&call, request, streams).await?
                        },
                    };
                    check_exit_status(code)
                },
            )
            .await
    }
}
