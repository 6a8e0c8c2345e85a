//! `git-lfs-authenticate <repo> <upload|download>`.

use async_trait::async_trait;
use gitgate_client::api::lfs::authenticate;
use gitgate_core::{
    CommandContext, CommandType, GateError, GateResult, ReadWriter, SessionEnv, ShellArgs,
};

use crate::Command;
use crate::access::{access_request, verify_access};
use crate::output::write_text;
use crate::services::Services;

/// Issues short-lived LFS credentials for a repository.
#[derive(Debug)]
pub struct LfsAuthenticateCommand {
    args: ShellArgs,
    env: SessionEnv,
    streams: ReadWriter,
    services: Services,
}

impl LfsAuthenticateCommand {
    /// Build the command.
    #[must_use]
    pub fn new(args: ShellArgs, env: SessionEnv, streams: ReadWriter, services: Services) -> Self {
        Self {
            args,
            env,
            streams,
            services,
        }
    }
}

/// The access checked for an LFS operation.
fn operation_access(operation: &str) -> Option<CommandType> {
    match operation {
        "upload" => Some(CommandType::ReceivePack),
        "download" => Some(CommandType::UploadPack),
        _ => None,
    }
}

#[async_trait]
impl Command for LfsAuthenticateCommand {
    async fn execute(self: Box<Self>, ctx: &CommandContext) -> GateResult<()> {
        let Self {
            args,
            env,
            mut streams,
            services,
        } = *self;

        let [_, repository, operation, ..] = args.ssh_args.as_slice() else {
            return Err(GateError::DisallowedCommand);
        };
        let command_type = operation_access(operation).ok_or(GateError::DisallowedCommand)?;

        let request = access_request(command_type, repository, &args, &env);
        verify_access(
            ctx,
            services.verifier.as_ref(),
            request,
            &mut streams.err_output,
        )
        .await?;

        let credentials = authenticate(&services.api, ctx, &args.who, repository, operation).await?;
        let payload = serde_json::to_string(&credentials.into_payload())
            .map_err(|e| GateError::protocol(format!("failed to encode LFS credentials: {e}")))?;
        write_text(&mut streams.output, &format!("{payload}\n")).await
    }
}
