//! The dispatch table: entry point plus arguments to a command.
//!
//! Construction is pure. Unknown commands and commands not available on an
//! entry point fail the same way, with [`GateError::DisallowedCommand`].

use gitgate_core::{
    CommandArgs, CommandType, ExecutableKind, GateError, GateResult, ReadWriter, SessionEnv,
    ShellArgs,
};

use crate::Command;
use crate::authorized_keys::AuthorizedKeysCommand;
use crate::authorized_principals::AuthorizedPrincipalsCommand;
use crate::discover::DiscoverCommand;
use crate::healthcheck::HealthcheckCommand;
use crate::lfs_authenticate::LfsAuthenticateCommand;
use crate::personal_access_token::PersonalAccessTokenCommand;
use crate::services::Services;
use crate::transfer::{GitTransferCommand, Transfer};
use crate::two_factor::{RecoverCommand, VerifyCommand};

/// Build the command for `kind` and its parsed `args`.
///
/// # Errors
///
/// Returns [`GateError::DisallowedCommand`] if the arguments do not belong
/// to the entry point or name no known command.
pub fn build_command(
    kind: ExecutableKind,
    args: CommandArgs,
    env: SessionEnv,
    streams: ReadWriter,
    services: Services,
) -> GateResult<Box<dyn Command>> {
    match (kind, args) {
        (ExecutableKind::Shell, CommandArgs::Shell(args)) => {
            build_shell_command(args, env, streams, services)
        },
        (ExecutableKind::AuthorizedKeysCheck, CommandArgs::AuthorizedKeys(args)) => Ok(Box::new(
            AuthorizedKeysCommand::new(args, streams, services),
        )),
        (ExecutableKind::AuthorizedPrincipalsCheck, CommandArgs::AuthorizedPrincipals(args)) => Ok(
            Box::new(AuthorizedPrincipalsCommand::new(args, streams, &services)),
        ),
        (ExecutableKind::Healthcheck, CommandArgs::Healthcheck) => {
            Ok(Box::new(HealthcheckCommand::new(streams, services)))
        },
        _ => Err(GateError::DisallowedCommand),
    }
}

fn build_shell_command(
    args: ShellArgs,
    env: SessionEnv,
    streams: ReadWriter,
    services: Services,
) -> GateResult<Box<dyn Command>> {
    let Some(command_type) = args.command_type else {
        return Err(GateError::DisallowedCommand);
    };

    let command: Box<dyn Command> = match command_type {
        CommandType::Discover => Box::new(DiscoverCommand::new(args, streams, services)),
        CommandType::TwoFactorRecover => Box::new(RecoverCommand::new(args, streams, services)),
        CommandType::TwoFactorVerify => Box::new(VerifyCommand::new(args, streams, services)),
        CommandType::LfsAuthenticate => {
            Box::new(LfsAuthenticateCommand::new(args, env, streams, services))
        },
        CommandType::ReceivePack => Box::new(GitTransferCommand::new(
            Transfer::ReceivePack,
            args,
            env,
            streams,
            services,
        )),
        CommandType::UploadPack => Box::new(GitTransferCommand::new(
            Transfer::UploadPack,
            args,
            env,
            streams,
            services,
        )),
        CommandType::UploadArchive => Box::new(GitTransferCommand::new(
            Transfer::UploadArchive,
            args,
            env,
            streams,
            services,
        )),
        CommandType::PersonalAccessToken => {
            Box::new(PersonalAccessTokenCommand::new(args, streams, services))
        },
    };
    Ok(command)
}
