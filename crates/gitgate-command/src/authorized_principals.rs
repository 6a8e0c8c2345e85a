//! sshd `AuthorizedPrincipalsCommand`: one forced-command line per
//! certificate principal. Needs no control-plane call.

use std::fmt::Write as _;

use async_trait::async_trait;
use gitgate_core::{
    AuthorizedPrincipalsArgs, CommandContext, Executable, ExecutableKind, GateResult, ReadWriter,
};

use crate::Command;
use crate::authorized_keys::authorized_keys_line;
use crate::output::write_text;
use crate::services::Services;

/// Prints the principal lines for a certificate key id.
#[derive(Debug)]
pub struct AuthorizedPrincipalsCommand {
    args: AuthorizedPrincipalsArgs,
    streams: ReadWriter,
    executable: Executable,
}

impl AuthorizedPrincipalsCommand {
    /// Build the command.
    #[must_use]
    pub fn new(args: AuthorizedPrincipalsArgs, streams: ReadWriter, services: &Services) -> Self {
        Self {
            args,
            streams,
            executable: Executable::with_root_dir(
                ExecutableKind::AuthorizedPrincipalsCheck,
                services.config.root_dir.clone(),
            ),
        }
    }
}

fn principal_lines(executable: &Executable, args: &AuthorizedPrincipalsArgs) -> String {
    let principal = format!("username-{}", args.key_id);
    args.principals.iter().fold(String::new(), |mut out, name| {
        let _ = writeln!(out, "{}", authorized_keys_line(executable, &principal, name));
        out
    })
}

#[async_trait]
impl Command for AuthorizedPrincipalsCommand {
    async fn execute(self: Box<Self>, _ctx: &CommandContext) -> GateResult<()> {
        let Self {
            args,
            mut streams,
            executable,
        } = *self;
        write_text(&mut streams.output, &principal_lines(&executable, &args)).await
    }
}
