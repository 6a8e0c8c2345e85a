//! sshd `AuthorizedKeysCommand`: turn an offered key into a forced command.

use async_trait::async_trait;
use gitgate_client::api::authorized_keys::find;
use gitgate_core::{
    AuthorizedKeysArgs, CommandContext, Executable, ExecutableKind, GateResult, ReadWriter,
};
use tracing::debug;

use crate::Command;
use crate::output::write_text;
use crate::services::Services;

/// sshd options applied to every gateway key.
pub const SSH_OPTIONS: &str = "no-port-forwarding,no-X11-forwarding,no-agent-forwarding,no-pty";

/// Looks up a key and prints its `authorized_keys` line.
#[derive(Debug)]
pub struct AuthorizedKeysCommand {
    args: AuthorizedKeysArgs,
    streams: ReadWriter,
    services: Services,
}

impl AuthorizedKeysCommand {
    /// Build the command.
    #[must_use]
    pub fn new(args: AuthorizedKeysArgs, streams: ReadWriter, services: Services) -> Self {
        Self {
            args,
            streams,
            services,
        }
    }
}

/// One `authorized_keys` line forcing the shell for `principal`.
#[must_use]
pub fn authorized_keys_line(executable: &Executable, principal: &str, key: &str) -> String {
    format!(
        "command=\"{} {principal}\",{SSH_OPTIONS} {key}",
        executable.shell_path().display()
    )
}

#[async_trait]
impl Command for AuthorizedKeysCommand {
    async fn execute(self: Box<Self>, ctx: &CommandContext) -> GateResult<()> {
        let Self {
            args,
            mut streams,
            services,
        } = *self;

        if args.expected_user != args.actual_user {
            debug!(
                expected = %args.expected_user,
                actual = %args.actual_user,
                "login user is not the git user, no keys to offer"
            );
            return Ok(());
        }

        let text = match find(&services.api, ctx, &args.key).await? {
            Some(found) => {
                let executable = Executable::with_root_dir(
                    ExecutableKind::AuthorizedKeysCheck,
                    services.config.root_dir.clone(),
                );
                authorized_keys_line(&executable, &format!("key-{}", found.id), &found.key)
            },
            None => format!("# No key was found for {}", args.key),
        };
        write_text(&mut streams.output, &format!("{text}\n")).await
    }
}
