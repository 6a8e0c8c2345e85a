//! `ssh git@host` with no command: greet the user.

use async_trait::async_trait;
use gitgate_client::api::discover::discover;
use gitgate_core::{CommandContext, GateResult, ReadWriter, ShellArgs};

use crate::Command;
use crate::output::write_text;
use crate::services::Services;

/// Looks up the authenticated user and prints a welcome line.
#[derive(Debug)]
pub struct DiscoverCommand {
    args: ShellArgs,
    streams: ReadWriter,
    services: Services,
}

impl DiscoverCommand {
    /// Build the command.
    #[must_use]
    pub fn new(args: ShellArgs, streams: ReadWriter, services: Services) -> Self {
        Self {
            args,
            streams,
            services,
        }
    }
}

#[async_trait]
impl Command for DiscoverCommand {
    async fn execute(self: Box<Self>, ctx: &CommandContext) -> GateResult<()> {
        let Self {
            args,
            mut streams,
            services,
        } = *self;

        let user = discover(&services.api, ctx, &args.who).await?;
        let greeting = if user.is_anonymous() {
            "Welcome to GitLab, Anonymous!\n".to_owned()
        } else {
            format!("Welcome to GitLab, @{}!\n", user.username)
        };
        write_text(&mut streams.output, &greeting).await
    }
}
