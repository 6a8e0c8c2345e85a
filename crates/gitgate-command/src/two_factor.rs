//! Two-factor authentication commands.

use async_trait::async_trait;
use gitgate_client::api::two_factor::{recovery_codes, verify_otp};
use gitgate_core::{CommandContext, GateResult, ReadWriter, ShellArgs};
use tracing::info;

use crate::Command;
use crate::output::{read_answer, write_text};
use crate::services::Services;

const RECOVER_PROMPT: &str = "Are you sure you want to generate new two-factor recovery codes?\n\
    Any existing recovery codes you saved will be invalidated. (yes/no)\n";

const RECOVER_CANCELLED: &str =
    "\nNew recovery codes have *not* been generated. Existing codes will remain valid.\n";

/// Regenerates two-factor recovery codes after confirmation.
#[derive(Debug)]
pub struct RecoverCommand {
    args: ShellArgs,
    streams: ReadWriter,
    services: Services,
}

impl RecoverCommand {
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
impl Command for RecoverCommand {
    async fn execute(self: Box<Self>, ctx: &CommandContext) -> GateResult<()> {
        let Self {
            args,
            mut streams,
            services,
        } = *self;

        write_text(&mut streams.output, RECOVER_PROMPT).await?;
        let answer = read_answer(&mut streams.input).await?;
        if answer.trim() != "yes" {
            return write_text(&mut streams.output, RECOVER_CANCELLED).await;
        }

        let response = recovery_codes(&services.api, ctx, &args.who).await?;
        let text = if response.success {
            info!("two-factor recovery codes regenerated");
            format_codes(&response.recovery_codes)
        } else {
            format!(
                "\nAn error occurred while trying to generate new recovery codes.\n{}\n",
                response.message
            )
        };
        write_text(&mut streams.output, &text).await
    }
}

fn format_codes(codes: &[String]) -> String {
    format!(
        "Your two-factor authentication recovery codes are:\n\n{}\n\n\
         During sign in, use one of the codes above when prompted for\n\
         your two-factor code. Then, visit your Profile Settings and add\n\
         a new device so you do not lose access to your account again.\n",
        codes.join("\n")
    )
}

/// Checks a one-time password to unlock git operations.
#[derive(Debug)]
pub struct VerifyCommand {
    args: ShellArgs,
    streams: ReadWriter,
    services: Services,
}

impl VerifyCommand {
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
impl Command for VerifyCommand {
    async fn execute(self: Box<Self>, ctx: &CommandContext) -> GateResult<()> {
        let Self {
            args,
            mut streams,
            services,
        } = *self;

        write_text(&mut streams.output, "OTP: ").await?;
        let otp = read_answer(&mut streams.input).await?;

        let response = verify_otp(&services.api, ctx, &args.who, otp.trim()).await?;
        let text = if response.success {
            "\nOTP validation successful. Git operations are now allowed.\n".to_owned()
        } else {
            format!("\nOTP validation failed: {}\n", response.message)
        };
        write_text(&mut streams.output, &text).await
    }
}
