//! Access verification shared by data-plane and LFS commands.

use gitgate_client::{AccessRequest, AccessResponse, AccessVerifier};
use gitgate_core::console::display_info_messages;
use gitgate_core::readwriter::BoxedWriter;
use gitgate_core::{CommandContext, CommandType, GateResult, SessionEnv, ShellArgs};
use tracing::debug;

/// The client address to check IP restrictions against.
///
/// An explicitly known address wins over the session environment.
#[must_use]
pub fn check_ip(args: &ShellArgs, env: &SessionEnv) -> String {
    args.remote_addr
        .clone()
        .unwrap_or_else(|| env.remote_addr().to_owned())
}

/// Ask the control plane whether `command_type` may run on `repository`,
/// then show its console messages on the error stream.
///
/// # Errors
///
/// Returns the verifier's error unchanged, or an I/O error if the messages
/// cannot be written.
pub async fn verify_access(
    ctx: &CommandContext,
    verifier: &dyn AccessVerifier,
    request: AccessRequest,
    err_output: &mut BoxedWriter,
) -> GateResult<AccessResponse> {
    debug!(
        command = %request.command_type,
        repository = %request.repository,
        "verifying access"
    );
    let response = verifier.verify(ctx, &request).await?;
    display_info_messages(&response.gl_console_messages, err_output).await?;
    Ok(response)
}

/// Build the request for a shell session.
#[must_use]
pub fn access_request(
    command_type: CommandType,
    repository: &str,
    args: &ShellArgs,
    env: &SessionEnv,
) -> AccessRequest {
    AccessRequest {
        command_type,
        repository: repository.to_owned(),
        who: args.who.clone(),
        check_ip: check_ip(args, env),
    }
}
