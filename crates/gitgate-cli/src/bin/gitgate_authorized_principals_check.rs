//! `gitgate-authorized-principals-check`: sshd `AuthorizedPrincipalsCommand` for certificate logins.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]

use std::process::ExitCode;

use gitgate_core::ExecutableKind;

#[tokio::main]
async fn main() -> ExitCode {
    gitgate_cli::run(ExecutableKind::AuthorizedPrincipalsCheck).await
}
