//! `gitgate-authorized-keys-check`: sshd `AuthorizedKeysCommand` looking up offered keys.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]

use std::process::ExitCode;

use gitgate_core::ExecutableKind;

#[tokio::main]
async fn main() -> ExitCode {
    gitgate_cli::run(ExecutableKind::AuthorizedKeysCheck).await
}
