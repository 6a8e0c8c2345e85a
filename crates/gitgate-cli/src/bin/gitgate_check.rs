//! `gitgate-check`: checks that the internal API and Redis are reachable.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]

use std::process::ExitCode;

use gitgate_core::ExecutableKind;

#[tokio::main]
async fn main() -> ExitCode {
    gitgate_cli::run(ExecutableKind::Healthcheck).await
}
