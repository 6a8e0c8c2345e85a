//! gitgate CLI - the process entry points.
//!
//! Every binary is a thin `main` around [`run`]: load configuration, set up
//! logging, capture the session environment, parse arguments, build the
//! command and execute it. Failures are written to stderr and turn into a
//! non-zero exit status.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use gitgate_command::{Services, build_command};
use gitgate_config::Config;
use gitgate_core::console::format_warning_message;
use gitgate_core::{
    CommandArgs, CommandContext, Executable, ExecutableKind, ReadWriter, SessionEnv,
};
use gitgate_telemetry::{LogConfig, setup_logging};
use tracing::{debug, error};

/// Variable carrying a correlation id from an upstream caller.
pub const CORRELATION_ID_ENV: &str = "CORRELATION_ID";

/// Log file used by the shell when none is configured.
const SHELL_LOG_FILE: &str = "gitgate-shell.log";

/// Options shared by every entry point.
#[derive(Debug, Parser)]
#[command(version, about = "gitgate SSH command gateway")]
pub struct EntryArgs {
    /// Directory holding `config.toml`. Defaults to the installation root.
    #[arg(long, env = "GITGATE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Arguments passed by sshd.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Run the entry point `kind` with the process arguments.
pub async fn run(kind: ExecutableKind) -> ExitCode {
    let cli = EntryArgs::parse();
    match execute(kind, cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), executable = %kind, "command failed");
            eprint!("{}", render_error(kind, &e));
            ExitCode::FAILURE
        },
    }
}

async fn execute(kind: ExecutableKind, cli: EntryArgs) -> Result<()> {
    let executable = Executable::new(kind)?;
    let config_dir = cli
        .config_dir
        .unwrap_or_else(|| executable.root_dir.clone());
    let mut config = Config::load_from_dir(&config_dir)
        .with_context(|| format!("failed to load config from {}", config_dir.display()))?;
    config.root_dir.clone_from(&executable.root_dir);

    if let Err(e) = setup_logging(&log_config(kind, &config)?) {
        eprint!("{}", logging_failure(kind, &e));
    }

    let env = SessionEnv::from_process();
    let args = CommandArgs::parse(kind, &cli.args, &env)?;
    let ctx = CommandContext::inherit_or_generate(std::env::var(CORRELATION_ID_ENV).ok());
    debug!(
        executable = %kind,
        correlation_id = %ctx.correlation_id(),
        "starting command"
    );

    let services = Services::from_config(config)?;
    let command = build_command(kind, args, env, ReadWriter::stdio(), services)?;
    command.execute(&ctx).await?;
    Ok(())
}

/// Logging for `kind`, with file paths resolved against the root directory.
///
/// The shell's stderr belongs to the git client, so it logs to a file even
/// when none is configured.
fn log_config(kind: ExecutableKind, config: &Config) -> Result<LogConfig> {
    let mut settings = config.logging.clone();
    settings.file = match settings.file.take() {
        Some(file) => Some(resolve(&config.root_dir, file)),
        None if kind == ExecutableKind::Shell => Some(config.root_dir.join(SHELL_LOG_FILE)),
        None => None,
    };
    LogConfig::from_settings(&settings).context("invalid logging configuration")
}

fn resolve(root: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

/// Warning printed when logging cannot be installed. The run continues.
fn logging_failure(kind: ExecutableKind, error: &impl std::fmt::Display) -> String {
    let message = format!("Failed to initialize logging: {error}");
    match kind {
        ExecutableKind::Shell => format_warning_message(&message),
        ExecutableKind::AuthorizedKeysCheck
        | ExecutableKind::AuthorizedPrincipalsCheck
        | ExecutableKind::Healthcheck => format!("{message}\n"),
    }
}

/// The text shown to the user for a failed run.
///
/// The shell frames it as a `remote:` warning so git clients display it;
/// the sshd helpers print a plain line.
#[must_use]
pub fn render_error(kind: ExecutableKind, error: &anyhow::Error) -> String {
    let message = format!("{error:#}");
    match kind {
        ExecutableKind::Shell => format_warning_message(&message),
        ExecutableKind::AuthorizedKeysCheck
        | ExecutableKind::AuthorizedPrincipalsCheck
        | ExecutableKind::Healthcheck => format!("{}: {message}\n", kind.binary_name()),
    }
}

#[cfg(test)]
mod tests {
    use gitgate_core::GateError;

    use super::*;

    #[test]
    fn test_shell_errors_are_framed() {
        let err = anyhow::Error::new(GateError::DisallowedCommand);
        let text = render_error(ExecutableKind::Shell, &err);
        assert!(text.contains("remote: Disallowed command\n"));
        assert!(text.contains(&"=".repeat(72)));
    }

    #[test]
    fn test_helper_errors_are_plain() {
        let err = anyhow::Error::new(GateError::Unavailable(
            "Redis available via internal API: FAILED".to_owned(),
        ));
        assert_eq!(
            render_error(ExecutableKind::Healthcheck, &err),
            "gitgate-check: Redis available via internal API: FAILED\n"
        );
    }

    #[test]
    fn test_context_is_included() {
        let err = anyhow::Error::new(GateError::Configuration("missing".to_owned()))
            .context("failed to load config");
        let text = render_error(ExecutableKind::AuthorizedKeysCheck, &err);
        assert_eq!(
            text,
            "gitgate-authorized-keys-check: failed to load config: configuration error: missing\n"
        );
    }

    #[test]
    fn test_logging_failure_is_framed_for_the_shell() {
        let shell = logging_failure(ExecutableKind::Shell, &"bad filter");
        assert!(shell.contains("remote: Failed to initialize logging: bad filter\n"));
        assert!(shell.contains(&"=".repeat(72)));

        assert_eq!(
            logging_failure(ExecutableKind::Healthcheck, &"bad filter"),
            "Failed to initialize logging: bad filter\n"
        );
    }

    #[test]
    fn test_shell_logs_to_file_by_default() {
        let mut config = Config::with_gitlab_url("http://localhost");
        config.root_dir = PathBuf::from("/opt/gitgate");

        let shell = log_config(ExecutableKind::Shell, &config).unwrap();
        assert_eq!(
            shell.target,
            gitgate_telemetry::LogTarget::File(PathBuf::from("/opt/gitgate/gitgate-shell.log"))
        );

        let check = log_config(ExecutableKind::Healthcheck, &config).unwrap();
        assert_eq!(check.target, gitgate_telemetry::LogTarget::Stderr);
    }

    #[test]
    fn test_relative_log_file_resolves_against_root() {
        let mut config = Config::with_gitlab_url("http://localhost");
        config.root_dir = PathBuf::from("/opt/gitgate");
        config.logging.file = Some(PathBuf::from("log/check.log"));

        let check = log_config(ExecutableKind::Healthcheck, &config).unwrap();
        assert_eq!(
            check.target,
            gitgate_telemetry::LogTarget::File(PathBuf::from("/opt/gitgate/log/check.log"))
        );
    }

    #[test]
    fn test_entry_args_accept_sshd_arguments() {
        let cli = EntryArgs::try_parse_from(["gitgate-shell", "key-123"]).unwrap();
        assert_eq!(cli.args, vec!["key-123"]);

        let cli = EntryArgs::try_parse_from([
            "gitgate-authorized-keys-check",
            "--config-dir",
            "/etc/gitgate",
            "git",
            "git",
            "AAAAB3NzaC1",
        ])
        .unwrap();
        assert_eq!(cli.config_dir, Some(PathBuf::from("/etc/gitgate")));
        assert_eq!(cli.args.len(), 3);
    }
}
