//! Config file loading.
//!
//! Implements the `Config::load_from_dir()` algorithm:
//! 1. Read `{root}/config.toml` (required)
//! 2. Apply environment overrides
//! 3. Record the root directory
//! 4. Resolve the shared secret
//! 5. Validate

use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Name of the configuration file inside the root directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Maximum config file size (1 MiB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Control-plane URL override.
pub const GITLAB_URL_ENV: &str = "GITLAB_URL";
/// Tracing connection string override.
pub const GITLAB_TRACING_ENV: &str = "GITLAB_TRACING";
/// Shared secret override.
pub const GITLAB_SHELL_SECRET_ENV: &str = "GITLAB_SHELL_SECRET";
/// Log format override.
pub const GITLAB_LOG_FORMAT_ENV: &str = "GITLAB_LOG_FORMAT";

/// Load `config.toml` from `root_dir`, consulting `env` for overrides.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, the
/// secret cannot be resolved, or validation fails.
pub fn load_from_dir<F>(root_dir: &Path, env: F) -> ConfigResult<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let path = root_dir.join(CONFIG_FILE_NAME);
    let mut config = load_file(&path)?;
    apply_env_overrides(&mut config, &env);
    config.root_dir = root_dir.to_path_buf();
    resolve_secret(&mut config)?;
    validate::validate(&config)?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Build a config from defaults plus environment overrides.
///
/// No secret file is consulted; the secret, if any, comes from
/// `GITLAB_SHELL_SECRET`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the result fails validation.
pub fn from_env<F>(env: F) -> ConfigResult<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = Config::default();
    apply_env_overrides(&mut config, &env);
    validate::validate(&config)?;
    Ok(config)
}

/// Read and parse a single config file without overrides or validation.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is unreadable, oversized or
/// malformed.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    // Check size after reading to avoid TOCTOU between stat and read.
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {} byte limit",
                content.len(),
                MAX_CONFIG_FILE_SIZE
            ),
        });
    }

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })
}

fn apply_env_overrides<F>(config: &mut Config, env: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| env(key).filter(|v| !v.is_empty());

    if let Some(url) = non_empty(GITLAB_URL_ENV) {
        config.gitlab_url = url;
    }
    if let Some(tracing) = non_empty(GITLAB_TRACING_ENV) {
        config.gitlab_tracing = Some(tracing);
    }
    if let Some(secret) = non_empty(GITLAB_SHELL_SECRET_ENV) {
        config.secret = Some(secret);
    }
    if let Some(format) = non_empty(GITLAB_LOG_FORMAT_ENV) {
        config.logging.format = format;
    }
}

fn resolve_secret(config: &mut Config) -> ConfigResult<()> {
    if config.secret.as_deref().is_some_and(|s| !s.is_empty()) {
        return Ok(());
    }

    let path = config.secret_file_path();
    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    config.secret = Some(content.trim().to_owned());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_root(config: &str, secret: Option<&str>) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), config).unwrap();
        if let Some(secret) = secret {
            std::fs::write(dir.path().join(".gitlab_shell_secret"), secret).unwrap();
        }
        dir
    }

    #[test]
    fn test_load_reads_secret_file() {
        let dir = write_root("gitlab_url = \"http://localhost:8080\"\n", Some("s3cret\n"));
        let config = load_from_dir(dir.path(), no_env).unwrap();

        assert_eq!(config.gitlab_url, "http://localhost:8080");
        assert_eq!(config.secret(), "s3cret");
        assert_eq!(config.root_dir, dir.path());
        assert_eq!(config.gitaly.working_dir, PathBuf::from("/"));
    }

    #[test]
    fn test_explicit_secret_wins_over_file() {
        let dir = write_root(
            "gitlab_url = \"http://localhost\"\nsecret = \"inline\"\n",
            Some("from-file"),
        );
        let config = load_from_dir(dir.path(), no_env).unwrap();
        assert_eq!(config.secret(), "inline");
    }

    #[test]
    fn test_missing_secret_file_is_an_error() {
        let dir = write_root("gitlab_url = \"http://localhost\"\n", None);
        let err = load_from_dir(dir.path(), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_dir(dir.path(), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let dir = write_root(
            "gitlab_url = \"http://file\"\n[logging]\nformat = \"text\"\n",
            None,
        );
        let env: HashMap<&str, &str> = HashMap::from([
            ("GITLAB_URL", "https://env.example.com"),
            ("GITLAB_TRACING", "opentracing://jaeger"),
            ("GITLAB_SHELL_SECRET", "env-secret"),
            ("GITLAB_LOG_FORMAT", "json"),
        ]);
        let config =
            load_from_dir(dir.path(), |k| env.get(k).map(|v| (*v).to_owned())).unwrap();

        assert_eq!(config.gitlab_url, "https://env.example.com");
        assert_eq!(config.tracing_connection_string(), Some("opentracing://jaeger"));
        assert_eq!(config.secret(), "env-secret");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let dir = write_root("gitlab_url = [", Some("s"));
        let err = load_from_dir(dir.path(), no_env).unwrap_err();
        match err {
            ConfigError::ParseError { path, .. } => assert!(path.ends_with(CONFIG_FILE_NAME)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let padding = "#".repeat(1_100_000);
        std::fs::write(&path, padding).unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn test_from_env_requires_url() {
        assert!(from_env(no_env).is_err());
        let config = from_env(|k| (k == "GITLAB_URL").then(|| "http://x".to_owned())).unwrap();
        assert_eq!(config.gitlab_url, "http://x");
    }
}
