//! Post-load validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const SUPPORTED_SCHEMES: [&str; 3] = ["http+unix://", "http://", "https://"];
const LOG_FORMATS: [&str; 2] = ["text", "json"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a fully loaded configuration.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] naming the first invalid field.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_gitlab_url(config)?;
    validate_logging(config)?;
    validate_http_settings(config)?;
    Ok(())
}

fn validate_gitlab_url(config: &Config) -> ConfigResult<()> {
    let url = config.gitlab_url.trim();
    if url.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "gitlab_url".to_owned(),
            message: "must be set".to_owned(),
        });
    }
    if !SUPPORTED_SCHEMES.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::ValidationError {
            field: "gitlab_url".to_owned(),
            message: format!(
                "unsupported scheme in {url:?} (expected one of {})",
                SUPPORTED_SCHEMES.join(", ")
            ),
        });
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let logging = &config.logging;
    if !LOG_FORMATS.contains(&logging.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!("expected \"text\" or \"json\", got {:?}", logging.format),
        });
    }
    if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!("unknown level {:?}", logging.level),
        });
    }
    Ok(())
}

fn validate_http_settings(config: &Config) -> ConfigResult<()> {
    let http = &config.http_settings;
    if http.client_cert.is_some() != http.client_key.is_some() {
        return Err(ConfigError::ValidationError {
            field: "http_settings.client_cert".to_owned(),
            message: "client_cert and client_key must be set together".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn valid() -> Config {
        Config::with_gitlab_url("http+unix:///var/run/gitlab.socket")
    }

    #[test]
    fn test_default_with_url_is_valid() {
        assert!(validate(&valid()).is_ok());
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let config = Config::with_gitlab_url("ftp://example.com");
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("gitlab_url"));
    }

    #[test]
    fn test_bad_log_format_rejected() {
        let mut config = valid();
        config.logging.format = "xml".to_owned();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("logging.format"));
    }

    #[test]
    fn test_unpaired_client_cert_rejected() {
        let mut config = valid();
        config.http_settings.client_cert = Some(PathBuf::from("/tmp/cert.pem"));
        assert!(validate(&config).is_err());

        config.http_settings.client_key = Some(PathBuf::from("/tmp/key.pem"));
        assert!(validate(&config).is_ok());
    }
}
