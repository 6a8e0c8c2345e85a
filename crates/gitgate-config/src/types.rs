//! Configuration types.
//!
//! Every struct implements [`Default`] so that an empty `config.toml` (or a
//! bare `[section]` header) produces a usable configuration apart from the
//! control-plane URL, which validation requires.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default name of the shared-secret file, relative to the root directory.
pub const DEFAULT_SECRET_FILE: &str = ".gitlab_shell_secret";

/// Default HTTP read timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control-plane URL (`http+unix://`, `http://` or `https://`).
    pub gitlab_url: String,
    /// Relative URL root, used only with Unix-socket URLs.
    pub gitlab_relative_url_root: String,
    /// Shared secret. Prefer `secret_file` or `GITLAB_SHELL_SECRET`.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Path of the shared-secret file; relative paths resolve against the
    /// root directory.
    pub secret_file: Option<PathBuf>,
    /// Tracing connection string for per-command tracing sessions.
    pub gitlab_tracing: Option<String>,
    /// Extra directory of trusted CA certificates.
    pub ssl_cert_dir: Option<PathBuf>,
    /// Control-plane HTTP client settings.
    pub http_settings: HttpSettings,
    /// Log level, format and destination.
    pub logging: LoggingSection,
    /// Storage backend settings.
    pub gitaly: GitalySection,
    /// Installation root the configuration was loaded from.
    #[serde(skip)]
    pub root_dir: PathBuf,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gitlab_url", &self.gitlab_url)
            .field("gitlab_relative_url_root", &self.gitlab_relative_url_root)
            .field("has_secret", &self.secret.is_some())
            .field("secret_file", &self.secret_file)
            .field("gitlab_tracing", &self.gitlab_tracing)
            .field("ssl_cert_dir", &self.ssl_cert_dir)
            .field("http_settings", &self.http_settings)
            .field("logging", &self.logging)
            .field("gitaly", &self.gitaly)
            .field("root_dir", &self.root_dir)
            .finish()
    }
}

impl Config {
    /// Build a config pointing at the given control-plane URL.
    #[must_use]
    pub fn with_gitlab_url(url: impl Into<String>) -> Self {
        Self {
            gitlab_url: url.into(),
            ..Self::default()
        }
    }

    /// The resolved shared secret, empty when none is configured.
    #[must_use]
    pub fn secret(&self) -> &str {
        self.secret.as_deref().unwrap_or_default()
    }

    /// Absolute path of the secret file.
    #[must_use]
    pub fn secret_file_path(&self) -> PathBuf {
        let file = self
            .secret_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRET_FILE));
        if file.is_absolute() {
            file
        } else {
            self.root_dir.join(file)
        }
    }

    /// The tracing connection string, if tracing is configured.
    #[must_use]
    pub fn tracing_connection_string(&self) -> Option<&str> {
        self.gitlab_tracing.as_deref().filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// HttpSettings
// ---------------------------------------------------------------------------

/// Control-plane HTTP client settings.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// HTTP basic-auth user.
    pub user: Option<String>,
    /// HTTP basic-auth password.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Read timeout in seconds; `0` means the default of 300.
    pub read_timeout: u64,
    /// Single extra CA certificate file.
    pub ca_file: Option<PathBuf>,
    /// Directory of extra CA certificate files.
    pub ca_path: Option<PathBuf>,
    /// Disable server certificate verification.
    pub self_signed_cert: bool,
    /// Client certificate for mutual TLS.
    pub client_cert: Option<PathBuf>,
    /// Client key for mutual TLS.
    pub client_key: Option<PathBuf>,
}

impl std::fmt::Debug for HttpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSettings")
            .field("user", &self.user)
            .field("has_password", &self.password.is_some())
            .field("read_timeout", &self.read_timeout)
            .field("ca_file", &self.ca_file)
            .field("ca_path", &self.ca_path)
            .field("self_signed_cert", &self.self_signed_cert)
            .field("client_cert", &self.client_cert)
            .field("client_key", &self.client_key)
            .finish()
    }
}

impl HttpSettings {
    /// Effective read timeout in seconds.
    #[must_use]
    pub fn read_timeout_secs(&self) -> u64 {
        if self.read_timeout == 0 {
            DEFAULT_READ_TIMEOUT_SECS
        } else {
            self.read_timeout
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"` .. `"error"`).
    pub level: String,
    /// Output format: `"text"` or `"json"`.
    pub format: String,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
    /// Per-crate tracing directives (e.g. `["gitgate_gitaly=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "text".to_owned(),
            file: None,
            directives: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// GitalySection
// ---------------------------------------------------------------------------

/// Storage backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitalySection {
    /// Working directory adopted before dialing the backend.
    pub working_dir: PathBuf,
}

impl Default for GitalySection {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("/"),
        }
    }
}
