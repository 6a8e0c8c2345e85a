//! Inputs to [`build_client`](crate::build_client).

use std::path::PathBuf;
use std::time::Duration;

use gitgate_config::{Config, DEFAULT_READ_TIMEOUT_SECS};

/// Everything needed to build the control-plane HTTP client.
#[derive(Clone, Default)]
pub struct ClientOptions {
    /// Control-plane URL; its scheme selects the transport.
    pub base_url: String,
    /// Relative URL root, appended to the synthetic host for Unix sockets.
    pub relative_url_root: String,
    /// Single extra CA certificate file.
    pub ca_file: Option<PathBuf>,
    /// Directory of extra CA certificate files.
    pub ca_path: Option<PathBuf>,
    /// Additional trust directory (the `ssl_cert_dir` setting).
    pub ssl_cert_dir: Option<PathBuf>,
    /// Disable server certificate verification.
    pub self_signed_cert: bool,
    /// Read timeout in seconds; `0` selects the default.
    pub read_timeout_secs: u64,
    /// Client certificate for mutual TLS.
    pub client_cert: Option<PathBuf>,
    /// Client key for mutual TLS.
    pub client_key: Option<PathBuf>,
    /// Shared secret sent with every request.
    pub secret: String,
    /// HTTP basic-auth user.
    pub user: Option<String>,
    /// HTTP basic-auth password.
    pub password: Option<String>,
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("base_url", &self.base_url)
            .field("relative_url_root", &self.relative_url_root)
            .field("ca_file", &self.ca_file)
            .field("ca_path", &self.ca_path)
            .field("ssl_cert_dir", &self.ssl_cert_dir)
            .field("self_signed_cert", &self.self_signed_cert)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("client_cert", &self.client_cert)
            .field("client_key", &self.client_key)
            .field("has_secret", &!self.secret.is_empty())
            .field("user", &self.user)
            .field("has_password", &self.password.is_some())
            .finish()
    }
}

impl ClientOptions {
    /// Options for the given control-plane URL with everything else default.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Derive options from the process configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let http = &config.http_settings;
        Self {
            base_url: config.gitlab_url.clone(),
            relative_url_root: config.gitlab_relative_url_root.clone(),
            ca_file: http.ca_file.clone(),
            ca_path: http.ca_path.clone(),
            ssl_cert_dir: config.ssl_cert_dir.clone(),
            self_signed_cert: http.self_signed_cert,
            read_timeout_secs: http.read_timeout,
            client_cert: http.client_cert.clone(),
            client_key: http.client_key.clone(),
            secret: config.secret().to_owned(),
            user: http.user.clone(),
            password: http.password.clone(),
        }
    }

    /// Set the shared secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    /// Set the relative URL root.
    #[must_use]
    pub fn with_relative_url_root(mut self, root: impl Into<String>) -> Self {
        self.relative_url_root = root.into();
        self
    }

    /// Add a single CA file.
    #[must_use]
    pub fn with_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_file = Some(path.into());
        self
    }

    /// Add a CA directory.
    #[must_use]
    pub fn with_ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(path.into());
        self
    }

    /// Configure a client certificate and key for mutual TLS.
    #[must_use]
    pub fn with_client_cert(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    /// Set the read timeout in seconds.
    #[must_use]
    pub fn with_read_timeout_secs(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    /// Effective request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        let secs = if self.read_timeout_secs == 0 {
            DEFAULT_READ_TIMEOUT_SECS
        } else {
            self.read_timeout_secs
        };
        Duration::from_secs(secs)
    }
}
