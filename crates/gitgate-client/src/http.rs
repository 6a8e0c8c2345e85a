//! The control-plane HTTP client.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use gitgate_core::{CommandContext, GateError, GateResult};
use reqwest::{Identity, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::options::ClientOptions;
use crate::trust::TrustStore;

/// Scheme prefix selecting the Unix-socket transport.
pub const UNIX_SOCKET_SCHEME: &str = "http+unix://";
/// Scheme prefix selecting the plaintext transport.
pub const HTTP_SCHEME: &str = "http://";
/// Scheme prefix selecting the TLS transport.
pub const HTTPS_SCHEME: &str = "https://";

/// Synthetic host used for requests sent over a Unix socket.
const SOCKET_BASE_URL: &str = "http://unix";

/// Path prefix of the internal API.
pub const INTERNAL_API_PATH: &str = "/api/v4/internal";

/// Header carrying the correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

const SECRET_HEADER: &str = "Gitlab-Shared-Secret";

/// A configured control-plane client.
///
/// Every request carries the shared secret, the optional basic-auth
/// credentials and the caller's correlation id.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    host: String,
    secret: String,
    user: Option<String>,
    password: Option<String>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("host", &self.host)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Build the control-plane client, dispatching on the URL scheme.
///
/// # Errors
///
/// - [`ClientError::UnknownScheme`] for an unsupported URL
/// - [`ClientError::ClientCertificate`] if a configured client certificate
///   or key cannot be loaded
/// - [`ClientError::Build`] if reqwest rejects the configuration
pub fn build_client(options: &ClientOptions) -> ClientResult<HttpClient> {
    let url = options.base_url.as_str();
    let builder = reqwest::Client::builder()
        .timeout(options.timeout())
        .user_agent(concat!("gitgate-shell/", env!("CARGO_PKG_VERSION")));

    let (builder, host) = if let Some(socket_path) = url.strip_prefix(UNIX_SOCKET_SCHEME) {
        (
            builder.unix_socket(std::path::PathBuf::from(socket_path)),
            socket_host(&options.relative_url_root),
        )
    } else if url.starts_with(HTTP_SCHEME) {
        (builder, url.to_owned())
    } else if url.starts_with(HTTPS_SCHEME) {
        (https_builder(builder, options)?, url.to_owned())
    } else {
        return Err(ClientError::UnknownScheme(url.to_owned()));
    };

    let client = builder.build()?;
    debug!(host = %host, "built control-plane client");

    Ok(HttpClient {
        client,
        host: host.trim_end_matches('/').to_owned(),
        secret: options.secret.clone(),
        user: options.user.clone(),
        password: options.password.clone(),
    })
}

fn socket_host(relative_url_root: &str) -> String {
    let root = relative_url_root.trim_matches('/');
    if root.is_empty() {
        SOCKET_BASE_URL.to_owned()
    } else {
        format!("{SOCKET_BASE_URL}/{root}")
    }
}

fn https_builder(
    mut builder: reqwest::ClientBuilder,
    options: &ClientOptions,
) -> ClientResult<reqwest::ClientBuilder> {
    let dirs: Vec<&std::path::Path> = options
        .ca_path
        .iter()
        .chain(options.ssl_cert_dir.iter())
        .map(std::path::PathBuf::as_path)
        .collect();
    let store = TrustStore::load(options.ca_file.as_deref(), &dirs);
    for certificate in store.into_certificates() {
        builder = builder.add_root_certificate(certificate);
    }

    builder = builder.danger_accept_invalid_certs(options.self_signed_cert);

    if let (Some(cert), Some(key)) = (&options.client_cert, &options.client_key) {
        builder = builder.identity(load_identity(cert, key)?);
    }

    Ok(builder)
}

fn load_identity(cert: &std::path::Path, key: &std::path::Path) -> ClientResult<Identity> {
    let read = |path: &std::path::Path| {
        std::fs::read(path)
            .map_err(|e| ClientError::ClientCertificate(format!("{}: {e}", path.display())))
    };
    let mut pem = read(cert)?;
    pem.push(b'\n');
    pem.extend(read(key)?);
    Identity::from_pem(&pem).map_err(|e| ClientError::ClientCertificate(e.to_string()))
}

impl HttpClient {
    /// The base every request path is appended to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full URL for `path`.
    ///
    /// Paths under `/api/` are used as given; anything else is resolved
    /// against the internal API.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("/api/") {
            format!("{}{path}", self.host)
        } else {
            format!("{}{INTERNAL_API_PATH}{path}", self.host)
        }
    }

    /// Send a `GET` request.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Transport`] if the request cannot be sent.
    pub async fn get(&self, ctx: &CommandContext, path: &str) -> GateResult<Response> {
        self.send(ctx, self.client.get(self.url(path))).await
    }

    /// Send a `POST` request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Transport`] if the request cannot be sent.
    pub async fn post<B>(&self, ctx: &CommandContext, path: &str, body: &B) -> GateResult<Response>
    where
        B: Serialize + ?Sized,
    {
        self.send(ctx, self.client.post(self.url(path)).json(body))
            .await
    }

    async fn send(
        &self,
        ctx: &CommandContext,
        mut request: reqwest::RequestBuilder,
    ) -> GateResult<Response> {
        request = request
            .header(REQUEST_ID_HEADER, ctx.correlation_id())
            .header(SECRET_HEADER, STANDARD.encode(self.secret.trim()));
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref());
        }

        request
            .send()
            .await
            .map_err(|e| GateError::transport(format!("Internal API unreachable: {e}")))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Extract the `message` of a non-success response, falling back to
/// `Internal API error (<code>)`.
pub async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) if !body.message.is_empty() => body.message,
        _ => format!("Internal API error ({})", status.as_u16()),
    }
}

/// Pass a success response through; turn anything else into a
/// [`GateError::Transport`] carrying the server's message.
///
/// # Errors
///
/// Returns [`GateError::Transport`] for a non-2xx status.
pub async fn ensure_success(response: Response) -> GateResult<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(GateError::Transport(error_message(response).await))
    }
}

/// Decode a JSON body.
///
/// # Errors
///
/// Returns [`GateError::Transport`] for a malformed body.
pub async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> GateResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| GateError::transport(format!("Parsing failed: {e}")))
}

/// Whether a status is a policy rejection rather than a server failure.
#[must_use]
pub fn is_denial(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../gitgate-test/fixtures");

    #[test]
    fn test_unknown_scheme() {
        let err = build_client(&ClientOptions::new("ftp://example.com")).unwrap_err();
        assert!(matches!(err, ClientError::UnknownScheme(_)));
        assert_eq!(
            GateError::from(err).kind(),
            gitgate_core::ErrorKind::Configuration
        );
    }

    #[test]
    fn test_socket_host() {
        assert_eq!(socket_host(""), "http://unix");
        assert_eq!(socket_host("/gitlab/"), "http://unix/gitlab");
    }

    #[test]
    fn test_unix_socket_client_rewrites_host() {
        let client = build_client(
            &ClientOptions::new("http+unix:///var/run/gitlab.socket")
                .with_relative_url_root("/gitlab"),
        )
        .unwrap();
        assert_eq!(client.host(), "http://unix/gitlab");
        assert_eq!(
            client.url("/allowed"),
            "http://unix/gitlab/api/v4/internal/allowed"
        );
    }

    #[test]
    fn test_http_client_uses_host_verbatim() {
        let client = build_client(&ClientOptions::new("http://localhost:3000/")).unwrap();
        assert_eq!(client.host(), "http://localhost:3000");
        assert_eq!(
            client.url("/api/v4/geo/proxy"),
            "http://localhost:3000/api/v4/geo/proxy"
        );
    }

    #[test]
    fn test_https_client_with_ca_and_client_cert() {
        let options = ClientOptions::new("https://localhost")
            .with_ca_file(format!("{FIXTURES}/ca.pem"))
            .with_ca_path(FIXTURES)
            .with_client_cert(
                format!("{FIXTURES}/client.pem"),
                format!("{FIXTURES}/client-key.pem"),
            );
        assert!(build_client(&options).is_ok());
    }

    #[test]
    fn test_https_client_fails_closed_on_bad_client_key() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("key.pem");
        std::fs::write(&key, "not a key").unwrap();

        let options = ClientOptions::new("https://localhost")
            .with_client_cert(format!("{FIXTURES}/client.pem"), key);
        let err = build_client(&options).unwrap_err();
        assert!(matches!(err, ClientError::ClientCertificate(_)));
    }

    #[test]
    fn test_https_client_fails_closed_on_missing_client_cert() {
        let options = ClientOptions::new("https://localhost")
            .with_client_cert("/nonexistent/cert.pem", "/nonexistent/key.pem");
        assert!(matches!(
            build_client(&options),
            Err(ClientError::ClientCertificate(_))
        ));
    }

    #[test]
    fn test_denial_statuses() {
        assert!(is_denial(StatusCode::FORBIDDEN));
        assert!(is_denial(StatusCode::NOT_FOUND));
        assert!(!is_denial(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
