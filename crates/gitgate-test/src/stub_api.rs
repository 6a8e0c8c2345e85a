//! A stub control-plane server.
//!
//! Routes map a request path (without the query string) to a canned
//! response. Every request is recorded so tests can assert on headers,
//! bodies and call counts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinHandle;

/// A canned response.
#[derive(Debug, Clone)]
pub struct StubResponse {
    /// HTTP status.
    pub status: u16,
    /// JSON body.
    pub body: Value,
    /// Extra response headers.
    pub headers: Vec<(String, String)>,
}

impl StubResponse {
    /// `200 OK` with a JSON body.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::with_status(200, body)
    }

    /// Any status with a JSON body.
    #[must_use]
    pub fn with_status(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            headers: Vec::new(),
        }
    }

    /// Add a response header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A request received by the stub.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Path without the query string.
    pub path: String,
    /// Raw query string.
    pub query: String,
    /// Request headers, names lowercased.
    pub headers: HashMap<String, String>,
    /// JSON body, `Value::Null` when absent or not JSON.
    pub body: Value,
}

impl RecordedRequest {
    /// A header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[derive(Clone)]
struct StubState {
    routes: Arc<HashMap<String, StubResponse>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// A running stub server. Dropping it stops the server.
pub struct StubApi {
    url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
    _socket_dir: Option<tempfile::TempDir>,
}

impl StubApi {
    /// Serve `routes` over TCP on an ephemeral localhost port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start(routes: Vec<(&str, StubResponse)>) -> Self {
        let (app, requests) = router(routes);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: format!("http://{addr}"),
            requests,
            handle,
            _socket_dir: None,
        }
    }

    /// Serve `routes` over a Unix socket in a fresh temporary directory.
    ///
    /// The URL uses the `http+unix://` scheme.
    ///
    /// # Panics
    ///
    /// Panics if the socket cannot be bound.
    pub async fn start_unix(routes: Vec<(&str, StubResponse)>) -> Self {
        let (app, requests) = router(routes);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitlab.socket");
        let listener = UnixListener::bind(&path).unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: format!("http+unix://{}", path.display()),
            requests,
            handle,
            _socket_dir: Some(dir),
        }
    }

    /// Base URL of the server.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of requests received for `path`.
    #[must_use]
    pub fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

impl Drop for StubApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(routes: Vec<(&str, StubResponse)>) -> (Router, Arc<Mutex<Vec<RecordedRequest>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        routes: Arc::new(
            routes
                .into_iter()
                .map(|(path, response)| (path.to_owned(), response))
                .collect(),
        ),
        requests: Arc::clone(&requests),
    };
    let app = Router::new().fallback(handle).with_state(state);
    (app, requests)
}

async fn handle(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_owned(),
        query: uri.query().unwrap_or_default().to_owned(),
        headers: headers
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(recorded);
    }

    let Some(stub) = state.routes.get(uri.path()) else {
        return (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({"message": "404 Not Found"})),
        )
            .into_response();
    };

    let status = StatusCode::from_u16(stub.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, axum::Json(stub.body.clone())).into_response();
    for (name, value) in &stub.headers {
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::try_from(name.as_str()),
            axum::http::HeaderValue::try_from(value.as_str()),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}
