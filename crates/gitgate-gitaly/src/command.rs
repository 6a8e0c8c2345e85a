//! The RPC session bootstrap.
//!
//! [`GitalyCommand::run`] opens exactly one backend connection, decorates
//! the call with correlation, tracing, feature and identity context, runs a
//! caller-supplied handler and tears everything down on every exit path.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use gitgate_client::AccessResponse;
use gitgate_config::Config;
use gitgate_core::{CommandContext, GateError, GateResult};
use gitgate_telemetry::TracerFactory;
use tracing::{Instrument, info, warn};

use crate::credentials::RpcCredentials;
use crate::dialer::{DialOptions, Dialer, GitalyConnection};
use crate::guard::SessionGuard;
use crate::metadata::{CallContext, CallIdentity, CallMetadata};

/// Descriptor of one backend call. Built fresh per command execution.
#[derive(Clone, PartialEq, Eq)]
pub struct GitalyCommand {
    /// Service name (`git-upload-pack`, ...); names the tracing session.
    pub service_name: String,
    /// Backend address.
    pub address: String,
    /// Per-call token; empty for none.
    pub token: String,
    /// Feature flags from the access check.
    pub features: HashMap<String, String>,
    /// Tracing connection string from the process configuration.
    pub tracing_connection_string: Option<String>,
    /// Directory to switch to before dialing.
    pub working_dir: PathBuf,
}

impl std::fmt::Debug for GitalyCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitalyCommand")
            .field("service_name", &self.service_name)
            .field("address", &self.address)
            .field("has_token", &!self.token.is_empty())
            .field("features", &self.features)
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

impl GitalyCommand {
    /// A call to `address` for `service_name`.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        address: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            address: address.into(),
            token: token.into(),
            features: HashMap::new(),
            tracing_connection_string: None,
            working_dir: PathBuf::from("/"),
        }
    }

    /// Build from the backend descriptor of an access response.
    #[must_use]
    pub fn from_access(service_name: impl Into<String>, response: &AccessResponse) -> Self {
        Self::new(
            service_name,
            response.backend.address.clone(),
            response.backend.token.clone(),
        )
        .with_features(response.backend.features.clone())
    }

    /// Set the feature flags.
    #[must_use]
    pub fn with_features(mut self, features: HashMap<String, String>) -> Self {
        self.features = features;
        self
    }

    /// Take the tracing connection string and working directory from the
    /// process configuration.
    #[must_use]
    pub fn with_config(mut self, config: &Config) -> Self {
        self.tracing_connection_string = config.tracing_connection_string().map(str::to_owned);
        self.working_dir.clone_from(&config.gitaly.working_dir);
        self
    }

    /// Override the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Open a connection, run `handler` against it and tear down.
    ///
    /// Teardown runs once, in the order context cancel, tracing close,
    /// connection close, whether the handler succeeded, failed, or the
    /// bootstrap failed partway. The handler's error is returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`GateError::Configuration`] if the backend address is empty (no
    ///   dial is attempted and no tracing session started) or unsupported
    /// - [`GateError::Transport`] if the dial fails
    /// - whatever the handler returns
    pub async fn run<T, F, Fut>(
        &self,
        ctx: &CommandContext,
        record: &ExecutionRecord,
        dialer: &dyn Dialer,
        tracer: &dyn TracerFactory,
        handler: F,
    ) -> GateResult<T>
    where
        F: FnOnce(CallContext, Arc<dyn GitalyConnection>) -> Fut,
        Fut: Future<Output = GateResult<T>>,
    {
        if self.address.is_empty() {
            return Err(GateError::Configuration(
                "no gitaly_address given".to_owned(),
            ));
        }

        if let Err(e) = std::env::set_current_dir(&self.working_dir) {
            warn!(dir = %self.working_dir.display(), error = %e, "could not change working directory");
        }

        let mut guard = SessionGuard::new();

        let session = tracer.start(
            &self.service_name,
            self.tracing_connection_string.as_deref(),
        );
        let span = session.span();
        guard.hold_tracing(session);

        let call_ctx = ctx.child_with_correlation(&record.correlation_id);
        guard.hold_context(call_ctx.clone());

        let metadata = CallMetadata::from_features(&self.features).with_identity(&record.identity());
        record.log(&self.service_name, call_ctx.correlation_id());

        let mut options = DialOptions::new(call_ctx.correlation_id());
        if !self.token.is_empty() {
            options = options.with_credentials(RpcCredentials::v2(self.token.as_str()));
        }
        let connection = dialer.dial(&self.address, &options).await?;
        guard.hold_connection(Arc::clone(&connection));

        let result = handler(CallContext::new(call_ctx, metadata), connection)
            .instrument(span)
            .await;

        guard.release();
        result
    }
}

/// Identity and repository details logged once per backend call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionRecord {
    /// Correlation id to continue with.
    pub correlation_id: String,
    /// Project path.
    pub gl_project_path: String,
    /// Repository identifier.
    pub gl_repository: String,
    /// User id.
    pub user_id: String,
    /// Username.
    pub username: String,
    /// Git protocol version.
    pub git_protocol: String,
    /// Client address.
    pub remote_ip: String,
    /// Key type.
    pub key_type: String,
    /// Numeric key id.
    pub key_id: i64,
}

impl ExecutionRecord {
    /// Collect the record from an access response.
    #[must_use]
    pub fn from_access(
        response: &AccessResponse,
        git_protocol: impl Into<String>,
        remote_ip: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: response.correlation_id.clone(),
            gl_project_path: response.gl_project_path.clone(),
            gl_repository: response.gl_repository.clone(),
            user_id: response.user_id.clone(),
            username: response.username.clone(),
            git_protocol: git_protocol.into(),
            remote_ip: remote_ip.into(),
            key_type: response.key_type.clone(),
            key_id: response.key_id,
        }
    }

    /// Identity metadata for the call.
    #[must_use]
    pub fn identity(&self) -> CallIdentity {
        CallIdentity {
            key_id: self.key_id,
            key_type: self.key_type.clone(),
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            remote_ip: self.remote_ip.clone(),
        }
    }

    fn log(&self, service_name: &str, correlation_id: &str) {
        info!(
            command = %service_name,
            correlation_id = %correlation_id,
            gl_project_path = %self.gl_project_path,
            gl_repository = %self.gl_repository,
            user_id = %self.user_id,
            username = %self.username,
            git_protocol = %self.git_protocol,
            remote_ip = %self.remote_ip,
            gl_key_type = %self.key_type,
            gl_key_id = self.key_id,
            "executing git command"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use gitgate_core::{ErrorKind, ReadWriter};
    use gitgate_telemetry::TracingSession;

    use super::*;
    use crate::proto::{SshReceivePackRequest, SshUploadArchiveRequest, SshUploadPackRequest};

    type Events = Arc<Mutex<Vec<String>>>;

    struct Tracer(Events);

    struct Session(Events);

    impl TracerFactory for Tracer {
        fn start(&self, service_name: &str, _: Option<&str>) -> Box<dyn TracingSession> {
            self.0.lock().unwrap().push(format!("tracing.start {service_name}"));
            Box::new(Session(Arc::clone(&self.0)))
        }
    }

    impl TracingSession for Session {
        fn span(&self) -> tracing::Span {
            tracing::Span::none()
        }

        fn close(&mut self) {
            self.0.lock().unwrap().push("tracing.close".to_owned());
        }
    }

    struct Connection(Events);

    #[async_trait]
    impl GitalyConnection for Connection {
        async fn ssh_upload_pack(
            &self,
            _: &CallContext,
            _: SshUploadPackRequest,
            _: ReadWriter,
        ) -> GateResult<i32> {
            Ok(0)
        }

        async fn ssh_receive_pack(
            &self,
            _: &CallContext,
            _: SshReceivePackRequest,
            _: ReadWriter,
        ) -> GateResult<i32> {
            Ok(0)
        }

        async fn ssh_upload_archive(
            &self,
            _: &CallContext,
            _: SshUploadArchiveRequest,
            _: ReadWriter,
        ) -> GateResult<i32> {
            Ok(0)
        }

        fn close(&self) {
            self.0.lock().unwrap().push("connection.close".to_owned());
        }
    }

    struct Dial {
        events: Events,
        fail: bool,
    }

    #[async_trait]
    impl Dialer for Dial {
        async fn dial(
            &self,
            address: &str,
            _: &DialOptions,
        ) -> GateResult<Arc<dyn GitalyConnection>> {
            self.events.lock().unwrap().push(format!("dial {address}"));
            if self.fail {
                return Err(GateError::transport("refused"));
            }
            Ok(Arc::new(Connection(Arc::clone(&self.events))))
        }
    }

    fn record() -> ExecutionRecord {
        ExecutionRecord {
            correlation_id: "corr".to_owned(),
            key_id: 123,
            key_type: "key".to_owned(),
            user_id: "1".to_owned(),
            username: "test-user".to_owned(),
            ..ExecutionRecord::default()
        }
    }

    #[tokio::test]
    async fn test_handler_receives_derived_context() {
        let events: Events = Arc::default();
        let dialer = Dial {
            events: Arc::clone(&events),
            fail: false,
        };
        let parent = CommandContext::with_correlation_id("parent");
        let features = HashMap::from([("gitaly-feature-x".to_owned(), "true".to_owned())]);
        let command = GitalyCommand::new("git-upload-pack", "unix:/gitaly.socket", "")
            .with_features(features);

        let seen = command
            .run(&parent, &record(), &dialer, &Tracer(Arc::clone(&events)), |call, _| async move {
                assert!(!call.is_cancelled());
                Ok(call)
            })
            .await
            .unwrap();

        assert_eq!(seen.correlation_id(), "corr");
        assert_eq!(seen.metadata().get("gitaly-feature-x"), Some("true"));
        assert_eq!(seen.metadata().get("key_id"), Some("123"));
        assert!(seen.is_cancelled());
        assert!(!parent.is_cancelled());
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "tracing.start git-upload-pack",
                "dial unix:/gitaly.socket",
                "tracing.close",
                "connection.close",
            ]
        );
    }

    #[tokio::test]
    async fn test_dial_failure_releases_acquired_resources() {
        let events: Events = Arc::default();
        let dialer = Dial {
            events: Arc::clone(&events),
            fail: true,
        };
        let command = GitalyCommand::new("git-receive-pack", "tcp://localhost:1", "t");

        let err = command
            .run(
                &CommandContext::new(),
                &record(),
                &dialer,
                &Tracer(Arc::clone(&events)),
                |_, _| async { Ok(()) },
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "tracing.start git-receive-pack",
                "dial tcp://localhost:1",
                "tracing.close",
            ]
        );
    }

    #[test]
    fn test_from_access() {
        let mut response = AccessResponse::default();
        response.backend.address = "tcp://gitaly:8075".to_owned();
        response.backend.token = "secret".to_owned();
        response.key_id = 7;
        response.gl_project_path = "group/repo".to_owned();

        let command = GitalyCommand::from_access("git-upload-pack", &response);
        assert_eq!(command.address, "tcp://gitaly:8075");
        assert!(!format!("{command:?}").contains("secret"));

        let record = ExecutionRecord::from_access(&response, "version=2", "10.0.0.1");
        assert_eq!(record.key_id, 7);
        assert_eq!(record.identity().remote_ip, "10.0.0.1");
    }

    #[test]
    fn test_with_config() {
        let mut config = Config::with_gitlab_url("http://localhost");
        config.gitlab_tracing = Some("opentracing://jaeger?sampler=const".to_owned());
        config.gitaly.working_dir = PathBuf::from("/tmp");

        let command = GitalyCommand::new("git-upload-pack", "a", "").with_config(&config);
        assert_eq!(
            command.tracing_connection_string.as_deref(),
            Some("opentracing://jaeger?sampler=const")
        );
        assert_eq!(command.working_dir, PathBuf::from("/tmp"));
    }
}
