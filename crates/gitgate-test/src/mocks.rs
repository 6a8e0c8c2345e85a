//! Recording implementations of the gateway's seams.
//!
//! Every mock appends to a shared [`EventLog`] so tests can assert on the
//! relative order of dials, transfers and teardown across collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use gitgate_client::{AccessRequest, AccessResponse, AccessVerifier};
use gitgate_core::{CommandContext, GateError, GateResult, ReadWriter};
use gitgate_gitaly::metadata::CallMetadata;
use gitgate_gitaly::proto::{
    Repository, SshReceivePackRequest, SshUploadArchiveRequest, SshUploadPackRequest,
};
use gitgate_gitaly::{CallContext, DialOptions, Dialer, GitalyConnection};
use gitgate_telemetry::{TracerFactory, TracingSession};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Ordered events shared between mocks.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    /// An empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&self, event: impl Into<String>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    /// Every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How often `event` was recorded.
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    /// Position of the first occurrence of `event`.
    #[must_use]
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// What a [`RecordingConnection`] does when a transfer is called.
#[derive(Debug, Clone, Default)]
pub struct ConnectionScript {
    /// Bytes written to the session output.
    pub stdout: Vec<u8>,
    /// Bytes written to the session error output.
    pub stderr: Vec<u8>,
    /// Exit status returned.
    pub exit_code: i32,
    /// Fail the transfer with a protocol error instead.
    pub error: Option<String>,
}

impl ConnectionScript {
    /// Write `stdout` and exit 0.
    #[must_use]
    pub fn stdout(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: bytes.into(),
            ..Self::default()
        }
    }

    /// Fail with a protocol error.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Set the exit status.
    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }
}

/// A transfer seen by a [`RecordingConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// `ssh_upload_pack`, `ssh_receive_pack` or `ssh_upload_archive`.
    pub method: &'static str,
    /// Correlation id of the call context.
    pub correlation_id: String,
    /// Outgoing call metadata.
    pub metadata: CallMetadata,
    /// Repository from the first request.
    pub repository: Option<Repository>,
    /// Git protocol version (empty for archive).
    pub git_protocol: String,
    /// Extra git config options (empty for archive).
    pub git_config_options: Vec<String>,
    /// Pushing user id (receive-pack only).
    pub gl_id: String,
    /// Session input consumed by the transfer.
    pub input: Vec<u8>,
}

/// Records dials and hands out [`RecordingConnection`]s.
#[derive(Debug, Clone, Default)]
pub struct RecordingDialer {
    log: EventLog,
    dials: Arc<Mutex<Vec<(String, DialOptions)>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    script: ConnectionScript,
    dial_error: Option<String>,
}

impl RecordingDialer {
    /// A dialer recording into `log`.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Script the connections this dialer hands out.
    #[must_use]
    pub fn with_script(mut self, script: ConnectionScript) -> Self {
        self.script = script;
        self
    }

    /// Make every dial fail with a transport error.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.dial_error = Some(message.into());
        self
    }

    /// Number of dial attempts.
    #[must_use]
    pub fn dial_count(&self) -> usize {
        self.dials.lock().map(|d| d.len()).unwrap_or_default()
    }

    /// Address and options of every dial attempt.
    #[must_use]
    pub fn dials(&self) -> Vec<(String, DialOptions)> {
        self.dials.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Every transfer made on connections from this dialer.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Dialer for RecordingDialer {
    async fn dial(
        &self,
        address: &str,
        options: &DialOptions,
    ) -> GateResult<Arc<dyn GitalyConnection>> {
        if let Ok(mut dials) = self.dials.lock() {
            dials.push((address.to_owned(), options.clone()));
        }
        self.log.push("dial");
        if let Some(message) = &self.dial_error {
            return Err(GateError::Transport(message.clone()));
        }
        Ok(Arc::new(RecordingConnection {
            log: self.log.clone(),
            calls: Arc::clone(&self.calls),
            script: self.script.clone(),
        }))
    }
}

/// A scripted connection.
#[derive(Debug)]
pub struct RecordingConnection {
    log: EventLog,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    script: ConnectionScript,
}

impl RecordingConnection {
    async fn transfer(&self, mut call: RecordedCall, streams: ReadWriter) -> GateResult<i32> {
        self.log.push(format!("connection.{}", call.method));
        let ReadWriter {
            mut input,
            mut output,
            mut err_output,
        } = streams;

        input.read_to_end(&mut call.input).await?;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        if let Some(message) = &self.script.error {
            return Err(GateError::Protocol(message.clone()));
        }
        output.write_all(&self.script.stdout).await?;
        output.flush().await?;
        err_output.write_all(&self.script.stderr).await?;
        err_output.flush().await?;
        Ok(self.script.exit_code)
    }
}

fn recorded(method: &'static str, ctx: &CallContext) -> RecordedCall {
    RecordedCall {
        method,
        correlation_id: ctx.correlation_id().to_owned(),
        metadata: ctx.metadata().clone(),
        repository: None,
        git_protocol: String::new(),
        git_config_options: Vec::new(),
        gl_id: String::new(),
        input: Vec::new(),
    }
}

#[async_trait]
impl GitalyConnection for RecordingConnection {
    async fn ssh_upload_pack(
        &self,
        call: &CallContext,
        request: SshUploadPackRequest,
        streams: ReadWriter,
    ) -> GateResult<i32> {
        let record = RecordedCall {
            repository: request.repository,
            git_protocol: request.git_protocol,
            git_config_options: request.git_config_options,
            ..recorded("ssh_upload_pack", call)
        };
        self.transfer(record, streams).await
    }

    async fn ssh_receive_pack(
        &self,
        call: &CallContext,
        request: SshReceivePackRequest,
        streams: ReadWriter,
    ) -> GateResult<i32> {
        let record = RecordedCall {
            repository: request.repository,
            git_protocol: request.git_protocol,
            git_config_options: request.git_config_options,
            gl_id: request.gl_id,
            ..recorded("ssh_receive_pack", call)
        };
        self.transfer(record, streams).await
    }

    async fn ssh_upload_archive(
        &self,
        call: &CallContext,
        request: SshUploadArchiveRequest,
        streams: ReadWriter,
    ) -> GateResult<i32> {
        let record = RecordedCall {
            repository: request.repository,
            ..recorded("ssh_upload_archive", call)
        };
        self.transfer(record, streams).await
    }

    fn close(&self) {
        self.log.push("connection.close");
    }
}

/// Records tracing session starts and closes.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    log: EventLog,
    connection_strings: Arc<Mutex<Vec<Option<String>>>>,
}

impl RecordingTracer {
    /// A tracer recording into `log`.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            connection_strings: Arc::default(),
        }
    }

    /// Connection string of every session started.
    #[must_use]
    pub fn connection_strings(&self) -> Vec<Option<String>> {
        self.connection_strings
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

impl TracerFactory for RecordingTracer {
    fn start(
        &self,
        service_name: &str,
        connection_string: Option<&str>,
    ) -> Box<dyn TracingSession> {
        if let Ok(mut strings) = self.connection_strings.lock() {
            strings.push(connection_string.map(str::to_owned));
        }
        self.log.push("tracing.start");
        Box::new(RecordingSession {
            log: self.log.clone(),
            span: tracing::info_span!("recording_session", service = %service_name),
        })
    }
}

struct RecordingSession {
    log: EventLog,
    span: tracing::Span,
}

impl TracingSession for RecordingSession {
    fn span(&self) -> tracing::Span {
        self.span.clone()
    }

    fn close(&mut self) {
        self.log.push("tracing.close");
    }
}

/// An access verifier answering from a queue.
///
/// Answers `AccessDenied` once the queue is empty.
#[derive(Debug, Clone, Default)]
pub struct MockAccessVerifier {
    log: EventLog,
    responses: Arc<Mutex<VecDeque<GateResult<AccessResponse>>>>,
    requests: Arc<Mutex<Vec<AccessRequest>>>,
}

impl MockAccessVerifier {
    /// A verifier recording into `log`.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Queue a grant.
    #[must_use]
    pub fn with_response(self, response: AccessResponse) -> Self {
        self.queue(Ok(response));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_error(self, error: GateError) -> Self {
        self.queue(Err(error));
        self
    }

    fn queue(&self, result: GateResult<AccessResponse>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(result);
        }
    }

    /// Number of verification calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Every request seen.
    #[must_use]
    pub fn requests(&self) -> Vec<AccessRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AccessVerifier for MockAccessVerifier {
    async fn verify(
        &self,
        _ctx: &CommandContext,
        request: &AccessRequest,
    ) -> GateResult<AccessResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.log.push("verify");
        self.responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front())
            .unwrap_or_else(|| Err(GateError::AccessDenied("no response queued".to_owned())))
    }
}
