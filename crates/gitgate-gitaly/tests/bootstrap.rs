//! Integration tests for the RPC session bootstrap.
//!
//! Drives `GitalyCommand::run` against recording collaborators and checks
//! dial counts, call metadata, the execution log record and teardown order.

use std::io::Cursor;

use gitgate_core::{CommandContext, ErrorKind, GateError, ReadWriter};
use gitgate_gitaly::proto::{Repository, SshUploadPackRequest};
use gitgate_gitaly::{
    ExecutionRecord, GitalyCommand, GitalyConnection, RpcCredentials, check_exit_status,
};
use gitgate_test::{
    ConnectionScript, EventLog, RecordingDialer, RecordingTracer, SharedBuffer, capture_logs,
    test_access_response,
};

fn streams(output: &SharedBuffer) -> ReadWriter {
    ReadWriter::new(
        Cursor::new(b"0009done\n".to_vec()),
        output.clone(),
        SharedBuffer::new(),
    )
}

fn upload_pack_request() -> SshUploadPackRequest {
    let response = test_access_response("unix:/gitaly.socket");
    SshUploadPackRequest {
        repository: Some(Repository::from(&response.backend.repo)),
        git_protocol: "version=2".to_owned(),
        ..SshUploadPackRequest::default()
    }
}

#[tokio::test]
async fn test_empty_address_never_dials() {
    let log = EventLog::new();
    let dialer = RecordingDialer::new(log.clone());
    let tracer = RecordingTracer::new(log.clone());
    let command = GitalyCommand::new("git-upload-pack", "", "t");

    let err = command
        .run(
            &CommandContext::new(),
            &ExecutionRecord::default(),
            &dialer,
            &tracer,
            |_, _| async { Ok(()) },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("no gitaly_address given"));
    assert_eq!(dialer.dial_count(), 0);
    assert!(log.events().is_empty());
}

#[tokio::test]
async fn test_metadata_and_single_credential() {
    let log = EventLog::new();
    let dialer = RecordingDialer::new(log.clone());
    let tracer = RecordingTracer::new(log.clone());
    let response = test_access_response("addr");
    let command = GitalyCommand::from_access("git-upload-pack", &response);
    let record = ExecutionRecord::from_access(&response, "version=2", "127.0.0.1");
    let output = SharedBuffer::new();

    command
        .run(
            &CommandContext::new(),
            &record,
            &dialer,
            &tracer,
            |call, connection| async move {
                let code = connection
                    .ssh_upload_pack(&call, upload_pack_request(), streams(&output))
                    .await?;
                check_exit_status(code)
            },
        )
        .await
        .unwrap();

    let dials = dialer.dials();
    assert_eq!(dials.len(), 1);
    let (address, options) = &dials[0];
    assert_eq!(address, "addr");
    assert_eq!(options.credentials, Some(RpcCredentials::v2("t")));
    assert_eq!(options.correlation_id, "test-correlation-id");

    let calls = dialer.calls();
    assert_eq!(calls.len(), 1);
    let metadata = &calls[0].metadata;
    assert_eq!(metadata.get("key_id"), Some("123"));
    assert_eq!(metadata.get("key_type"), Some("key"));
    assert_eq!(metadata.get("user_id"), Some("1"));
    assert_eq!(metadata.get("username"), Some("test-user"));
    assert_eq!(metadata.get("remote_ip"), Some("127.0.0.1"));
    assert_eq!(metadata.get("gitaly-feature-cache"), Some("true"));
    assert!(metadata.get("unrelated").is_none());
    assert_eq!(calls[0].input, b"0009done\n");
}

#[tokio::test]
async fn test_empty_token_dials_without_credential() {
    let log = EventLog::new();
    let dialer = RecordingDialer::new(log.clone());
    let tracer = RecordingTracer::new(log.clone());
    let command = GitalyCommand::new("git-upload-pack", "addr", "");

    command
        .run(
            &CommandContext::new(),
            &ExecutionRecord::default(),
            &dialer,
            &tracer,
            |_, _| async { Ok(()) },
        )
        .await
        .unwrap();

    assert!(dialer.dials()[0].1.credentials.is_none());
}

#[tokio::test]
async fn test_teardown_order_when_handler_fails() {
    let log = EventLog::new();
    let dialer =
        RecordingDialer::new(log.clone()).with_script(ConnectionScript::failing("pack broke"));
    let tracer = RecordingTracer::new(log.clone());
    let response = test_access_response("addr");
    let command = GitalyCommand::from_access("git-upload-pack", &response);
    let output = SharedBuffer::new();

    let err = command
        .run(
            &CommandContext::new(),
            &ExecutionRecord::from_access(&response, "", ""),
            &dialer,
            &tracer,
            |call, connection| async move {
                connection
                    .ssh_upload_pack(&call, upload_pack_request(), streams(&output))
                    .await
                    .map(|_| ())
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, GateError::Protocol(ref m) if m == "pack broke"));
    assert_eq!(
        log.events(),
        vec![
            "tracing.start",
            "dial",
            "connection.ssh_upload_pack",
            "tracing.close",
            "connection.close",
        ]
    );
    assert_eq!(log.count("tracing.close"), 1);
    assert_eq!(log.count("connection.close"), 1);
}

#[tokio::test]
async fn test_dial_failure_closes_tracing_only() {
    let log = EventLog::new();
    let dialer = RecordingDialer::new(log.clone()).failing("connection refused");
    let tracer = RecordingTracer::new(log.clone());

    let err = GitalyCommand::new("git-receive-pack", "addr", "t")
        .run(
            &CommandContext::new(),
            &ExecutionRecord::default(),
            &dialer,
            &tracer,
            |_, _| async { Ok(()) },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(log.events(), vec!["tracing.start", "dial", "tracing.close"]);
}

#[tokio::test]
async fn test_execution_record_logged_once_before_dial() {
    let (_guard, logs) = capture_logs();
    let log = EventLog::new();
    let dialer = RecordingDialer::new(log.clone()).with_script(ConnectionScript::stdout("ok"));
    let tracer = RecordingTracer::new(log.clone());
    let response = test_access_response("valid-addr");
    let output = SharedBuffer::new();

    GitalyCommand::from_access("git-upload-pack", &response)
        .run(
            &CommandContext::new(),
            &ExecutionRecord::from_access(&response, "version=2", "10.0.0.1"),
            &dialer,
            &tracer,
            |call, connection| async move {
                connection
                    .ssh_upload_pack(&call, upload_pack_request(), streams(&output))
                    .await
                    .and_then(check_exit_status)
            },
        )
        .await
        .unwrap();

    let records = logs.with_message("executing git command");
    assert_eq!(records.len(), 1);
    let fields = &records[0]["fields"];
    assert_eq!(fields["command"], "git-upload-pack");
    assert_eq!(fields["gl_key_id"], 123);
    assert_eq!(fields["gl_key_type"], "key");
    assert_eq!(fields["gl_project_path"], "group/repo");
    assert_eq!(fields["correlation_id"], "test-correlation-id");
    assert_eq!(dialer.dial_count(), 1);
}

#[tokio::test]
async fn test_tracing_session_uses_configured_connection_string() {
    let log = EventLog::new();
    let dialer = RecordingDialer::new(log.clone());
    let tracer = RecordingTracer::new(log.clone());
    let mut config = gitgate_config::Config::with_gitlab_url("http://localhost");
    config.gitlab_tracing = Some("opentracing://jaeger".to_owned());

    GitalyCommand::new("git-upload-archive", "addr", "")
        .with_config(&config)
        .run(
            &CommandContext::new(),
            &ExecutionRecord::default(),
            &dialer,
            &tracer,
            |_, _| async { Ok(()) },
        )
        .await
        .unwrap();

    assert_eq!(
        tracer.connection_strings(),
        vec![Some("opentracing://jaeger".to_owned())]
    );
}
