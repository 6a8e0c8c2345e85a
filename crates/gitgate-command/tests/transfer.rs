//! Integration tests for the data-plane commands.
//!
//! Runs fetch, push and archive sessions end to end against a mock access
//! verifier and a recording storage backend.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use gitgate_client::AccessResponse;
use gitgate_command::{Command, Services, build_command};
use gitgate_config::Config;
use gitgate_core::{
    CommandArgs, CommandContext, ErrorKind, ExecutableKind, GateError, GateResult, ReadWriter,
    SessionEnv,
};
use gitgate_test::{
    ConnectionScript, EventLog, MockAccessVerifier, RecordingDialer, RecordingTracer,
    SharedBuffer, StubApi, StubResponse, capture_logs, test_access_response, test_shell_args,
};
use serde_json::json;

struct Harness {
    log: EventLog,
    verifier: MockAccessVerifier,
    dialer: RecordingDialer,
    tracer: RecordingTracer,
    output: SharedBuffer,
    err_output: SharedBuffer,
    gitlab_url: String,
}

impl Harness {
    fn new() -> Self {
        let log = EventLog::new();
        Self {
            verifier: MockAccessVerifier::new(log.clone()),
            dialer: RecordingDialer::new(log.clone()),
            tracer: RecordingTracer::new(log.clone()),
            output: SharedBuffer::new(),
            err_output: SharedBuffer::new(),
            gitlab_url: "http://localhost".to_owned(),
            log,
        }
    }

    fn granting(mut self, response: AccessResponse) -> Self {
        self.verifier = self.verifier.with_response(response);
        self
    }

    fn services(&self) -> Services {
        Services::from_config(Config::with_gitlab_url(self.gitlab_url.clone()))
            .unwrap()
            .with_verifier(Arc::new(self.verifier.clone()))
            .with_dialer(Arc::new(self.dialer.clone()))
            .with_tracer(Arc::new(self.tracer.clone()))
    }

    fn command(&self, args: CommandArgs, env: SessionEnv, input: &[u8]) -> Box<dyn Command> {
        let streams = ReadWriter::new(
            Cursor::new(input.to_vec()),
            self.output.clone(),
            self.err_output.clone(),
        );
        build_command(ExecutableKind::Shell, args, env, streams, self.services())
            .map_err(|e| e.to_string())
            .unwrap()
    }

    async fn run(&self, command_line: &str, input: &[u8]) -> GateResult<()> {
        let args = CommandArgs::Shell(test_shell_args(command_line));
        self.command(args, session_env(), input)
            .execute(&CommandContext::new())
            .await
    }
}

fn session_env() -> SessionEnv {
    SessionEnv {
        git_protocol_version: "version=2".to_owned(),
        is_ssh_connection: true,
        original_command: String::new(),
        remote_addr: "127.0.0.1".to_owned(),
    }
}

#[tokio::test]
async fn test_wrong_token_count_touches_nothing() {
    for line in ["git-upload-pack", "git-receive-pack a b", "git-upload-archive a b c"] {
        let harness = Harness::new().granting(test_access_response("addr"));

        let err = harness.run(line, b"").await.unwrap_err();

        assert!(matches!(err, GateError::DisallowedCommand), "{line}: {err}");
        assert_eq!(harness.verifier.call_count(), 0, "{line}");
        assert_eq!(harness.dialer.dial_count(), 0, "{line}");
    }
}

#[tokio::test]
async fn test_upload_pack_end_to_end() {
    let (_guard, logs) = capture_logs();
    let harness = Harness::new().granting(test_access_response("valid-addr"));
    let harness = Harness {
        dialer: harness.dialer.clone().with_script(ConnectionScript::stdout("PACK")),
        ..harness
    };

    harness
        .run("git-upload-pack group/repo", b"0009done\n")
        .await
        .unwrap();

    assert_eq!(harness.dialer.dial_count(), 1);
    assert_eq!(harness.dialer.dials()[0].0, "valid-addr");
    assert_eq!(harness.output.contents(), "PACK");

    let calls = harness.dialer.calls();
    assert_eq!(calls[0].method, "ssh_upload_pack");
    assert_eq!(calls[0].git_protocol, "version=2");
    assert_eq!(calls[0].input, b"0009done\n");
    let repository = calls[0].repository.as_ref().unwrap();
    assert_eq!(repository.relative_path, "@hashed/group/repo.git");

    let records = logs.with_message("executing git command");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["fields"]["command"], "git-upload-pack");
    assert_eq!(records[0]["fields"]["gl_key_id"], 123);
    assert_eq!(records[0]["fields"]["gl_key_type"], "key");

    let request = &harness.verifier.requests()[0];
    assert_eq!(request.repository, "group/repo");
    assert_eq!(request.check_ip, "127.0.0.1");
    assert_eq!(
        harness.log.events(),
        vec![
            "verify",
            "tracing.start",
            "dial",
            "connection.ssh_upload_pack",
            "tracing.close",
            "connection.close",
        ]
    );
}

#[tokio::test]
async fn test_receive_pack_sends_identity() {
    let mut response = test_access_response("addr");
    response.git_config_options = vec!["receive.maxInputSize=1".to_owned()];
    let harness = Harness::new().granting(response);

    harness
        .run("git-receive-pack group/repo", b"0000")
        .await
        .unwrap();

    let call = &harness.dialer.calls()[0];
    assert_eq!(call.method, "ssh_receive_pack");
    assert_eq!(call.gl_id, "1");
    assert_eq!(call.git_config_options, vec!["receive.maxInputSize=1"]);
    assert_eq!(harness.verifier.requests()[0].command_type.as_str(), "git-receive-pack");
}

#[tokio::test]
async fn test_explicit_remote_uses_recorded_protocol_version() {
    let (_guard, logs) = capture_logs();
    let harness = Harness::new().granting(test_access_response("addr"));
    let args = test_shell_args("git-upload-pack group/repo")
        .with_remote_addr("192.168.1.1")
        .with_git_protocol_version("version=1");

    harness
        .command(CommandArgs::Shell(args), session_env(), b"")
        .execute(&CommandContext::new())
        .await
        .unwrap();

    assert_eq!(harness.verifier.requests()[0].check_ip, "192.168.1.1");
    let calls = harness.dialer.calls();
    assert_eq!(calls[0].method, "ssh_upload_pack");
    assert_eq!(calls[0].git_protocol, "version=1");
    assert_eq!(calls[0].metadata.get("remote_ip"), Some("192.168.1.1"));

    let records = logs.with_message("executing git command");
    assert_eq!(records[0]["fields"]["git_protocol"], "version=1");
    assert_eq!(records[0]["fields"]["remote_ip"], "192.168.1.1");
}

#[tokio::test]
async fn test_session_env_supplies_protocol_version_without_remote() {
    let (_guard, logs) = capture_logs();
    let harness = Harness::new().granting(test_access_response("addr"));
    let args =
        test_shell_args("git-receive-pack group/repo").with_git_protocol_version("version=1");

    harness
        .command(CommandArgs::Shell(args), session_env(), b"0000")
        .execute(&CommandContext::new())
        .await
        .unwrap();

    assert_eq!(harness.verifier.requests()[0].check_ip, "127.0.0.1");
    let calls = harness.dialer.calls();
    assert_eq!(calls[0].method, "ssh_receive_pack");
    assert_eq!(calls[0].git_protocol, "version=2");

    let records = logs.with_message("executing git command");
    assert_eq!(records[0]["fields"]["git_protocol"], "version=2");
}

#[tokio::test]
async fn test_upload_archive_with_explicit_remote() {
    let harness = Harness::new().granting(test_access_response("addr"));
    let args = test_shell_args("git-upload-archive group/repo").with_remote_addr("192.168.1.1");

    harness
        .command(CommandArgs::Shell(args), session_env(), b"")
        .execute(&CommandContext::new())
        .await
        .unwrap();

    let calls = harness.dialer.calls();
    assert_eq!(calls[0].method, "ssh_upload_archive");
    assert_eq!(calls[0].metadata.get("remote_ip"), Some("192.168.1.1"));
}

#[tokio::test]
async fn test_console_messages_precede_transfer() {
    let mut response = test_access_response("addr");
    response.gl_console_messages = vec!["Read-only mode".to_owned()];
    let harness = Harness::new().granting(response);

    harness
        .run("git-upload-pack group/repo", b"")
        .await
        .unwrap();

    assert_eq!(
        harness.err_output.contents(),
        "remote: \nremote: Read-only mode\nremote: \n"
    );
}

#[tokio::test]
async fn test_denied_access_never_dials() {
    let log = EventLog::new();
    let harness = Harness {
        verifier: MockAccessVerifier::new(log.clone())
            .with_error(GateError::AccessDenied("Not allowed!".to_owned())),
        ..Harness::new()
    };

    let err = harness
        .run("git-upload-pack group/repo", b"")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AccessDenied);
    assert_eq!(err.to_string(), "Not allowed!");
    assert_eq!(harness.dialer.dial_count(), 0);
}

#[tokio::test]
async fn test_empty_backend_address_is_a_configuration_error() {
    let harness = Harness::new().granting(test_access_response(""));

    let err = harness
        .run("git-upload-pack group/repo", b"")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(harness.dialer.dial_count(), 0);
}

#[tokio::test]
async fn test_non_zero_exit_status_fails() {
    let harness = Harness::new().granting(test_access_response("addr"));
    let harness = Harness {
        dialer: harness
            .dialer
            .clone()
            .with_script(ConnectionScript::default().with_exit_code(128)),
        ..harness
    };

    let err = harness
        .run("git-upload-pack group/repo", b"")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(harness.log.count("connection.close"), 1);
}

#[tokio::test]
async fn test_custom_action_relays_through_api_and_never_dials() {
    let api = StubApi::start(vec![
        (
            "/api/v4/geo/proxy_git_ssh/info_refs_receive_pack",
            StubResponse::ok(json!({"result": STANDARD.encode("advertisement")})),
        ),
        (
            "/api/v4/geo/proxy_git_ssh/receive_pack",
            StubResponse::ok(json!({"result": STANDARD.encode("pushed")})),
        ),
    ])
    .await;

    let mut response = test_access_response("addr");
    response.custom_action = true;
    response.who = "user-1".to_owned();
    response.payload.action = "geo_proxy_to_primary".to_owned();
    response.payload.data.api_endpoints = vec![
        "/api/v4/geo/proxy_git_ssh/info_refs_receive_pack".to_owned(),
        "/api/v4/geo/proxy_git_ssh/receive_pack".to_owned(),
    ];
    response.payload.data.info_message = "Proxying to primary".to_owned();
    response.payload.data.extra.insert("primary_repo".to_owned(), json!("http://primary/group/repo.git"));

    let harness = Harness {
        gitlab_url: api.url().to_owned(),
        ..Harness::new()
    }
    .granting(response);

    let push = b"0000".to_vec();
    harness
        .run("git-receive-pack group/repo", &push)
        .await
        .unwrap();

    assert_eq!(harness.dialer.dial_count(), 0);
    assert_eq!(harness.log.count("tracing.start"), 0);
    assert_eq!(harness.output.contents(), "advertisementpushed");
    assert!(harness.err_output.contents().contains("remote: Proxying to primary\n"));

    let requests = api.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body["output"], "");
    assert_eq!(requests[0].body["data"]["gl_id"], "user-1");
    assert_eq!(requests[0].body["data"]["primary_repo"], "http://primary/group/repo.git");
    assert_eq!(requests[1].body["output"], STANDARD.encode(&push));
}

#[tokio::test]
async fn test_custom_action_endpoint_failure_is_a_transport_error() {
    let api = StubApi::start(vec![(
        "/api/v4/geo/proxy_git_ssh/info_refs_upload_pack",
        StubResponse::with_status(500, json!({"message": "primary unreachable"})),
    )])
    .await;

    let mut response = test_access_response("addr");
    response.custom_action = true;
    response.payload.data.api_endpoints =
        vec!["/api/v4/geo/proxy_git_ssh/info_refs_upload_pack".to_owned()];

    let harness = Harness {
        gitlab_url: api.url().to_owned(),
        ..Harness::new()
    }
    .granting(response);

    let err = harness
        .run("git-upload-pack group/repo", b"")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("primary unreachable"));
    assert_eq!(harness.dialer.dial_count(), 0);
}
