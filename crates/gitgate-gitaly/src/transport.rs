//! tonic-backed [`Dialer`] for the storage backend.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::{Stream, StreamExt, future, stream};
use gitgate_core::{GateError, GateResult, ReadWriter};
use gitgate_core::readwriter::BoxedReader;
use hyper_util::rt::TokioIo;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio_util::io::ReaderStream;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{AsciiMetadataValue, MetadataValue};
use tonic::service::Interceptor;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint, Uri};
use tonic::{Code, Request, Status};
use tracing::{debug, warn};

use crate::credentials::{AUTHORIZATION_KEY, RpcCredentials};
use crate::dialer::{DialOptions, Dialer, GitalyConnection};
use crate::metadata::CallContext;
use crate::proto::{
    SshReceivePackRequest, SshResponse, SshUploadArchiveRequest, SshUploadPackRequest,
    StdinRequest,
};

/// Address prefix for a Unix socket.
pub const UNIX_PREFIX: &str = "unix:";
/// Address prefix for plaintext TCP.
pub const TCP_PREFIX: &str = "tcp://";
/// Address prefix for TLS.
pub const TLS_PREFIX: &str = "tls://";

/// Metadata key carrying the correlation id.
pub const CORRELATION_ID_KEY: &str = "x-gitlab-correlation-id";
/// Metadata key carrying the client name.
pub const CLIENT_NAME_KEY: &str = "x-gitlab-client-name";

/// Size of the stdin chunks sent to the backend.
const STDIN_CHUNK_SIZE: usize = 32 * 1024;

/// Placeholder authority for Unix-socket channels; never resolved.
const UNIX_PLACEHOLDER_URI: &str = "http://[::]:50051";

const UPLOAD_PACK_PATH: &str = "/gitaly.SSHService/SSHUploadPack";
const RECEIVE_PACK_PATH: &str = "/gitaly.SSHService/SSHReceivePack";
const UPLOAD_ARCHIVE_PATH: &str = "/gitaly.SSHService/SSHUploadArchive";

type GrpcClient = tonic::client::Grpc<InterceptedService<Channel, CallInterceptor>>;

/// Dials `unix:`, `tcp://` and `tls://` addresses with tonic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TonicDialer;

impl TonicDialer {
    /// Create a dialer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Dialer for TonicDialer {
    async fn dial(
        &self,
        address: &str,
        options: &DialOptions,
    ) -> GateResult<Arc<dyn GitalyConnection>> {
        let channel = connect(address).await?;
        let interceptor = CallInterceptor::new(options)?;
        debug!(address = %address, "dialed storage backend");

        Ok(Arc::new(TonicConnection {
            grpc: Mutex::new(Some(tonic::client::Grpc::new(InterceptedService::new(
                channel,
                interceptor,
            )))),
            closed: AtomicBool::new(false),
        }))
    }
}

async fn connect(address: &str) -> GateResult<Channel> {
    let dial_error = |e: tonic::transport::Error| {
        GateError::transport(format!("failed to dial {address}: {e}"))
    };

    if let Some(path) = address.strip_prefix(UNIX_PREFIX) {
        let path = path.to_owned();
        let endpoint = Endpoint::try_from(UNIX_PLACEHOLDER_URI).map_err(GateError::configuration)?;
        return endpoint
            .connect_with_connector(tower::service_fn(move |_: Uri| {
                let path = path.clone();
                async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?)) }
            }))
            .await
            .map_err(dial_error);
    }

    if let Some(host) = address.strip_prefix(TCP_PREFIX) {
        return Endpoint::from_shared(format!("http://{host}"))
            .map_err(GateError::configuration)?
            .connect()
            .await
            .map_err(dial_error);
    }

    if let Some(host) = address.strip_prefix(TLS_PREFIX) {
        return Endpoint::from_shared(format!("https://{host}"))
            .map_err(GateError::configuration)?
            .tls_config(ClientTlsConfig::new().with_native_roots())
            .map_err(GateError::configuration)?
            .connect()
            .await
            .map_err(dial_error);
    }

    Err(GateError::Configuration(format!(
        "invalid backend address: {address}"
    )))
}

/// Stamps credentials and correlation metadata on every call, unary and
/// streaming alike.
#[derive(Clone)]
struct CallInterceptor {
    credentials: Option<RpcCredentials>,
    correlation_id: AsciiMetadataValue,
    client_name: AsciiMetadataValue,
}

impl CallInterceptor {
    fn new(options: &DialOptions) -> GateResult<Self> {
        let ascii = |value: &str| {
            MetadataValue::try_from(value)
                .map_err(|e| GateError::configuration(format!("invalid call metadata: {e}")))
        };
        Ok(Self {
            credentials: options.credentials.clone(),
            correlation_id: ascii(&options.correlation_id)?,
            client_name: ascii(&options.client_name)?,
        })
    }
}

impl Interceptor for CallInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let metadata = request.metadata_mut();
        if let Some(credentials) = &self.credentials {
            let value = credentials
                .authorization()
                .map_err(|e| Status::unauthenticated(e.to_string()))?;
            let value = MetadataValue::try_from(value)
                .map_err(|_| Status::internal("invalid authorization value"))?;
            metadata.insert(AUTHORIZATION_KEY, value);
        }
        metadata.insert(CORRELATION_ID_KEY, self.correlation_id.clone());
        metadata.insert(CLIENT_NAME_KEY, self.client_name.clone());
        Ok(request)
    }
}

struct TonicConnection {
    grpc: Mutex<Option<GrpcClient>>,
    closed: AtomicBool,
}

impl TonicConnection {
    fn client(&self) -> GateResult<GrpcClient> {
        self.grpc
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| GateError::transport("backend connection already closed"))
    }

    async fn transfer<R: StdinRequest>(
        &self,
        call: &CallContext,
        path: &'static str,
        first: R,
        streams: ReadWriter,
    ) -> GateResult<i32> {
        let ReadWriter {
            input,
            mut output,
            mut err_output,
        } = streams;

        let mut grpc = self.client()?;
        grpc.ready()
            .await
            .map_err(|e| GateError::transport(format!("backend not ready: {e}")))?;

        let input_failure = InputFailure::default();
        let mut request = Request::new(request_stream(first, input, input_failure.clone()));
        call.metadata().apply(request.metadata_mut());

        let codec: ProstCodec<R, SshResponse> = ProstCodec::default();
        let mut inbound = grpc
            .streaming(request, PathAndQuery::from_static(path), codec)
            .await
            .map_err(status_error)?
            .into_inner();

        let mut exit_code = 0;
        loop {
            let message = tokio::select! {
                () = call.cancelled() => {
                    return Err(GateError::protocol("backend call cancelled"));
                },
                message = inbound.message() => message.map_err(status_error)?,
            };
            let Some(message) = message else {
                break;
            };
            if !message.stdout.is_empty() {
                output.write_all(&message.stdout).await?;
            }
            if !message.stderr.is_empty() {
                err_output.write_all(&message.stderr).await?;
            }
            if let Some(status) = message.exit_status {
                exit_code = status.value;
            }
        }

        output.flush().await?;
        err_output.flush().await?;
        if let Some(e) = input_failure.take() {
            return Err(GateError::Io(e));
        }
        Ok(exit_code)
    }
}

#[async_trait]
impl GitalyConnection for TonicConnection {
    async fn ssh_upload_pack(
        &self,
        call: &CallContext,
        request: SshUploadPackRequest,
        streams: ReadWriter,
    ) -> GateResult<i32> {
        self.transfer(call, UPLOAD_PACK_PATH, request, streams)
            .await
    }

    async fn ssh_receive_pack(
        &self,
        call: &CallContext,
        request: SshReceivePackRequest,
        streams: ReadWriter,
    ) -> GateResult<i32> {
        self.transfer(call, RECEIVE_PACK_PATH, request, streams)
            .await
    }

    async fn ssh_upload_archive(
        &self,
        call: &CallContext,
        request: SshUploadArchiveRequest,
        streams: ReadWriter,
    ) -> GateResult<i32> {
        self.transfer(call, UPLOAD_ARCHIVE_PATH, request, streams)
            .await
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // Dropping the last channel handle tears down the connection.
            self.grpc
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            debug!("closed storage backend connection");
        }
    }
}

/// First error raised while reading session input.
///
/// The request stream can only end, so the failure is parked here and
/// returned once the backend has finished.
#[derive(Debug, Clone, Default)]
struct InputFailure(Arc<Mutex<Option<io::Error>>>);

impl InputFailure {
    fn record(&self, error: io::Error) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn take(&self) -> Option<io::Error> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// The first request followed by the session input in fixed-size chunks.
///
/// A read error ends the stream and is recorded in `failure`.
fn request_stream<R: StdinRequest>(
    first: R,
    input: BoxedReader,
    failure: InputFailure,
) -> impl Stream<Item = R> + Send {
    // ReaderStream yields nothing after its first error.
    let chunks = ReaderStream::with_capacity(input, STDIN_CHUNK_SIZE).filter_map(move |chunk| {
        future::ready(match chunk {
            Ok(bytes) => Some(R::stdin(bytes.to_vec())),
            Err(e) => {
                warn!(error = %e, "reading session input failed");
                failure.record(e);
                None
            },
        })
    });
    stream::once(future::ready(first)).chain(chunks)
}

fn status_error(status: Status) -> GateError {
    match status.code() {
        Code::Unavailable => GateError::transport(status.message()),
        _ => GateError::protocol(status.message()),
    }
}

/// Turn a backend exit status into a result.
///
/// # Errors
///
/// Returns [`GateError::Protocol`] for a non-zero status.
pub fn check_exit_status(code: i32) -> GateResult<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(GateError::Protocol(format!(
            "backend command exited with status {code}"
        )))
    }
}
