//! Custom actions: sessions the control plane takes over.
//!
//! When the access check answers with a custom action (for example a
//! secondary proxying a push to its primary), the data-plane command hands
//! the session streams to a [`CustomAction`] and never dials the storage
//! backend.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use gitgate_client::http::{ensure_success, parse_json};
use gitgate_client::{AccessResponse, CustomPayloadData, HttpClient};
use gitgate_core::console::display_info_messages;
use gitgate_core::readwriter::BoxedReader;
use gitgate_core::{CommandContext, GateError, GateResult, ReadWriter};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::pktline;

/// Where a client request ends on the session input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEnd {
    /// Ref updates up to a flush packet, then pack data (pushes).
    Flush,
    /// Negotiation up to a `done` packet (fetches and archives).
    Done,
}

impl InputEnd {
    async fn read(self, input: &mut BoxedReader) -> GateResult<Vec<u8>> {
        let request = match self {
            Self::Flush => pktline::read_push(input).await?,
            Self::Done => pktline::read_until_done(input).await?,
        };
        Ok(request)
    }
}

/// Runs a session on behalf of the control plane.
#[async_trait]
pub trait CustomAction: Send + Sync {
    /// Take over the session described by `response`.
    ///
    /// Owns the session streams from here on; the result is the command's
    /// result.
    async fn execute(
        &self,
        ctx: &CommandContext,
        response: &AccessResponse,
        input_end: InputEnd,
        streams: ReadWriter,
    ) -> GateResult<()>;
}

#[derive(Serialize)]
struct ActionRequest<'a> {
    data: &'a CustomPayloadData,
    output: String,
}

#[derive(Deserialize)]
struct ActionResponse {
    #[serde(default)]
    result: String,
}

/// Relays the session through the endpoints named in the payload.
///
/// Each endpoint receives the action data plus everything the client sent
/// since the previous endpoint; its `result` is written back to the client.
#[derive(Debug, Clone)]
pub struct ApiCustomAction {
    client: Arc<HttpClient>,
}

impl ApiCustomAction {
    /// Relay through `client`.
    #[must_use]
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CustomAction for ApiCustomAction {
    async fn execute(
        &self,
        ctx: &CommandContext,
        response: &AccessResponse,
        input_end: InputEnd,
        streams: ReadWriter,
    ) -> GateResult<()> {
        let ReadWriter {
            mut input,
            mut output,
            mut err_output,
        } = streams;

        let mut data = response.payload.data.clone();
        data.extra.insert(
            "gl_id".to_owned(),
            serde_json::Value::String(response.who.clone()),
        );
        info!(
            action = %response.payload.action,
            endpoints = data.api_endpoints.len(),
            "running custom action"
        );

        if !data.info_message.is_empty() {
            display_info_messages(std::slice::from_ref(&data.info_message), &mut err_output)
                .await?;
        }

        let mut client_request = Vec::new();
        for (i, endpoint) in data.api_endpoints.iter().enumerate() {
            if i > 0 {
                client_request = input_end.read(&mut input).await?;
            }

            debug!(endpoint = %endpoint, bytes = client_request.len(), "calling custom action endpoint");
            let body = ActionRequest {
                data: &data,
                output: STANDARD.encode(&client_request),
            };
            let reply = ensure_success(self.client.post(ctx, endpoint, &body).await?).await?;
            let reply: ActionResponse = parse_json(reply).await?;
            let result = STANDARD.decode(reply.result.as_bytes()).map_err(|e| {
                GateError::protocol(format!("invalid custom action result from {endpoint}: {e}"))
            })?;

            output.write_all(&result).await?;
            output.flush().await?;
        }
        Ok(())
    }
}
