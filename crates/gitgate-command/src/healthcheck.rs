//! `gitgate-check`: is the control plane reachable and healthy?

use async_trait::async_trait;
use gitgate_client::api::healthcheck::check;
use gitgate_core::{CommandContext, GateError, GateResult, ReadWriter};

use crate::Command;
use crate::output::write_text;
use crate::services::Services;

const API_OK: &str = "Internal API available: OK\n";
const REDIS_OK: &str = "Redis available via internal API: OK\n";

/// Checks the internal API and, through it, Redis.
#[derive(Debug)]
pub struct HealthcheckCommand {
    streams: ReadWriter,
    services: Services,
}

impl HealthcheckCommand {
    /// Build the command.
    #[must_use]
    pub fn new(streams: ReadWriter, services: Services) -> Self {
        Self { streams, services }
    }
}

#[async_trait]
impl Command for HealthcheckCommand {
    async fn execute(self: Box<Self>, ctx: &CommandContext) -> GateResult<()> {
        let Self {
            mut streams,
            services,
        } = *self;

        let health = check(&services.api, ctx)
            .await
            .map_err(|e| GateError::Unavailable(format!("Internal API available: FAILED - {e}")))?;
        write_text(&mut streams.output, API_OK).await?;

        if !health.redis {
            return Err(GateError::Unavailable(
                "Redis available via internal API: FAILED".to_owned(),
            ));
        }
        write_text(&mut streams.output, REDIS_OK).await
    }
}
