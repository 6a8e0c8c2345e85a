//! Collaborators shared by every command of one process.

use std::sync::Arc;

use gitgate_client::{
    AccessVerifier, ApiAccessVerifier, ClientOptions, HttpClient, build_client,
};
use gitgate_config::Config;
use gitgate_core::GateResult;
use gitgate_gitaly::{Dialer, TonicDialer};
use gitgate_telemetry::{SpanTracer, TracerFactory};

use crate::custom_action::{ApiCustomAction, CustomAction};

/// Read-only collaborators handed to commands at construction.
///
/// Cloning is cheap; nothing here is mutated after startup.
#[derive(Clone)]
pub struct Services {
    /// Process configuration.
    pub config: Arc<Config>,
    /// Control-plane HTTP client.
    pub api: Arc<HttpClient>,
    /// Access verifier consulted by data-plane and LFS commands.
    pub verifier: Arc<dyn AccessVerifier>,
    /// Storage backend dialer.
    pub dialer: Arc<dyn Dialer>,
    /// Per-command tracing sessions.
    pub tracer: Arc<dyn TracerFactory>,
    /// Handler for sessions the control plane takes over.
    pub custom_action: Arc<dyn CustomAction>,
}

impl Services {
    /// Build the production collaborators from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the control-plane client cannot be built.
    pub fn from_config(config: Config) -> GateResult<Self> {
        let api = Arc::new(build_client(&ClientOptions::from_config(&config))?);
        Ok(Self::with_client(config, api))
    }

    /// Production collaborators around an already built client.
    #[must_use]
    pub fn with_client(config: Config, api: Arc<HttpClient>) -> Self {
        Self {
            config: Arc::new(config),
            verifier: Arc::new(ApiAccessVerifier::new(Arc::clone(&api))),
            dialer: Arc::new(TonicDialer::new()),
            tracer: Arc::new(SpanTracer::new()),
            custom_action: Arc::new(ApiCustomAction::new(Arc::clone(&api))),
            api,
        }
    }

    /// Replace the access verifier.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn AccessVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Replace the backend dialer.
    #[must_use]
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// Replace the tracer factory.
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<dyn TracerFactory>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Replace the custom action handler.
    #[must_use]
    pub fn with_custom_action(mut self, custom_action: Arc<dyn CustomAction>) -> Self {
        self.custom_action = custom_action;
        self
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("config", &self.config)
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}
