//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate the configuration once more (programmatic configs skip the loader)
//! - Build every subsystem in dependency order
//! - Hand out one immutable [`Gateway`] shared by all tasks
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners are bound by the caller, after the gateway exists

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::config::{validate_config, GatewayConfig, ValidationError};
use crate::directory::{self, Directory};
use crate::proxy::{FileProxy, RegistryProxy, SourceControlProxy, UpstreamClients};
use crate::routing::RequestRouter;
use crate::security::{access_control, PolicyGuard, RateLimiter};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Invalid(Vec<ValidationError>),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Everything a request needs, built once.
pub struct Gateway {
    pub config: Arc<GatewayConfig>,
    pub router: RequestRouter,
    pub limiter: Arc<RateLimiter>,
    pub file_proxy: FileProxy,
    pub source_control: SourceControlProxy,
    pub registry: RegistryProxy,
    pub directory: Arc<dyn Directory>,
    pub started_at: Instant,
}

impl Gateway {
    pub fn from_config(config: GatewayConfig) -> Result<Self, StartupError> {
        validate_config(&config).map_err(StartupError::Invalid)?;

        let clients = UpstreamClients::new(&config.timeouts)?;
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let (allowed, blocked) = access_control::from_config(&config.source_control);
        let guard = Arc::new(PolicyGuard::new(allowed, blocked, Arc::clone(&limiter)));

        let gateway = Self {
            router: RequestRouter::from_config(&config.directory),
            file_proxy: FileProxy::new(clients.following.clone(), &config.file_proxy),
            source_control: SourceControlProxy::new(
                clients.following.clone(),
                &config.source_control,
                guard,
            ),
            directory: directory::from_config(clients.following.clone(), &config.directory),
            registry: RegistryProxy::new(clients, &config.registry),
            limiter,
            config: Arc::new(config),
            started_at: Instant::now(),
        };

        tracing::info!(
            source_control = %gateway.source_control.upstream(),
            registry = %gateway.registry.upstream(),
            rate_limit = gateway.limiter.limit(),
            window_secs = gateway.limiter.window().as_secs(),
            directory = gateway.config.directory.api_base.as_deref().unwrap_or("<unset>"),
            "Gateway initialized"
        );
        Ok(gateway)
    }

    /// Replace the directory collaborator.
    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = directory;
        self
    }
}
