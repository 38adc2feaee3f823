//! Odahu Flow service layer
//!
//! Validation and defaulting of every resource kind, configuration loading,
//! connection read views and tracing setup. [`Services`] wires the
//! repositories and validators together once at startup.

pub mod config;
pub mod connection;
pub mod telemetry;
pub mod validation;

use odahuflow_db::{BackendResult, Repositories};

pub use config::{
    ApiConfig, ConfigError, ConfigResult, ConnectionConfig, DeploymentConfig, LoggingConfig,
    NodePool, PackagingConfig, TrainingConfig,
};
pub use connection::ConnectionService;
pub use telemetry::init_tracing;
pub use validation::{
    ConnectionValidator, DeploymentValidator, IntegrationValidator, PackagingValidator,
    RouteValidator, TrainingValidator, Validator,
};

/// Repositories plus the validators that gate writes to them
pub struct Services {
    pub repositories: Repositories,
    pub connections: ConnectionService,
    pub packaging: PackagingValidator,
    pub training: TrainingValidator,
    pub deployment: DeploymentValidator,
    pub route: RouteValidator,
    pub integration: IntegrationValidator,
}

impl Services {
    /// Connect the configured backends and build everything on top of them
    pub async fn from_config(config: &ApiConfig) -> BackendResult<Self> {
        let repositories = Repositories::from_config(&config.storage).await?;
        Ok(Self::with_repositories(repositories, config))
    }

    pub fn with_repositories(repositories: Repositories, config: &ApiConfig) -> Self {
        Self {
            connections: ConnectionService::new(&repositories, &config.connection),
            packaging: PackagingValidator::new(&repositories, config.packaging.clone()),
            training: TrainingValidator::new(&repositories, config.training.clone()),
            deployment: DeploymentValidator::new(&repositories, config.deployment.clone()),
            route: RouteValidator::new(&repositories),
            integration: IntegrationValidator::new(&repositories),
            repositories,
        }
    }
}
