//! Backend selection
//!
//! The physical store is picked once from configuration by
//! [`Backend::connect`]. Every repository the rest of the system consumes is
//! then built from that handle and bundled into [`Repositories`].

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use odahuflow_core::{
    Connection, ModelDeployment, ModelPackaging, ModelRoute, ModelTraining, PackagingIntegration,
    Repository, Resource, ResourceError, ToolchainIntegration,
};

use crate::config::{BackendKind, KubernetesConfig, StorageConfig};
use crate::crd::{CrdRepository, InMemoryObjectStore, KubeObjectStore, ObjectStore};
use crate::relational::{run_migrations, PostgresRepository};
use crate::vault::VaultConnectionRepository;

/// Failures while bringing a backend up
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("kubernetes client error: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("vault client error: {0}")]
    Vault(#[source] ResourceError),

    #[error("{kind:?} backend cannot store {resource} resources")]
    Unsupported {
        kind: BackendKind,
        resource: &'static str,
    },
}

/// Result type for backend setup
pub type BackendResult<T> = Result<T, BackendError>;

/// A connected store
#[derive(Clone)]
pub enum Backend {
    Kubernetes {
        store: Arc<dyn ObjectStore>,
        config: KubernetesConfig,
    },
    Relational(PgPool),
    SecretVault(VaultConnectionRepository),
}

impl Backend {
    /// Connect to the store of the given kind
    pub async fn connect(kind: BackendKind, config: &StorageConfig) -> BackendResult<Self> {
        let backend = match kind {
            BackendKind::Kubernetes => {
                let client = kube::Client::try_default().await?;
                let store = KubeObjectStore::new(client, &config.kubernetes.namespace);
                Self::Kubernetes {
                    store: Arc::new(store),
                    config: config.kubernetes.clone(),
                }
            }
            BackendKind::Relational => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.database.max_connections)
                    .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
                    .connect(&config.database.url)
                    .await?;
                if config.database.migrate {
                    run_migrations(&pool).await?;
                }
                Self::Relational(pool)
            }
            BackendKind::SecretVault => Self::SecretVault(
                VaultConnectionRepository::new(&config.vault).map_err(BackendError::Vault)?,
            ),
        };

        info!(?kind, "storage backend connected");
        Ok(backend)
    }

    /// Custom-resource backend over an in-process object store
    pub fn in_memory(config: KubernetesConfig) -> Self {
        Self::Kubernetes {
            store: Arc::new(InMemoryObjectStore::new()),
            config,
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Kubernetes { .. } => BackendKind::Kubernetes,
            Self::Relational(_) => BackendKind::Relational,
            Self::SecretVault(_) => BackendKind::SecretVault,
        }
    }

    /// Repository of `R` on this store. Vault only stores connections.
    pub fn repository<R: Resource>(&self) -> BackendResult<Arc<dyn Repository<R>>> {
        match self {
            Self::Kubernetes { store, config } => Ok(Arc::new(
                CrdRepository::<R>::new(store.clone())
                    .with_propagation(config.deletion_propagation)
                    .with_conflict_retries(config.update_conflict_retries),
            )),
            Self::Relational(pool) => Ok(Arc::new(PostgresRepository::<R>::new(pool.clone()))),
            Self::SecretVault(_) => Err(BackendError::Unsupported {
                kind: BackendKind::SecretVault,
                resource: R::KIND,
            }),
        }
    }

    /// Connection repository on this store; every backend supports it
    pub fn connection_repository(&self) -> Arc<dyn Repository<Connection>> {
        match self {
            Self::SecretVault(vault) => Arc::new(vault.clone()),
            Self::Kubernetes { store, config } => Arc::new(
                CrdRepository::<Connection>::new(store.clone())
                    .with_conflict_retries(config.update_conflict_retries),
            ),
            Self::Relational(pool) => Arc::new(PostgresRepository::<Connection>::new(pool.clone())),
        }
    }
}

/// Every repository, composed once at startup and shared by reference
#[derive(Clone)]
pub struct Repositories {
    pub connections: Arc<dyn Repository<Connection>>,
    pub deployments: Arc<dyn Repository<ModelDeployment>>,
    pub routes: Arc<dyn Repository<ModelRoute>>,
    pub packagings: Arc<dyn Repository<ModelPackaging>>,
    pub packaging_integrations: Arc<dyn Repository<PackagingIntegration>>,
    pub trainings: Arc<dyn Repository<ModelTraining>>,
    pub toolchain_integrations: Arc<dyn Repository<ToolchainIntegration>>,
}

impl Repositories {
    /// Connect the configured backends and build every repository
    pub async fn from_config(config: &StorageConfig) -> BackendResult<Self> {
        let resources = Backend::connect(config.resources, config).await?;
        let connections = if config.connections == config.resources {
            resources.clone()
        } else {
            Backend::connect(config.connections, config).await?
        };
        Self::from_backends(&connections, &resources)
    }

    /// Connections on one store, every other kind on another
    pub fn from_backends(connections: &Backend, resources: &Backend) -> BackendResult<Self> {
        Ok(Self {
            connections: connections.connection_repository(),
            deployments: resources.repository()?,
            routes: resources.repository()?,
            packagings: resources.repository()?,
            packaging_integrations: resources.repository()?,
            trainings: resources.repository()?,
            toolchain_integrations: resources.repository()?,
        })
    }

    /// Everything on one shared in-process object store
    pub fn in_memory() -> Self {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        Self {
            connections: Arc::new(CrdRepository::new(store.clone())),
            deployments: Arc::new(CrdRepository::new(store.clone())),
            routes: Arc::new(CrdRepository::new(store.clone())),
            packagings: Arc::new(CrdRepository::new(store.clone())),
            packaging_integrations: Arc::new(CrdRepository::new(store.clone())),
            trainings: Arc::new(CrdRepository::new(store.clone())),
            toolchain_integrations: Arc::new(CrdRepository::new(store)),
        }
    }
}
