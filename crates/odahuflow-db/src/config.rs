//! Storage configuration

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::crd::{DeletionPropagation, DEFAULT_UPDATE_CONFLICT_RETRIES};

/// Physical store behind a family of repositories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Kubernetes,
    Relational,
    SecretVault,
}

/// Kubernetes custom-resource backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Namespace holding the custom resources
    pub namespace: String,
    /// Cascade policy for kinds owning child objects
    pub deletion_propagation: DeletionPropagation,
    /// Re-reads attempted after an update conflict
    pub update_conflict_retries: u32,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            namespace: "odahu-flow".to_string(),
            deletion_propagation: DeletionPropagation::Foreground,
            update_conflict_retries: DEFAULT_UPDATE_CONFLICT_RETRIES,
        }
    }
}

/// PostgreSQL backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// Apply bundled migrations at startup
    pub migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://odahu@localhost:5432/odahu".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            migrate: true,
        }
    }
}

/// Vault backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub url: String,
    #[serde(skip_serializing)]
    pub token: SecretString,
    /// KV mount and prefix holding one secret per connection
    pub secret_engine_path: String,
    pub timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8200".to_string(),
            token: SecretString::new(String::new()),
            secret_engine_path: "odahu-flow/connections".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Backend selection plus per-backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store for connections; any backend kind
    pub connections: BackendKind,
    /// Store for every other kind; `kubernetes` or `relational`
    pub resources: BackendKind,
    pub kubernetes: KubernetesConfig,
    pub database: DatabaseConfig,
    pub vault: VaultConfig,
}
