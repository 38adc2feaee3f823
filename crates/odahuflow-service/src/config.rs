//! API configuration
//!
//! Layered, lowest precedence first: built-in defaults, an optional config
//! file (TOML, YAML or JSON by extension), then `ODAHUFLOW__*` environment
//! variables with `__` separating nested keys, e.g.
//! `ODAHUFLOW__STORAGE__CONNECTIONS=secret_vault`. A `.env` file in the
//! working directory is loaded into the environment first when present.

use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use odahuflow_core::{ResourceList, ResourceRequirements};
use odahuflow_db::StorageConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ODAHUFLOW";

/// Errors while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to read .env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Requests `128m`/`128Mi`, limits `256m`/`256Mi`
pub fn default_resources() -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(ResourceList::new("128m", "128Mi")),
        limits: Some(ResourceList::new("256m", "256Mi")),
    }
}

/// A set of nodes that workloads may be pinned to
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NodePool {
    pub node_selector: BTreeMap<String, String>,
}

impl NodePool {
    pub fn new<'a>(labels: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            node_selector: labels
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PackagingConfig {
    /// Applied when a packaging leaves `resources` unset
    pub default_resources: ResourceRequirements,
    /// Connection used when a packaging leaves `outputConnection` empty
    pub output_connection_id: String,
    pub node_pools: Vec<NodePool>,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            default_resources: default_resources(),
            output_connection_id: String::new(),
            node_pools: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub default_resources: ResourceRequirements,
    pub output_connection_id: String,
    pub node_pools: Vec<NodePool>,
    /// Pools accepted when the training requests a GPU
    pub gpu_node_pools: Vec<NodePool>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            default_resources: default_resources(),
            output_connection_id: String::new(),
            node_pools: Vec::new(),
            gpu_node_pools: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub default_resources: ResourceRequirements,
    pub default_role_name: String,
    /// Image pull connection used when a deployment names none
    pub default_docker_pull_conn_name: String,
    pub node_pools: Vec<NodePool>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            default_resources: default_resources(),
            default_role_name: "default-odahu-flow".to_string(),
            default_docker_pull_conn_name: String::new(),
            node_pools: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Capability token unlocking decrypted connection reads. Empty disables them.
    pub decrypt_token: SecretString,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            decrypt_token: SecretString::new(String::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration of the management API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub storage: StorageConfig,
    pub packaging: PackagingConfig,
    pub training: TrainingConfig,
    pub deployment: DeploymentConfig,
    pub connection: ConnectionConfig,
    pub logging: LoggingConfig,
}

impl ApiConfig {
    /// Load defaults, then `path` if given, then the environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        accept_missing_env_file(dotenvy::dotenv())?;

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}

/// A missing `.env` file is fine; an unreadable or malformed one is not
fn accept_missing_env_file<T>(result: Result<T, dotenvy::Error>) -> ConfigResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odahuflow_db::BackendKind;
    use secrecy::ExposeSecret;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.storage.resources, BackendKind::Kubernetes);
        assert_eq!(config.deployment.default_role_name, "default-odahu-flow");
        assert_eq!(
            config.packaging.default_resources.limits,
            Some(ResourceList::new("256m", "256Mi"))
        );
        assert!(config.connection.decrypt_token.expose_secret().is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("odahuflow-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("api.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "storage": {{"connections": "secret_vault", "kubernetes": {{"namespace": "models"}}}},
                "packaging": {{
                    "output_connection_id": "models-output",
                    "node_pools": [{{"node_selector": {{"mode": "packaging"}}}}]
                }},
                "connection": {{"decrypt_token": "let-me-in"}}
            }}"#
        )
        .unwrap();

        let config = ApiConfig::load(Some(&path)).unwrap();
        assert_eq!(config.storage.connections, BackendKind::SecretVault);
        assert_eq!(config.storage.kubernetes.namespace, "models");
        assert_eq!(config.storage.kubernetes.update_conflict_retries, 3);
        assert_eq!(config.packaging.output_connection_id, "models-output");
        assert_eq!(config.packaging.node_pools, vec![NodePool::new([("mode", "packaging")])]);
        assert_eq!(config.packaging.default_resources, default_resources());
        assert_eq!(config.connection.decrypt_token.expose_secret(), "let-me-in");

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_env_file_errors() {
        let dir = std::env::temp_dir().join(format!("odahuflow-env-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let missing = dotenvy::from_path(dir.join("absent.env"));
        assert!(accept_missing_env_file(missing).is_ok());

        let path = dir.join("broken.env");
        std::fs::write(&path, "odahuflow broken line\n").unwrap();
        let broken = dotenvy::from_path(&path);
        assert!(matches!(
            accept_missing_env_file(broken),
            Err(ConfigError::EnvFile(dotenvy::Error::LineParse(..)))
        ));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ApiConfig::load(Some(Path::new("/nonexistent/odahuflow.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
