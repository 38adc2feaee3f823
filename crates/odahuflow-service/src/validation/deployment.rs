//! Model deployment validation

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

use odahuflow_core::{Connection, ModelDeployment, Repository, ResourceResult};
use odahuflow_db::Repositories;

use super::id::{validate_id, validate_label};
use super::violations::Violations;
use super::{lookup, validate_node_selector, validate_or_default_resources, Validator};
use crate::config::DeploymentConfig;

pub const DEFAULT_MIN_REPLICAS: i32 = 0;
pub const DEFAULT_MAX_REPLICAS: i32 = 1;

/// Checks deployments and fills in replicas, role, resources and pull secret
pub struct DeploymentValidator {
    connections: Arc<dyn Repository<Connection>>,
    config: DeploymentConfig,
}

impl DeploymentValidator {
    pub fn new(repositories: &Repositories, config: DeploymentConfig) -> Self {
        Self {
            connections: repositories.connections.clone(),
            config,
        }
    }

    fn validate_replicas(md: &mut ModelDeployment, violations: &mut Violations) {
        let spec = &mut md.spec;

        let min = match spec.min_replicas {
            None => {
                info!(replicas = DEFAULT_MIN_REPLICAS, "minimum replicas are not set, using the default");
                spec.min_replicas = Some(DEFAULT_MIN_REPLICAS);
                DEFAULT_MIN_REPLICAS
            }
            Some(min) => {
                if min < 0 {
                    violations.invalid(
                        "spec.minReplicas",
                        "minimum number of replicas parameter must not be less than 0",
                    );
                }
                min
            }
        };

        let max = match spec.max_replicas {
            None => {
                let max = min.max(DEFAULT_MAX_REPLICAS);
                info!(replicas = max, "maximum replicas are not set, using the default");
                spec.max_replicas = Some(max);
                max
            }
            Some(max) => {
                if max < 1 {
                    violations.invalid(
                        "spec.maxReplicas",
                        "maximum number of replicas parameter must not be less than 1",
                    );
                }
                max
            }
        };

        if min > max {
            violations.invalid(
                "spec.maxReplicas",
                "maximum number of replicas parameter must not be less than minimum number of replicas parameter",
            );
        }
    }

    async fn validate_image_pull_connection(
        &self,
        md: &mut ModelDeployment,
        violations: &mut Violations,
    ) -> ResourceResult<()> {
        const FIELD: &str = "spec.imagePullConnID";
        let spec = &mut md.spec;

        if spec.image_pull_conn_id.is_empty() {
            if self.config.default_docker_pull_conn_name.is_empty() {
                return Ok(());
            }
            spec.image_pull_conn_id = self.config.default_docker_pull_conn_name.clone();
            info!(connection = %spec.image_pull_conn_id, "image pull connection is empty, using the configured default");
        }

        match lookup(self.connections.as_ref(), &spec.image_pull_conn_id).await? {
            None => violations.not_found(FIELD, &spec.image_pull_conn_id),
            Some(connection) if !connection.spec.connection_type.is_registry() => violations.invalid(
                FIELD,
                format!(
                    "image pull connection {} has type {}, a docker or ecr connection is required",
                    connection.id, connection.spec.connection_type
                ),
            ),
            Some(_) => {}
        }
        Ok(())
    }
}

#[async_trait]
impl Validator<ModelDeployment> for DeploymentValidator {
    #[instrument(skip(self, md), fields(id = %md.id))]
    async fn validate_and_set_defaults(&self, md: &mut ModelDeployment) -> ResourceResult<()> {
        let mut violations = Violations::new();

        if let Err(message) = validate_id(&md.id) {
            violations.invalid("id", message);
        }

        if md.spec.image.is_empty() {
            violations.empty("spec.image");
        }

        if md.spec.role_name.is_empty() {
            md.spec.role_name = self.config.default_role_name.clone();
            info!(role = %md.spec.role_name, "role name is empty, using the configured default");
        } else if let Err(message) = validate_label(&md.spec.role_name) {
            violations.invalid("spec.roleName", message);
        }

        Self::validate_replicas(md, &mut violations);

        validate_or_default_resources(&mut md.spec.resources, &self.config.default_resources, &mut violations);

        self.validate_image_pull_connection(md, &mut violations).await?;

        validate_node_selector(&md.spec.node_selector, &self.config.node_pools, &mut violations);

        violations.into_result(&md.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odahuflow_core::{ConnectionSpec, ConnectionType, ModelDeploymentSpec, ViolationKind};

    async fn repositories() -> Repositories {
        let repos = Repositories::in_memory();
        for (id, kind) in [("registry", ConnectionType::Docker), ("storage", ConnectionType::S3)] {
            let mut conn = Connection::new(id, ConnectionSpec::new(kind, "uri"));
            repos.connections.create(&mut conn).await.unwrap();
        }
        repos
    }

    fn deployment() -> ModelDeployment {
        ModelDeployment::new(
            "wine",
            ModelDeploymentSpec {
                image: "odahu/wine:1.0".to_string(),
                ..ModelDeploymentSpec::default()
            },
        )
    }

    #[tokio::test]
    async fn test_defaults_are_applied() {
        let repos = repositories().await;
        let config = DeploymentConfig {
            default_docker_pull_conn_name: "registry".to_string(),
            ..DeploymentConfig::default()
        };
        let mut md = deployment();

        DeploymentValidator::new(&repos, config)
            .validate_and_set_defaults(&mut md)
            .await
            .unwrap();

        assert_eq!(md.spec.role_name, "default-odahu-flow");
        assert_eq!(md.spec.min_replicas, Some(0));
        assert_eq!(md.spec.max_replicas, Some(1));
        assert_eq!(md.spec.image_pull_conn_id, "registry");
        assert_eq!(md.spec.resources, Some(crate::config::default_resources()));
    }

    #[tokio::test]
    async fn test_max_replicas_follow_min() {
        let repos = repositories().await;
        let mut md = deployment();
        md.spec.min_replicas = Some(3);

        DeploymentValidator::new(&repos, DeploymentConfig::default())
            .validate_and_set_defaults(&mut md)
            .await
            .unwrap();

        assert_eq!(md.spec.max_replicas, Some(3));
    }

    #[tokio::test]
    async fn test_every_violation_is_reported() {
        let repos = repositories().await;
        let mut md = deployment();
        md.spec.image.clear();
        md.spec.role_name = "-bad role".to_string();
        md.spec.min_replicas = Some(-1);
        md.spec.max_replicas = Some(0);
        md.spec.image_pull_conn_id = "storage".to_string();

        let err = DeploymentValidator::new(&repos, DeploymentConfig::default())
            .validate_and_set_defaults(&mut md)
            .await
            .unwrap_err();

        let found: Vec<_> = err
            .violations()
            .iter()
            .map(|v| (v.field.as_str(), v.kind))
            .collect();
        assert_eq!(
            found,
            vec![
                ("spec.image", ViolationKind::Empty),
                ("spec.roleName", ViolationKind::Invalid),
                ("spec.minReplicas", ViolationKind::Invalid),
                ("spec.maxReplicas", ViolationKind::Invalid),
                ("spec.imagePullConnID", ViolationKind::Invalid),
            ]
        );
    }

    #[tokio::test]
    async fn test_min_above_max_and_missing_pull_connection() {
        let repos = repositories().await;
        let mut md = deployment();
        md.spec.min_replicas = Some(5);
        md.spec.max_replicas = Some(2);
        md.spec.image_pull_conn_id = "missing".to_string();

        let err = DeploymentValidator::new(&repos, DeploymentConfig::default())
            .validate_and_set_defaults(&mut md)
            .await
            .unwrap_err();

        let kinds: Vec<_> = err.violations().iter().map(|v| v.kind).collect();
        assert_eq!(kinds, vec![ViolationKind::Invalid, ViolationKind::NotFound]);
    }
}
