//! Model packaging validation

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

use odahuflow_core::{
    Connection, ModelPackaging, PackagingIntegration, Repository, ResourceResult,
};
use odahuflow_db::Repositories;

use super::arguments::validate_arguments;
use super::targets::resolve_targets;
use super::violations::Violations;
use super::{
    lookup, resolve_output_connection, validate_node_selector, validate_or_default_resources,
    validate_or_generate_id, Validator,
};
use crate::config::PackagingConfig;

/// Checks packagings against their packaging integration
pub struct PackagingValidator {
    integrations: Arc<dyn Repository<PackagingIntegration>>,
    connections: Arc<dyn Repository<Connection>>,
    config: PackagingConfig,
}

impl PackagingValidator {
    pub fn new(repositories: &Repositories, config: PackagingConfig) -> Self {
        Self {
            integrations: repositories.packaging_integrations.clone(),
            connections: repositories.connections.clone(),
            config,
        }
    }
}

#[async_trait]
impl Validator<ModelPackaging> for PackagingValidator {
    #[instrument(skip(self, mp), fields(id = %mp.id, integration = %mp.spec.integration_name))]
    async fn validate_and_set_defaults(&self, mp: &mut ModelPackaging) -> ResourceResult<()> {
        let mut violations = Violations::new();
        let spec = &mut mp.spec;

        validate_or_generate_id(
            &mut mp.id,
            &[spec.artifact_name.as_str(), spec.integration_name.as_str()],
            "mp",
            &mut violations,
        );

        let integration = if spec.integration_name.is_empty() {
            violations.empty("spec.integrationName");
            None
        } else {
            let found = lookup(self.integrations.as_ref(), &spec.integration_name).await?;
            if found.is_none() {
                violations.not_found("spec.integrationName", &spec.integration_name);
            }
            found
        };

        if let Some(integration) = &integration {
            if spec.image.is_empty() {
                spec.image = integration.spec.default_image.clone();
                info!(image = %spec.image, "image is empty, using the integration default image");
            }
        }

        match (spec.artifact_name.is_empty(), spec.training_id.is_empty()) {
            (false, true) | (true, false) => {}
            _ => violations.invalid(
                "spec.artifactName",
                "exactly one of artifactName and trainingID must be set",
            ),
        }

        if let Some(integration) = &integration {
            violations.extend(validate_arguments(
                &integration.spec.schema.arguments,
                &spec.arguments,
                "spec.arguments",
            ));
            resolve_targets(
                self.connections.as_ref(),
                integration,
                &mut spec.targets,
                "spec.targets",
                &mut violations,
            )
            .await?;
        }

        resolve_output_connection(
            self.connections.as_ref(),
            &mut spec.output_connection,
            &self.config.output_connection_id,
            &mut violations,
        )
        .await?;

        validate_or_default_resources(&mut spec.resources, &self.config.default_resources, &mut violations);
        validate_node_selector(&spec.node_selector, &self.config.node_pools, &mut violations);

        violations.into_result(&mp.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodePool;
    use odahuflow_core::{
        ArgumentsSchema, ConnectionSpec, ConnectionType, IntegrationSpec, ModelPackagingSpec,
        Property, ResourceList, ResourceRequirements, Target, TargetSchema, ViolationKind,
    };
    use serde_json::json;

    async fn repositories() -> Repositories {
        let repos = Repositories::in_memory();

        for (id, kind) in [
            ("storage", ConnectionType::S3),
            ("other-storage", ConnectionType::Gcs),
            ("registry", ConnectionType::Docker),
        ] {
            let mut conn = Connection::new(id, ConnectionSpec::new(kind, "uri"));
            repos.connections.create(&mut conn).await.unwrap();
        }

        let mut integration = PackagingIntegration::new(
            "docker-rest",
            IntegrationSpec {
                entrypoint: "/usr/bin/pack".to_string(),
                default_image: "odahu/packager:1.0".to_string(),
                privileged: false,
                ..IntegrationSpec::default()
            },
        );
        integration.spec.schema.targets = vec![
            TargetSchema::new(
                "target-1",
                vec![ConnectionType::S3, ConnectionType::Gcs, ConnectionType::AzureBlob],
            )
            .with_default("storage"),
            TargetSchema::new("target-2", vec![ConnectionType::Docker]).required(),
        ];
        integration.spec.schema.arguments = ArgumentsSchema {
            properties: vec![Property::new("argument-1")
                .with_parameter("type", json!("number"))
                .with_parameter("minimum", json!(5))],
            required: vec!["argument-1".to_string()],
        };
        repos.packaging_integrations.create(&mut integration).await.unwrap();

        repos
    }

    fn packaging() -> ModelPackaging {
        let mut spec = ModelPackagingSpec {
            artifact_name: "wine.zip".to_string(),
            integration_name: "docker-rest".to_string(),
            output_connection: "storage".to_string(),
            targets: vec![Target::new("target-2", "registry")],
            ..ModelPackagingSpec::default()
        };
        spec.arguments.insert("argument-1".to_string(), json!(7));
        ModelPackaging::new("wine", spec)
    }

    fn validator(repos: &Repositories) -> PackagingValidator {
        PackagingValidator::new(repos, PackagingConfig::default())
    }

    #[tokio::test]
    async fn test_valid_packaging_gets_defaults() {
        let repos = repositories().await;
        let mut mp = packaging();

        validator(&repos).validate_and_set_defaults(&mut mp).await.unwrap();

        assert_eq!(mp.spec.image, "odahu/packager:1.0");
        assert_eq!(
            mp.spec.targets,
            vec![Target::new("target-2", "registry"), Target::new("target-1", "storage")]
        );
        assert_eq!(mp.spec.resources, Some(crate::config::default_resources()));
    }

    #[tokio::test]
    async fn test_explicit_image_and_target_are_kept() {
        let repos = repositories().await;
        let mut mp = packaging();
        mp.spec.image = "custom/image:2".to_string();
        mp.spec.targets.insert(0, Target::new("target-1", "other-storage"));

        validator(&repos).validate_and_set_defaults(&mut mp).await.unwrap();

        assert_eq!(mp.spec.image, "custom/image:2");
        assert_eq!(
            mp.spec.targets,
            vec![Target::new("target-1", "other-storage"), Target::new("target-2", "registry")]
        );
    }

    #[tokio::test]
    async fn test_generated_id() {
        let repos = repositories().await;
        let mut mp = packaging();
        mp.id.clear();

        validator(&repos).validate_and_set_defaults(&mut mp).await.unwrap();

        assert!(mp.id.starts_with("wine-zip-docker-rest-"), "{}", mp.id);
    }

    #[tokio::test]
    async fn test_unknown_integration_skips_dependent_checks() {
        let repos = repositories().await;
        let mut mp = packaging();
        mp.spec.integration_name = "missing".to_string();
        mp.spec.arguments.insert("unknown".to_string(), json!(1));

        let err = validator(&repos).validate_and_set_defaults(&mut mp).await.unwrap_err();

        let kinds: Vec<_> = err.violations().iter().map(|v| v.kind).collect();
        assert_eq!(kinds, vec![ViolationKind::NotFound]);
        assert!(mp.spec.image.is_empty());
    }

    #[tokio::test]
    async fn test_every_violation_is_reported() {
        let repos = repositories().await;
        let mut mp = packaging();
        mp.id = "Not_Valid".to_string();
        mp.spec.training_id = "wine-training".to_string();
        mp.spec.arguments.insert("argument-1".to_string(), json!(4));
        mp.spec.targets.clear();
        mp.spec.output_connection.clear();
        mp.spec.resources = Some(ResourceRequirements {
            requests: Some(ResourceList::new("many", "lots")),
            limits: None,
        });
        mp.spec.node_selector.insert("mode".to_string(), "gpu".to_string());

        let err = validator(&repos).validate_and_set_defaults(&mut mp).await.unwrap_err();

        let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "id",
                "spec.artifactName",
                "spec.arguments.argument-1",
                "spec.targets",
                "spec.outputConnection",
                "spec.resources.requests.cpu",
                "spec.resources.requests.memory",
                "spec.nodeSelector",
            ]
        );
    }

    #[tokio::test]
    async fn test_configured_output_connection_and_node_pool() {
        let repos = repositories().await;
        let config = PackagingConfig {
            output_connection_id: "other-storage".to_string(),
            node_pools: vec![NodePool::new([("mode", "packaging")])],
            ..PackagingConfig::default()
        };
        let mut mp = packaging();
        mp.spec.output_connection.clear();
        mp.spec.node_selector.insert("mode".to_string(), "packaging".to_string());

        PackagingValidator::new(&repos, config)
            .validate_and_set_defaults(&mut mp)
            .await
            .unwrap();

        assert_eq!(mp.spec.output_connection, "other-storage");
    }
}
