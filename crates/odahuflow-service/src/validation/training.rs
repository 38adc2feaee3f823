//! Model training validation
//!
//! Trainings are checked like packagings, with the toolchain integration in
//! place of the packaging integration and hyper-parameters in place of
//! arguments. Instead of the artifact/training ID rule, a training needs a
//! model name and version that are valid label values.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

use odahuflow_core::{
    Connection, ModelTraining, Repository, ResourceResult, ToolchainIntegration,
    DEFAULT_ARTIFACT_NAME_TEMPLATE,
};
use odahuflow_db::Repositories;

use super::arguments::validate_arguments;
use super::id::validate_label;
use super::quantity::requests_gpu;
use super::targets::resolve_targets;
use super::violations::Violations;
use super::{
    lookup, resolve_output_connection, validate_node_selector, validate_or_default_resources,
    validate_or_generate_id, Validator,
};
use crate::config::TrainingConfig;

/// Checks trainings against their toolchain integration
pub struct TrainingValidator {
    toolchains: Arc<dyn Repository<ToolchainIntegration>>,
    connections: Arc<dyn Repository<Connection>>,
    config: TrainingConfig,
}

impl TrainingValidator {
    pub fn new(repositories: &Repositories, config: TrainingConfig) -> Self {
        Self {
            toolchains: repositories.toolchain_integrations.clone(),
            connections: repositories.connections.clone(),
            config,
        }
    }
}

fn validate_label_field(value: &str, field: &str, violations: &mut Violations) {
    if value.is_empty() {
        violations.empty(field);
    } else if let Err(message) = validate_label(value) {
        violations.invalid(field, message);
    }
}

#[async_trait]
impl Validator<ModelTraining> for TrainingValidator {
    #[instrument(skip(self, mt), fields(id = %mt.id, toolchain = %mt.spec.toolchain))]
    async fn validate_and_set_defaults(&self, mt: &mut ModelTraining) -> ResourceResult<()> {
        let mut violations = Violations::new();
        let spec = &mut mt.spec;

        validate_or_generate_id(
            &mut mt.id,
            &[spec.model.name.as_str(), spec.model.version.as_str()],
            "mt",
            &mut violations,
        );

        validate_label_field(&spec.model.name, "spec.model.name", &mut violations);
        validate_label_field(&spec.model.version, "spec.model.version", &mut violations);
        if spec.model.artifact_name_template.is_empty() {
            spec.model.artifact_name_template = DEFAULT_ARTIFACT_NAME_TEMPLATE.to_string();
            info!(
                template = DEFAULT_ARTIFACT_NAME_TEMPLATE,
                "artifact name template is empty, using the default"
            );
        }

        let toolchain = if spec.toolchain.is_empty() {
            violations.empty("spec.toolchain");
            None
        } else if let Err(message) = validate_label(&spec.toolchain) {
            violations.invalid("spec.toolchain", message);
            None
        } else {
            let found = lookup(self.toolchains.as_ref(), &spec.toolchain).await?;
            if found.is_none() {
                violations.not_found("spec.toolchain", &spec.toolchain);
            }
            found
        };

        if let Some(toolchain) = &toolchain {
            if spec.image.is_empty() {
                spec.image = toolchain.spec.default_image.clone();
                info!(image = %spec.image, "image is empty, using the toolchain default image");
            }

            violations.extend(validate_arguments(
                &toolchain.spec.schema.arguments,
                &spec.hyper_parameters,
                "spec.hyperParameters",
            ));
            resolve_targets(
                self.connections.as_ref(),
                toolchain,
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

        let pools = if requests_gpu(spec.resources.as_ref()) {
            &self.config.gpu_node_pools
        } else {
            &self.config.node_pools
        };
        validate_node_selector(&spec.node_selector, pools, &mut violations);

        violations.into_result(&mt.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodePool;
    use odahuflow_core::{
        ConnectionSpec, ConnectionType, IntegrationSpec, ModelIdentity, ModelTrainingSpec, Property,
        ResourceList, ResourceRequirements, Target, TargetSchema, ViolationKind,
    };
    use serde_json::json;

    async fn repositories() -> Repositories {
        let repos = Repositories::in_memory();

        for (id, kind) in [("models-output", ConnectionType::Gcs), ("sources", ConnectionType::Git)] {
            let mut conn = Connection::new(id, ConnectionSpec::new(kind, "uri"));
            repos.connections.create(&mut conn).await.unwrap();
        }

        let mut toolchain = ToolchainIntegration::new(
            "mlflow",
            IntegrationSpec {
                entrypoint: "/opt/mlflow/train".to_string(),
                default_image: "odahu/mlflow-toolchain:1.0".to_string(),
                ..IntegrationSpec::default()
            },
        );
        toolchain.spec.schema.targets =
            vec![TargetSchema::new("source", vec![ConnectionType::Git]).required()];
        toolchain.spec.schema.arguments.properties =
            vec![Property::new("alpha").with_parameter("type", json!("number"))];
        repos.toolchain_integrations.create(&mut toolchain).await.unwrap();

        repos
    }

    fn training() -> ModelTraining {
        let mut spec = ModelTrainingSpec {
            model: ModelIdentity {
                name: "wine".to_string(),
                version: "1.0".to_string(),
                artifact_name_template: String::new(),
            },
            toolchain: "mlflow".to_string(),
            output_connection: "models-output".to_string(),
            targets: vec![Target::new("source", "sources")],
            ..ModelTrainingSpec::default()
        };
        spec.hyper_parameters.insert("alpha".to_string(), json!(0.5));
        ModelTraining::new("wine-training", spec)
    }

    #[tokio::test]
    async fn test_valid_training_gets_defaults() {
        let repos = repositories().await;
        let mut mt = training();

        TrainingValidator::new(&repos, TrainingConfig::default())
            .validate_and_set_defaults(&mut mt)
            .await
            .unwrap();

        assert_eq!(mt.spec.image, "odahu/mlflow-toolchain:1.0");
        assert_eq!(mt.spec.model.artifact_name_template, DEFAULT_ARTIFACT_NAME_TEMPLATE);
        assert_eq!(mt.spec.resources, Some(crate::config::default_resources()));
    }

    #[tokio::test]
    async fn test_generated_id_uses_model_identity() {
        let repos = repositories().await;
        let mut mt = training();
        mt.id.clear();

        TrainingValidator::new(&repos, TrainingConfig::default())
            .validate_and_set_defaults(&mut mt)
            .await
            .unwrap();

        assert!(mt.id.starts_with("wine-1-0-"), "{}", mt.id);
    }

    #[tokio::test]
    async fn test_model_identity_and_toolchain_violations() {
        let repos = repositories().await;
        let mut mt = training();
        mt.spec.model.name.clear();
        mt.spec.model.version = "1.0 beta".to_string();
        mt.spec.toolchain.clear();

        let err = TrainingValidator::new(&repos, TrainingConfig::default())
            .validate_and_set_defaults(&mut mt)
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
                ("spec.model.name", ViolationKind::Empty),
                ("spec.model.version", ViolationKind::Invalid),
                ("spec.toolchain", ViolationKind::Empty),
            ]
        );
    }

    #[tokio::test]
    async fn test_hyper_parameters_and_targets_follow_the_toolchain() {
        let repos = repositories().await;
        let mut mt = training();
        mt.spec.hyper_parameters.insert("alpha".to_string(), json!("high"));
        mt.spec.targets.clear();

        let err = TrainingValidator::new(&repos, TrainingConfig::default())
            .validate_and_set_defaults(&mut mt)
            .await
            .unwrap_err();

        let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["spec.hyperParameters.alpha", "spec.targets"]);
    }

    #[tokio::test]
    async fn test_gpu_trainings_use_gpu_node_pools() {
        let repos = repositories().await;
        let config = TrainingConfig {
            node_pools: vec![NodePool::new([("mode", "cpu")])],
            gpu_node_pools: vec![NodePool::new([("mode", "gpu")])],
            ..TrainingConfig::default()
        };
        let validator = TrainingValidator::new(&repos, config);

        let mut mt = training();
        mt.spec.resources = Some(ResourceRequirements {
            requests: None,
            limits: Some(ResourceList {
                gpu: Some("1".to_string()),
                ..ResourceList::new("1", "1Gi")
            }),
        });
        mt.spec.node_selector.insert("mode".to_string(), "gpu".to_string());
        validator.validate_and_set_defaults(&mut mt).await.unwrap();

        let mut mt = training();
        mt.spec.node_selector.insert("mode".to_string(), "gpu".to_string());
        let err = validator.validate_and_set_defaults(&mut mt).await.unwrap_err();
        assert_eq!(err.violations()[0].field, "spec.nodeSelector");
    }
}
