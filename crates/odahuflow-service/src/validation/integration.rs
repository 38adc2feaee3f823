//! Packaging and toolchain integration validation

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

use odahuflow_core::{
    Connection, Integration, PackagingIntegration, Repository, ResourceResult,
    ToolchainIntegration,
};
use odahuflow_db::Repositories;

use super::id::validate_id;
use super::lookup;
use super::violations::Violations;
use super::Validator;

/// Checks both integration kinds; they share one spec shape
pub struct IntegrationValidator {
    connections: Arc<dyn Repository<Connection>>,
}

impl IntegrationValidator {
    pub fn new(repositories: &Repositories) -> Self {
        Self {
            connections: repositories.connections.clone(),
        }
    }

    async fn validate<I: Integration>(&self, integration: &I) -> ResourceResult<()> {
        let mut violations = Violations::new();
        let spec = integration.spec();

        if let Err(message) = validate_id(integration.id()) {
            violations.invalid("id", message);
        }
        if spec.entrypoint.is_empty() {
            violations.empty("spec.entrypoint");
        }
        if spec.default_image.is_empty() {
            violations.empty("spec.defaultImage");
        }

        let mut names = HashSet::new();
        for (i, schema) in spec.schema.targets.iter().enumerate() {
            let path = format!("spec.schema.targets[{}]", i);

            if schema.name.is_empty() {
                violations.empty(format!("{}.name", path));
            } else if !names.insert(schema.name.as_str()) {
                violations.invalid(
                    format!("{}.name", path),
                    format!("target {} is declared more than once", schema.name),
                );
            }

            if schema.connection_types.is_empty() {
                violations.empty(format!("{}.connectionTypes", path));
            }

            if schema.default.is_empty() {
                continue;
            }
            let default_path = format!("{}.default", path);
            match lookup(self.connections.as_ref(), &schema.default).await? {
                None => violations.not_found(default_path, &schema.default),
                Some(connection) if !schema.connection_types.contains(&connection.spec.connection_type) => {
                    violations.invalid(
                        default_path,
                        format!(
                            "default connection {} has type {} which target {} does not accept",
                            connection.id, connection.spec.connection_type, schema.name
                        ),
                    )
                }
                Some(_) => {}
            }
        }

        for (i, property) in spec.schema.arguments.properties.iter().enumerate() {
            if property.name.is_empty() {
                violations.empty(format!("spec.schema.arguments.properties[{}].name", i));
            }
        }

        violations.into_result(integration.id())
    }
}

#[async_trait]
impl Validator<PackagingIntegration> for IntegrationValidator {
    #[instrument(skip(self, pi), fields(id = %pi.id))]
    async fn validate_and_set_defaults(&self, pi: &mut PackagingIntegration) -> ResourceResult<()> {
        self.validate(&*pi).await
    }
}

#[async_trait]
impl Validator<ToolchainIntegration> for IntegrationValidator {
    #[instrument(skip(self, ti), fields(id = %ti.id))]
    async fn validate_and_set_defaults(&self, ti: &mut ToolchainIntegration) -> ResourceResult<()> {
        self.validate(&*ti).await
    }
}
