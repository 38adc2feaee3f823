//! Model route validation

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

use odahuflow_core::{ModelDeployment, ModelRoute, Repository, ResourceResult};
use odahuflow_db::Repositories;

use super::violations::Violations;
use super::id::validate_id;
use super::{lookup, Validator};

/// Prefixes served by the platform itself
pub const RESERVED_URL_PREFIXES: [&str; 2] = ["/model", "/feedback"];

/// Total weight of the targets of a route
pub const TOTAL_WEIGHT: i32 = 100;

/// Checks routes and the deployments they send traffic to
pub struct RouteValidator {
    deployments: Arc<dyn Repository<ModelDeployment>>,
}

impl RouteValidator {
    pub fn new(repositories: &Repositories) -> Self {
        Self {
            deployments: repositories.deployments.clone(),
        }
    }

    fn validate_url_prefix(prefix: &str, violations: &mut Violations) {
        const FIELD: &str = "spec.urlPrefix";

        if prefix.is_empty() {
            violations.empty(FIELD);
        } else if !prefix.starts_with('/') {
            violations.invalid(FIELD, "the URL prefix must start with slash");
        } else if let Some(reserved) = RESERVED_URL_PREFIXES
            .iter()
            .find(|reserved| prefix.starts_with(*reserved))
        {
            violations.not_allowed(FIELD, format!("the URL prefix {} is forbidden", reserved));
        }
    }

    fn validate_weights(route: &mut ModelRoute, violations: &mut Violations) {
        const FIELD: &str = "spec.modelDeployments";
        let targets = &mut route.spec.model_deployment_targets;

        match targets.as_mut_slice() {
            [] => violations.required(FIELD, "model deployment targets must contain at least one element"),
            [single] => match single.weight {
                None => {
                    info!(deployment = %single.md_name, "weight of the single target is empty, using 100");
                    single.weight = Some(TOTAL_WEIGHT);
                }
                Some(TOTAL_WEIGHT) => {}
                Some(_) => violations.invalid(
                    format!("{}[0].weight", FIELD),
                    "it must have 100 weight or nil value if there is only one target",
                ),
            },
            many => {
                // i32 weights can overflow an i32 sum
                let mut total: i64 = 0;
                let mut missing = false;
                for target in many.iter() {
                    match target.weight {
                        Some(weight) => total += i64::from(weight),
                        None => missing = true,
                    }
                }

                if missing {
                    violations.required(
                        FIELD,
                        "weights must be present if there are more than one model deployment targets",
                    );
                } else if total != i64::from(TOTAL_WEIGHT) {
                    violations.invalid(FIELD, "total target weight does not equal 100");
                }
            }
        }
    }
}

#[async_trait]
impl Validator<ModelRoute> for RouteValidator {
    #[instrument(skip(self, route), fields(id = %route.id))]
    async fn validate_and_set_defaults(&self, route: &mut ModelRoute) -> ResourceResult<()> {
        let mut violations = Violations::new();

        if let Err(message) = validate_id(&route.id) {
            violations.invalid("id", message);
        }

        Self::validate_url_prefix(&route.spec.url_prefix, &mut violations);

        if let Some(mirror) = route.spec.mirror.as_deref().filter(|mirror| !mirror.is_empty()) {
            if lookup(self.deployments.as_ref(), mirror).await?.is_none() {
                violations.not_found("spec.mirror", mirror);
            }
        }

        Self::validate_weights(route, &mut violations);

        for (i, target) in route.spec.model_deployment_targets.iter().enumerate() {
            let field = format!("spec.modelDeployments[{}].mdName", i);
            if target.md_name.is_empty() {
                violations.empty(field);
            } else if lookup(self.deployments.as_ref(), &target.md_name).await?.is_none() {
                violations.not_found(field, &target.md_name);
            }
        }

        violations.into_result(&route.id)
    }
}
