//! Validation and defaulting engine
//!
//! Each resource kind has a validator that checks an entity before it reaches
//! a repository and fills in defaults in place. Every independent check runs;
//! the violations are returned together as one `Invalid` error. Checks that
//! need a prior result, such as argument and target checks needing the
//! resolved integration, are skipped when that result is missing.
//!
//! References are resolved through the repositories. A missing referent is a
//! violation; any other repository failure aborts validation and is returned
//! as is.

pub mod arguments;
pub mod connection;
pub mod deployment;
pub mod id;
pub mod integration;
pub mod packaging;
pub mod quantity;
pub mod route;
pub mod targets;
pub mod training;
pub mod violations;

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::info;

use odahuflow_core::{Connection, Repository, Resource, ResourceRequirements, ResourceResult};

use crate::config::NodePool;
use violations::Violations;

pub use connection::ConnectionValidator;
pub use deployment::DeploymentValidator;
pub use integration::IntegrationValidator;
pub use packaging::PackagingValidator;
pub use route::RouteValidator;
pub use training::TrainingValidator;

/// Validates an entity of kind `R` and applies its defaults
#[async_trait]
pub trait Validator<R: Resource>: Send + Sync {
    /// Mutates `resource` in place; fails with an aggregate `Invalid` error
    async fn validate_and_set_defaults(&self, resource: &mut R) -> ResourceResult<()>;
}

/// `get` that maps `NotFound` to `None` and passes every other failure through
pub(crate) async fn lookup<R: Resource>(
    repository: &dyn Repository<R>,
    id: &str,
) -> ResourceResult<Option<R>> {
    match repository.get(id).await {
        Ok(resource) => Ok(Some(resource)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Check a present ID, or generate one from `hints` when it is empty
pub(crate) fn validate_or_generate_id(
    id: &mut String,
    hints: &[&str],
    fallback: &str,
    violations: &mut Violations,
) {
    if id.is_empty() {
        *id = id::generate_id(hints, fallback);
        info!(id = %id, "ID is empty, generated a default value");
        return;
    }
    if let Err(message) = id::validate_id(id) {
        violations.invalid("id", message);
    }
}

/// Explicit value first, then the configured default; the result must exist
pub(crate) async fn resolve_output_connection(
    connections: &dyn Repository<Connection>,
    output_connection: &mut String,
    default_connection: &str,
    violations: &mut Violations,
) -> ResourceResult<()> {
    const FIELD: &str = "spec.outputConnection";

    if output_connection.is_empty() {
        if default_connection.is_empty() {
            violations.empty(FIELD);
            return Ok(());
        }
        *output_connection = default_connection.to_string();
        info!(connection = %output_connection, "output connection is empty, using the configured default");
    }

    if lookup(connections, output_connection).await?.is_none() {
        violations.not_found(FIELD, output_connection);
    }
    Ok(())
}

/// Check quantities of present resources, or substitute the defaults
pub(crate) fn validate_or_default_resources(
    resources: &mut Option<ResourceRequirements>,
    defaults: &ResourceRequirements,
    violations: &mut Violations,
) {
    match resources {
        Some(resources) => violations.extend(quantity::validate_resources(resources, "spec.resources")),
        None => {
            info!(?defaults, "resources are not set, using the configured defaults");
            *resources = Some(defaults.clone());
        }
    }
}

/// A non-empty selector must equal one of the configured pools
pub(crate) fn validate_node_selector(
    selector: &BTreeMap<String, String>,
    pools: &[NodePool],
    violations: &mut Violations,
) {
    if selector.is_empty() || pools.iter().any(|pool| &pool.node_selector == selector) {
        return;
    }
    violations.not_allowed(
        "spec.nodeSelector",
        format!("node selector {:?} is not presented in the configured node pools", selector),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use odahuflow_core::{
        ConnectionFilter, ConnectionSpec, ConnectionType, ListOptions, ResourceError, ViolationKind,
    };
    use odahuflow_db::Repositories;

    mock! {
        pub ConnectionRepository {}

        #[async_trait]
        impl Repository<Connection> for ConnectionRepository {
            async fn get(&self, id: &str) -> ResourceResult<Connection>;
            async fn list(&self, options: ListOptions<ConnectionFilter>) -> ResourceResult<Vec<Connection>>;
            async fn create(&self, resource: &mut Connection) -> ResourceResult<()>;
            async fn update(&self, resource: &mut Connection) -> ResourceResult<()>;
            async fn delete(&self, id: &str) -> ResourceResult<()>;
        }
    }

    async fn with_connection(id: &str) -> Repositories {
        let repos = Repositories::in_memory();
        let mut conn = Connection::new(id, ConnectionSpec::new(ConnectionType::S3, "s3://models"));
        repos.connections.create(&mut conn).await.unwrap();
        repos
    }

    #[tokio::test]
    async fn test_explicit_output_connection_wins() {
        let repos = with_connection("explicit").await;
        let mut output = "explicit".to_string();
        let mut violations = Violations::new();

        resolve_output_connection(repos.connections.as_ref(), &mut output, "configured", &mut violations)
            .await
            .unwrap();

        assert_eq!(output, "explicit");
        assert!(violations.is_empty());
    }

    #[tokio::test]
    async fn test_configured_output_connection_is_used() {
        let repos = with_connection("configured").await;
        let mut output = String::new();
        let mut violations = Violations::new();

        resolve_output_connection(repos.connections.as_ref(), &mut output, "configured", &mut violations)
            .await
            .unwrap();

        assert_eq!(output, "configured");
        assert!(violations.is_empty());
    }

    #[tokio::test]
    async fn test_output_connection_empty_or_missing() {
        let repos = Repositories::in_memory();

        let mut output = String::new();
        let mut violations = Violations::new();
        resolve_output_connection(repos.connections.as_ref(), &mut output, "", &mut violations)
            .await
            .unwrap();
        let kinds: Vec<_> = violations.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, vec![ViolationKind::Empty]);

        let mut output = "nowhere".to_string();
        let mut violations = Violations::new();
        resolve_output_connection(repos.connections.as_ref(), &mut output, "", &mut violations)
            .await
            .unwrap();
        let kinds: Vec<_> = violations.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, vec![ViolationKind::NotFound]);
    }

    #[tokio::test]
    async fn test_backend_failures_abort_validation() {
        let mut repository = MockConnectionRepository::new();
        repository
            .expect_get()
            .returning(|_| Err(ResourceError::unavailable("connection refused")));

        let mut output = "explicit".to_string();
        let mut violations = Violations::new();
        let result =
            resolve_output_connection(&repository, &mut output, "", &mut violations).await;

        assert_eq!(result, Err(ResourceError::Unavailable("connection refused".to_string())));
        assert!(violations.is_empty());
    }

    #[test]
    fn test_node_selector_must_match_a_pool() {
        let pools = vec![NodePool::new([("mode", "packaging")])];
        let mut violations = Violations::new();

        validate_node_selector(&BTreeMap::new(), &pools, &mut violations);
        validate_node_selector(&pools[0].node_selector, &pools, &mut violations);
        assert!(violations.is_empty());

        let other = NodePool::new([("mode", "packaging"), ("zone", "a")]).node_selector;
        validate_node_selector(&other, &pools, &mut violations);
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_resources_default_or_checked() {
        let defaults = crate::config::default_resources();
        let mut violations = Violations::new();

        let mut resources = None;
        validate_or_default_resources(&mut resources, &defaults, &mut violations);
        assert_eq!(resources, Some(defaults.clone()));

        let mut resources = Some(ResourceRequirements {
            requests: Some(odahuflow_core::ResourceList::new("lots", "128Mi")),
            limits: None,
        });
        validate_or_default_resources(&mut resources, &defaults, &mut violations);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.iter().next().unwrap().field, "spec.resources.requests.cpu");
    }
}
