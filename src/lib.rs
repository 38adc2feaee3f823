//! Shared fixtures for the end-to-end tests
//!
//! Everything runs on [`Repositories::in_memory`], so the tests exercise the
//! CRD adapter, continuation-token pagination and label selectors without a
//! cluster.

use serde_json::json;

use odahuflow_core::{
    ArgumentsSchema, Connection, ConnectionSpec, ConnectionType, IntegrationSpec, ModelPackaging,
    ModelPackagingSpec, PackagingIntegration, Property, Repository, Target, TargetSchema,
};
use odahuflow_db::Repositories;
use odahuflow_service::{ApiConfig, Services};

pub const INTEGRATION: &str = "docker-rest";
/// Default connection of `target-1`
pub const DEFAULT_STORAGE: &str = "default-storage";
pub const OTHER_STORAGE: &str = "other-storage";
pub const REGISTRY: &str = "registry";
pub const OUTPUT: &str = "output-storage";

pub fn connection(id: &str, connection_type: ConnectionType) -> Connection {
    let uri = match connection_type {
        ConnectionType::S3 => "s3://models/output",
        ConnectionType::Gcs => "gs://models/output",
        ConnectionType::AzureBlob => "https://odahu.blob.core.windows.net/models",
        ConnectionType::Git => "git@github.com:odahu/odahu-examples.git",
        ConnectionType::Docker => "docker.io/odahu",
        ConnectionType::Ecr => "123456789012.dkr.ecr.eu-central-1.amazonaws.com/odahu",
    };
    Connection::new(id, ConnectionSpec::new(connection_type, uri))
}

/// Docker connection carrying credentials, for masked/decrypted reads
pub fn registry_with_credentials(id: &str) -> Connection {
    let mut conn = connection(id, ConnectionType::Docker);
    conn.spec.username = "odahu".to_string();
    conn.spec.password = "c2VjcmV0".to_string();
    conn
}

/// `target-1` is optional with a default, `target-2` is required without one,
/// `argument-1` is a required number not below 5
pub fn docker_rest_integration() -> PackagingIntegration {
    let mut spec = IntegrationSpec {
        entrypoint: "/usr/local/bin/odahu-flow-pack-to-rest".to_string(),
        default_image: "odahu/packager-docker-rest:1.0".to_string(),
        ..IntegrationSpec::default()
    };
    spec.schema.targets = vec![
        TargetSchema::new(
            "target-1",
            vec![ConnectionType::S3, ConnectionType::Gcs, ConnectionType::AzureBlob],
        )
        .with_default(DEFAULT_STORAGE),
        TargetSchema::new("target-2", vec![ConnectionType::Docker]).required(),
    ];
    spec.schema.arguments = ArgumentsSchema {
        properties: vec![Property::new("argument-1")
            .with_parameter("type", json!("number"))
            .with_parameter("minimum", json!(5))],
        required: vec!["argument-1".to_string()],
    };
    PackagingIntegration::new(INTEGRATION, spec)
}

/// In-memory repositories holding the integration and its connections
pub async fn seeded_repositories() -> Repositories {
    let repos = Repositories::in_memory();

    for mut conn in [
        connection(DEFAULT_STORAGE, ConnectionType::S3),
        connection(OTHER_STORAGE, ConnectionType::Gcs),
        connection(REGISTRY, ConnectionType::Docker),
        connection(OUTPUT, ConnectionType::S3),
    ] {
        repos
            .connections
            .create(&mut conn)
            .await
            .expect("seed connection");
    }

    repos
        .packaging_integrations
        .create(&mut docker_rest_integration())
        .await
        .expect("seed integration");

    repos
}

pub async fn seeded_services(config: &ApiConfig) -> Services {
    Services::with_repositories(seeded_repositories().await, config)
}

/// Packaging satisfying everything but the given targets
pub fn packaging(id: &str, targets: Vec<Target>) -> ModelPackaging {
    let mut arguments = serde_json::Map::new();
    arguments.insert("argument-1".to_string(), json!(10));

    ModelPackaging::new(
        id,
        ModelPackagingSpec {
            artifact_name: "wine-1.0.zip".to_string(),
            integration_name: INTEGRATION.to_string(),
            arguments,
            targets,
            output_connection: OUTPUT.to_string(),
            ..ModelPackagingSpec::default()
        },
    )
}
