//! Repository contract over the in-memory object store

use chrono::Utc;
use secrecy::SecretString;
use std::collections::BTreeSet;

use odahuflow_core::{
    ConnectionFilter, ConnectionType, ListOptions, ModelRoute, ModelRouteSpec, Repository,
    ResourceError, SENSITIVE_DATA_MASK,
};
use odahuflow_db::Repositories;
use odahuflow_integration_tests::{connection, registry_with_credentials};
use odahuflow_service::{ConnectionConfig, ConnectionService};

const TOKEN: &str = "decrypt-me";

fn connection_service(repos: &Repositories) -> ConnectionService {
    let config = ConnectionConfig {
        decrypt_token: SecretString::new(TOKEN.to_string()),
    };
    ConnectionService::new(repos, &config)
}

#[tokio::test]
async fn test_round_trip_masked_and_decrypted() {
    let repos = Repositories::in_memory();
    let service = connection_service(&repos);
    let mut conn = registry_with_credentials("registry");
    service.create(&mut conn).await.unwrap();

    let decrypted = service.get_decrypted("registry", TOKEN).await.unwrap();
    assert_eq!(decrypted.spec, conn.spec);

    let masked = service.get("registry").await.unwrap();
    assert_eq!(masked.spec.password, SENSITIVE_DATA_MASK);
    let mut expected = conn.spec.clone();
    expected.password = SENSITIVE_DATA_MASK.to_string();
    assert_eq!(masked.spec, expected);
}

#[tokio::test]
async fn test_update_keeps_created_at_and_refreshes_updated_at() {
    let repos = Repositories::in_memory();
    let mut route = ModelRoute::new(
        "wine",
        ModelRouteSpec {
            url_prefix: "/custom/wine".to_string(),
            ..ModelRouteSpec::default()
        },
    );
    repos.routes.create(&mut route).await.unwrap();
    let created_at = route.status.modifiable.created_at;
    assert!(created_at.is_some());

    let requested_at = Utc::now();
    route.spec.url_prefix = "/custom/wine-v2".to_string();
    repos.routes.update(&mut route).await.unwrap();

    let fetched = repos.routes.get("wine").await.unwrap();
    assert_eq!(fetched.spec.url_prefix, "/custom/wine-v2");
    assert_eq!(fetched.status.modifiable.created_at, created_at);
    assert!(fetched.status.modifiable.updated_at.unwrap() >= requested_at);
}

#[tokio::test]
async fn test_update_of_missing_entity_is_not_found() {
    let repos = Repositories::in_memory();
    let mut conn = connection("ghost", ConnectionType::S3);
    let err = repos.connections.update(&mut conn).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_then_get_is_not_found() {
    let repos = Repositories::in_memory();
    repos
        .connections
        .create(&mut connection("storage", ConnectionType::S3))
        .await
        .unwrap();

    repos.connections.delete("storage").await.unwrap();

    let err = repos.connections.get("storage").await.unwrap_err();
    assert!(matches!(err, ResourceError::NotFound { ref entity } if entity == "storage"));
    assert!(repos.connections.delete("storage").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_duplicate_create_is_already_exists() {
    let repos = Repositories::in_memory();
    repos
        .connections
        .create(&mut connection("storage", ConnectionType::S3))
        .await
        .unwrap();

    let err = repos
        .connections
        .create(&mut connection("storage", ConnectionType::Gcs))
        .await
        .unwrap_err();
    assert!(err.is_already_exists());

    let kept = repos.connections.get("storage").await.unwrap();
    assert_eq!(kept.spec.connection_type, ConnectionType::S3);
}

#[tokio::test]
async fn test_pages_of_one_cover_every_item_once() {
    let repos = Repositories::in_memory();
    let ids: BTreeSet<String> = (0..5).map(|i| format!("storage-{}", i)).collect();
    for id in &ids {
        repos
            .connections
            .create(&mut connection(id, ConnectionType::S3))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    for page in 0..ids.len() {
        let items = repos
            .connections
            .list(ListOptions::new().page(page).size(1))
            .await
            .unwrap();
        assert_eq!(items.len(), 1, "page {}", page);
        seen.extend(items.into_iter().map(|conn| conn.id));
    }

    let unique: BTreeSet<String> = seen.iter().cloned().collect();
    assert_eq!(seen.len(), ids.len());
    assert_eq!(unique, ids);

    let past_the_end = repos
        .connections
        .list(ListOptions::new().page(ids.len()).size(1))
        .await
        .unwrap();
    assert!(past_the_end.is_empty());
}

#[tokio::test]
async fn test_zero_page_size_means_one_item_per_page() {
    let repos = Repositories::in_memory();
    for id in ["storage-a", "storage-b", "storage-c"] {
        repos
            .connections
            .create(&mut connection(id, ConnectionType::S3))
            .await
            .unwrap();
    }

    let options = ListOptions::<ConnectionFilter>::new().size(0);
    assert_eq!(options.page_size(), 1);

    for (page, expected) in ["storage-a", "storage-b", "storage-c"].into_iter().enumerate() {
        let items = repos
            .connections
            .list(options.clone().page(page))
            .await
            .unwrap();
        let ids: Vec<String> = items.into_iter().map(|conn| conn.id).collect();
        assert_eq!(ids, vec![expected.to_string()]);
    }

    let past_the_end = repos.connections.list(options.page(3)).await.unwrap();
    assert!(past_the_end.is_empty());
}

#[tokio::test]
async fn test_filter_values_are_or_ed() {
    let repos = Repositories::in_memory();
    for (id, kind) in [
        ("storage-a", ConnectionType::S3),
        ("storage-b", ConnectionType::Gcs),
        ("registry-c", ConnectionType::Docker),
    ] {
        repos
            .connections
            .create(&mut connection(id, kind))
            .await
            .unwrap();
    }

    let filter = ConnectionFilter {
        connection_type: vec!["s3".to_string(), "gcs".to_string()],
    };
    let found: BTreeSet<String> = repos
        .connections
        .list(ListOptions::new().filter(filter))
        .await
        .unwrap()
        .into_iter()
        .map(|conn| conn.id)
        .collect();

    assert_eq!(
        found,
        BTreeSet::from(["storage-a".to_string(), "storage-b".to_string()])
    );
}
