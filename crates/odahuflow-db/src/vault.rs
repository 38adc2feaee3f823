//! Vault-backed connection repository
//!
//! Each connection lives in its own KV secret under the configured engine
//! path, serialized whole under [`CONNECTION_KEY`]. Vault offers no server
//! side predicates, so `list` enumerates every key, reads each secret, filters
//! on the client and only then cuts out the requested page.

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument};

use odahuflow_core::{
    Connection, ConnectionFilter, ListOptions, Modifiable, Repository, Resource, ResourceError,
    ResourceFilter, ResourceResult,
};

use crate::config::VaultConfig;
use crate::error::{translate_reqwest_error, translate_vault_status};
use crate::pagination::slice_page;

/// Key of the secret entry holding the serialized connection
pub const CONNECTION_KEY: &str = "odahuflow_conn";

const TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Debug, Deserialize)]
struct SecretResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct KeyList {
    #[serde(default)]
    keys: Vec<String>,
}

/// [`Repository`] of connections stored in Vault
#[derive(Clone)]
pub struct VaultConnectionRepository {
    client: Client,
    base_url: String,
    token: SecretString,
    engine_path: String,
}

impl VaultConnectionRepository {
    pub fn new(config: &VaultConfig) -> ResourceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ResourceError::unavailable)?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            engine_path: config.secret_engine_path.trim_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, id: Option<&str>) -> RequestBuilder {
        let url = match id {
            Some(id) => format!("{}/v1/{}/{}", self.base_url, self.engine_path, id),
            None => format!("{}/v1/{}", self.base_url, self.engine_path),
        };
        self.client
            .request(method, url)
            .header(TOKEN_HEADER, self.token.expose_secret())
    }

    async fn read(&self, id: &str) -> ResourceResult<Connection> {
        let response = self
            .request(Method::GET, Some(id))
            .send()
            .await
            .map_err(|err| translate_reqwest_error(err, id))?;
        if !response.status().is_success() {
            return Err(translate_vault_status(response.status(), id));
        }

        let mut secret: SecretResponse<serde_json::Map<String, serde_json::Value>> = response
            .json()
            .await
            .map_err(|err| translate_reqwest_error(err, id))?;
        let Some(payload) = secret.data.remove(CONNECTION_KEY) else {
            return Err(ResourceError::not_found(id));
        };

        serde_json::from_value(payload).map_err(|err| {
            ResourceError::unavailable(format!("validation of Connection {} is failed: {}", id, err))
        })
    }

    async fn write(&self, connection: &Connection) -> ResourceResult<()> {
        let id = connection.id();
        let response = self
            .request(Method::POST, Some(id))
            .json(&json!({ CONNECTION_KEY: connection }))
            .send()
            .await
            .map_err(|err| translate_reqwest_error(err, id))?;
        if !response.status().is_success() {
            return Err(translate_vault_status(response.status(), id));
        }
        Ok(())
    }

    async fn keys(&self) -> ResourceResult<Vec<String>> {
        let response = self
            .request(Method::GET, None)
            .query(&[("list", "true")])
            .send()
            .await
            .map_err(|err| translate_reqwest_error(err, &self.engine_path))?;

        match response.status() {
            // An engine path with no secrets yet
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                let list: SecretResponse<KeyList> = response
                    .json()
                    .await
                    .map_err(|err| translate_reqwest_error(err, &self.engine_path))?;
                let mut keys = list.data.keys;
                keys.sort();
                Ok(keys)
            }
            status => Err(translate_vault_status(status, &self.engine_path)),
        }
    }
}

#[async_trait]
impl Repository<Connection> for VaultConnectionRepository {
    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> ResourceResult<Connection> {
        self.read(id).await
    }

    #[instrument(skip(self, options), fields(page = options.page_number(), size = options.page_size()))]
    async fn list(&self, options: ListOptions<ConnectionFilter>) -> ResourceResult<Vec<Connection>> {
        let keys = self.keys().await?;
        debug!(keys = keys.len(), "enumerated vault secrets");

        let filter = options.active_filter();
        let connections: BoxStream<'_, ResourceResult<Connection>> = stream::iter(keys)
            .then(move |id| async move { self.read(&id).await })
            .boxed();
        let matching: Vec<Connection> = connections
            .try_filter(|connection| {
                let keep = filter.matches(&connection.labels());
                async move { keep }
            })
            .try_collect()
            .await?;

        Ok(slice_page(matching, &options))
    }

    #[instrument(skip(self, connection), fields(id = connection.id()))]
    async fn create(&self, connection: &mut Connection) -> ResourceResult<()> {
        match self.read(connection.id()).await {
            Ok(_) => return Err(ResourceError::already_exists(connection.id())),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        *connection.modifiable_mut() = Modifiable::created(Utc::now());
        self.write(connection).await?;
        info!("connection stored in vault");
        Ok(())
    }

    #[instrument(skip(self, connection), fields(id = connection.id()))]
    async fn update(&self, connection: &mut Connection) -> ResourceResult<()> {
        let current = self.read(connection.id()).await?;

        connection.status = current.status;
        connection.modifiable_mut().updated_at = Some(Utc::now());
        self.write(connection).await?;
        info!("connection updated in vault");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> ResourceResult<()> {
        self.read(id).await?;

        let response = self
            .request(Method::DELETE, Some(id))
            .send()
            .await
            .map_err(|err| translate_reqwest_error(err, id))?;
        if !response.status().is_success() {
            return Err(translate_vault_status(response.status(), id));
        }
        info!("connection deleted from vault");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odahuflow_core::{ConnectionSpec, ConnectionType};
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENGINE: &str = "/v1/odahu-flow/connections";

    fn repository(server: &MockServer) -> VaultConnectionRepository {
        let config = VaultConfig {
            url: server.uri(),
            token: SecretString::new("root-token".to_string()),
            ..VaultConfig::default()
        };
        VaultConnectionRepository::new(&config).unwrap()
    }

    fn connection(id: &str, conn_type: &str) -> serde_json::Value {
        json!({
            "id": id,
            "spec": {"type": conn_type, "uri": format!("uri://{}", id)},
            "status": {"createdAt": "2020-01-01T00:00:00Z"}
        })
    }

    async fn mount_secret(server: &MockServer, id: &str, conn_type: &str) {
        Mock::given(method("GET"))
            .and(path(format!("{}/{}", ENGINE, id)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {CONNECTION_KEY: connection(id, conn_type)}})),
            )
            .mount(server)
            .await;
    }

    async fn mount_missing(server: &MockServer, id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("{}/{}", ENGINE, id)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_sends_token_and_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/docker-hub", ENGINE)))
            .and(header(TOKEN_HEADER, "root-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"data": {CONNECTION_KEY: connection("docker-hub", "docker")}}),
            ))
            .mount(&server)
            .await;

        let conn = repository(&server).get("docker-hub").await.unwrap();
        assert_eq!(conn.spec.connection_type, ConnectionType::Docker);
        assert!(conn.status.modifiable.created_at.is_some());
    }

    #[tokio::test]
    async fn test_get_missing_and_forbidden() {
        let server = MockServer::start().await;
        mount_missing(&server, "ghost").await;
        Mock::given(method("GET"))
            .and(path(format!("{}/secret", ENGINE)))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let repo = repository(&server);
        assert!(repo.get("ghost").await.unwrap_err().is_not_found());
        assert!(matches!(
            repo.get("secret").await.unwrap_err(),
            ResourceError::Forbidden { .. }
        ));
    }

    #[tokio::test]
    async fn test_list_filters_before_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ENGINE))
            .and(query_param("list", "true"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"keys": ["d", "c", "b", "a"]}})),
            )
            .mount(&server)
            .await;
        for (id, conn_type) in [("a", "git"), ("b", "s3"), ("c", "git"), ("d", "gcs")] {
            mount_secret(&server, id, conn_type).await;
        }

        let repo = repository(&server);
        let filter = ConnectionFilter::from_query([("type", "s3"), ("type", "gcs")]);

        let first = repo
            .list(ListOptions::new().filter(filter.clone()).size(1))
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "b");

        let second = repo
            .list(ListOptions::new().filter(filter.clone()).page(1).size(1))
            .await
            .unwrap();
        assert_eq!(second[0].id, "d");

        let past_end = repo
            .list(ListOptions::new().filter(filter).page(2).size(1))
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_list_empty_engine() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ENGINE))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(repository(&server).list(ListOptions::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_writes_stamped_connection() {
        let server = MockServer::start().await;
        mount_missing(&server, "new-repo").await;
        Mock::given(method("POST"))
            .and(path(format!("{}/new-repo", ENGINE)))
            .and(body_partial_json(json!({CONNECTION_KEY: {"id": "new-repo", "spec": {"type": "git"}}})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut conn = Connection::new("new-repo", ConnectionSpec::new(ConnectionType::Git, "git@host:r.git"));
        repository(&server).create(&mut conn).await.unwrap();
        assert!(conn.status.modifiable.created_at.is_some());
    }

    #[tokio::test]
    async fn test_create_existing_is_rejected() {
        let server = MockServer::start().await;
        mount_secret(&server, "taken", "git").await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let mut conn = Connection::new("taken", ConnectionSpec::new(ConnectionType::Git, "git@host:r.git"));
        let err = repository(&server).create(&mut conn).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let server = MockServer::start().await;
        mount_secret(&server, "repo", "git").await;
        Mock::given(method("POST"))
            .and(path(format!("{}/repo", ENGINE)))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut conn = Connection::new("repo", ConnectionSpec::new(ConnectionType::Git, "git@host:new.git"));
        let before = Utc::now();
        repository(&server).update(&mut conn).await.unwrap();

        let created_at = conn.status.modifiable.created_at.unwrap();
        assert_eq!(created_at.to_rfc3339(), "2020-01-01T00:00:00+00:00");
        assert!(conn.status.modifiable.updated_at.unwrap() >= before);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let server = MockServer::start().await;
        mount_missing(&server, "ghost").await;

        let repo = repository(&server);
        let mut conn = Connection::new("ghost", ConnectionSpec::new(ConnectionType::S3, "s3://b"));
        assert!(repo.update(&mut conn).await.unwrap_err().is_not_found());
        assert!(repo.delete("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete() {
        let server = MockServer::start().await;
        mount_secret(&server, "repo", "git").await;
        Mock::given(method("DELETE"))
            .and(path(format!("{}/repo", ENGINE)))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        repository(&server).delete("repo").await.unwrap();
    }
}
