//! Connection read views
//!
//! Reads are masked by default. The decrypted view returns secrets intact
//! and is only served to callers presenting the configured capability token.

use ring::constant_time;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use odahuflow_core::{
    Connection, ConnectionFilter, ListOptions, Repository, ResourceError, ResourceResult,
};
use odahuflow_db::Repositories;

use crate::config::ConnectionConfig;
use crate::validation::{ConnectionValidator, Validator};

/// Validated writes and masked or decrypted reads of connections
pub struct ConnectionService {
    repository: Arc<dyn Repository<Connection>>,
    validator: ConnectionValidator,
    decrypt_token: SecretString,
}

impl ConnectionService {
    pub fn new(repositories: &Repositories, config: &ConnectionConfig) -> Self {
        Self {
            repository: repositories.connections.clone(),
            validator: ConnectionValidator::new(),
            decrypt_token: config.decrypt_token.clone(),
        }
    }

    /// Constant-time check of `token` against the configured one; an empty
    /// configured token matches nothing
    fn token_matches(&self, token: &str) -> bool {
        let expected = self.decrypt_token.expose_secret();
        !expected.is_empty()
            && constant_time::verify_slices_are_equal(expected.as_bytes(), token.as_bytes()).is_ok()
    }

    /// Connection with secrets replaced by a mask
    pub async fn get(&self, id: &str) -> ResourceResult<Connection> {
        Ok(self.repository.get(id).await?.masked())
    }

    /// Connection with secrets intact; requires the capability token
    #[instrument(skip(self, token))]
    pub async fn get_decrypted(&self, id: &str, token: &str) -> ResourceResult<Connection> {
        if !self.token_matches(token) {
            warn!("decrypted connection read rejected");
            return Err(ResourceError::Forbidden {
                entity: id.to_string(),
            });
        }
        self.repository.get(id).await
    }

    pub async fn list(&self, options: ListOptions<ConnectionFilter>) -> ResourceResult<Vec<Connection>> {
        let connections = self.repository.list(options).await?;
        Ok(connections.into_iter().map(Connection::masked).collect())
    }

    #[instrument(skip(self, connection), fields(id = %connection.id))]
    pub async fn create(&self, connection: &mut Connection) -> ResourceResult<()> {
        self.validator.validate_and_set_defaults(connection).await?;
        self.repository.create(connection).await?;
        info!("connection created");
        Ok(())
    }

    #[instrument(skip(self, connection), fields(id = %connection.id))]
    pub async fn update(&self, connection: &mut Connection) -> ResourceResult<()> {
        self.validator.validate_and_set_defaults(connection).await?;
        self.repository.update(connection).await?;
        info!("connection updated");
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> ResourceResult<()> {
        self.repository.delete(id).await
    }
}
