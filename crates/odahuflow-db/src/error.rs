//! Native backend failures and their translation into [`ResourceError`]
//!
//! Every adapter funnels its client errors through this module so that
//! callers only ever see the shared taxonomy. Unclassified failures become
//! `Unavailable`.

use odahuflow_core::{FieldViolation, ResourceError};
use thiserror::Error;
use tracing::warn;

/// Failure reported by a custom-resource object store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,

    #[error("object already exists")]
    AlreadyExists,

    /// The stored resource version moved since the object was read
    #[error("object was modified concurrently")]
    Conflict,

    #[error("object rejected: {0}")]
    Invalid(String),

    #[error("access denied")]
    Forbidden,

    #[error("store failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Translate into the shared taxonomy for the object named `entity`
    pub fn into_resource_error(self, entity: &str) -> ResourceError {
        match self {
            Self::NotFound => ResourceError::not_found(entity),
            Self::AlreadyExists => ResourceError::already_exists(entity),
            Self::Forbidden => ResourceError::Forbidden {
                entity: entity.to_string(),
            },
            Self::Invalid(message) => ResourceError::Invalid {
                entity: entity.to_string(),
                violations: vec![FieldViolation::invalid("spec", message)],
            },
            Self::Conflict => {
                warn!(entity, "unresolved update conflict");
                ResourceError::unavailable(format!("entity {:?} was modified concurrently", entity))
            }
            Self::Backend(message) => {
                warn!(entity, error = %message, "object store failure");
                ResourceError::Unavailable(message)
            }
        }
    }
}

impl From<kube::Error> for StoreError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => match response.code {
                404 => Self::NotFound,
                409 if response.reason == "AlreadyExists" => Self::AlreadyExists,
                409 => Self::Conflict,
                422 => Self::Invalid(response.message),
                401 | 403 => Self::Forbidden,
                _ => Self::Backend(response.message),
            },
            other => Self::Backend(other.to_string()),
        }
    }
}

/// PostgreSQL error code for unique constraint violations
pub const PG_UNIQUE_VIOLATION: &str = "23505";

/// Translate a sqlx failure for the row identified by `entity`
pub fn translate_sqlx_error(err: sqlx::Error, entity: &str) -> ResourceError {
    match err {
        sqlx::Error::RowNotFound => ResourceError::not_found(entity),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(PG_UNIQUE_VIOLATION) => {
            ResourceError::already_exists(entity)
        }
        other => {
            warn!(entity, error = %other, "database failure");
            ResourceError::unavailable(other)
        }
    }
}

/// Translate a non-success Vault HTTP status for `entity`
pub fn translate_vault_status(status: reqwest::StatusCode, entity: &str) -> ResourceError {
    match status {
        reqwest::StatusCode::NOT_FOUND => ResourceError::not_found(entity),
        reqwest::StatusCode::FORBIDDEN => ResourceError::Forbidden {
            entity: entity.to_string(),
        },
        other => {
            warn!(entity, status = %other, "vault request failed");
            ResourceError::unavailable(format!("vault responded with {}", other))
        }
    }
}

/// Translate a Vault transport failure
pub fn translate_reqwest_error(err: reqwest::Error, entity: &str) -> ResourceError {
    match err.status() {
        Some(status) => translate_vault_status(status, entity),
        None => {
            warn!(entity, error = %err, "vault unreachable");
            ResourceError::unavailable(err)
        }
    }
}
