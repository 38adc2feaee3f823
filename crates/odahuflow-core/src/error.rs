//! Error taxonomy shared by every repository backend and the validation engine
//!
//! Backend adapters translate their native failures into [`ResourceError`] at
//! the boundary. Anything an adapter cannot classify becomes
//! [`ResourceError::Unavailable`] and is surfaced to the caller, never retried.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category of a single field-level violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A mandatory value was empty and no default could be applied
    Empty,
    /// One or more required items are missing
    Required,
    /// A referenced entity does not exist
    NotFound,
    /// A value is not permitted in this position (unknown key, unknown target)
    NotAllowed,
    /// A value is present but malformed or out of range
    Invalid,
}

/// A single reason why an entity failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// Dotted path of the offending field, e.g. `spec.outputConnection`
    pub field: String,
    /// Violation category
    pub kind: ViolationKind,
    /// Human readable description
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn empty(field: impl Into<String>) -> Self {
        let field = field.into();
        let message = format!("empty {:?}", field);
        Self::new(field, ViolationKind::Empty, message)
    }

    pub fn not_found(field: impl Into<String>, entity: &str) -> Self {
        Self::new(
            field,
            ViolationKind::NotFound,
            format!("entity {:?} is not found", entity),
        )
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field, ViolationKind::Invalid, message)
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Uniform error kinds returned by repositories and validators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("entity {entity:?} is not found")]
    NotFound { entity: String },

    #[error("entity {entity:?} already exists")]
    AlreadyExists { entity: String },

    #[error("entity {entity:?} is invalid; errors: {}", join_violations(.violations))]
    Invalid {
        entity: String,
        violations: Vec<FieldViolation>,
    },

    #[error("access to entity {entity:?} is forbidden")]
    Forbidden { entity: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for repository and validation operations
pub type ResourceResult<T> = Result<T, ResourceError>;

impl ResourceError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn already_exists(entity: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
        }
    }

    pub fn unavailable(message: impl fmt::Display) -> Self {
        Self::Unavailable(message.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Violations carried by an `Invalid` error, empty for every other kind
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            Self::Invalid { violations, .. } => violations,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for ResourceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unavailable(format!("serialization failed: {}", err))
    }
}
