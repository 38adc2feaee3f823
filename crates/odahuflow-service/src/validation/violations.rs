//! Accumulator for field violations

use odahuflow_core::{FieldViolation, ResourceError, ResourceResult, ViolationKind};
use tracing::debug;

/// Every violation found while validating one entity
///
/// Checks push into it instead of returning early, so a single `Invalid`
/// error lists all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations {
    items: Vec<FieldViolation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: FieldViolation) {
        self.items.push(violation);
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = FieldViolation>) {
        self.items.extend(violations);
    }

    pub fn empty(&mut self, field: impl Into<String>) {
        self.push(FieldViolation::empty(field));
    }

    pub fn invalid(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(FieldViolation::invalid(field, message));
    }

    pub fn not_allowed(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(FieldViolation::new(field, ViolationKind::NotAllowed, message));
    }

    pub fn required(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(FieldViolation::new(field, ViolationKind::Required, message));
    }

    pub fn not_found(&mut self, field: impl Into<String>, entity: &str) {
        self.push(FieldViolation::not_found(field, entity));
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldViolation> {
        self.items.iter()
    }

    /// `Ok` when nothing was found, otherwise one aggregate `Invalid` error
    pub fn into_result(self, entity: &str) -> ResourceResult<()> {
        if self.items.is_empty() {
            return Ok(());
        }

        debug!(entity, count = self.items.len(), "validation failed");
        Err(ResourceError::Invalid {
            entity: entity.to_string(),
            violations: self.items,
        })
    }
}

impl IntoIterator for Violations {
    type Item = FieldViolation;
    type IntoIter = std::vec::IntoIter<FieldViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
