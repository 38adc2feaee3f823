//! Odahu Flow core domain
//!
//! Resource kinds with the `{id, spec, status}` wire shape, the error taxonomy
//! shared by every backend, the declarative filter model, list options, and
//! the [`Repository`] contract that backend adapters implement.

pub mod error;
pub mod filter;
pub mod list;
pub mod model;
pub mod repository;

pub use error::{FieldViolation, ResourceError, ResourceResult, ViolationKind};
pub use filter::{Criterion, FilterField, NoFilter, ResourceFilter, WILDCARD};
pub use list::{ListOptions, FIRST_PAGE, MAX_PAGE_SIZE};
pub use model::*;
pub use repository::{Modifiable, Repository, Resource};
