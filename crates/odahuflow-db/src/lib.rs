//! Storage backends for Odahu Flow resources
//!
//! Three adapters implement [`odahuflow_core::Repository`]:
//!
//! * [`crd::CrdRepository`]: Kubernetes custom resources, continuation-token
//!   pagination, label-selector filters, optimistic updates.
//! * [`relational::PostgresRepository`]: one JSONB table per kind,
//!   `LIMIT/OFFSET` pagination, `= ANY` filters.
//! * [`vault::VaultConnectionRepository`]: connections only, client-side
//!   filtering over a full key listing.
//!
//! [`backend::Repositories`] composes them from a [`config::StorageConfig`].

pub mod backend;
pub mod config;
pub mod crd;
pub mod error;
pub mod pagination;
pub mod relational;
pub mod vault;

pub use backend::{Backend, BackendError, BackendResult, Repositories};
pub use config::{BackendKind, DatabaseConfig, KubernetesConfig, StorageConfig, VaultConfig};
pub use crd::{CrdRepository, DeletionPropagation, InMemoryObjectStore, LabelSelector, ObjectStore};
pub use error::StoreError;
pub use relational::PostgresRepository;
pub use vault::VaultConnectionRepository;
