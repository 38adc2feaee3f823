//! Kubernetes custom-resource backend

pub mod memory;
pub mod repository;
pub mod selector;
pub mod store;

pub use memory::InMemoryObjectStore;
pub use repository::{CrdRepository, DEFAULT_UPDATE_CONFLICT_RETRIES};
pub use selector::{LabelSelector, Requirement};
pub use store::{
    DeletionPropagation, KubeObjectStore, ListRequest, ObjectStore, ResourceType, StoredObject,
    API_GROUP, API_VERSION,
};
