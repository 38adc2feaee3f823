//! Resource abstraction and the backend-agnostic repository contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::error::ResourceResult;
use crate::filter::ResourceFilter;
use crate::list::ListOptions;

/// Creation and modification timestamps kept in every status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifiable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Modifiable {
    /// Stamp a freshly created entity
    pub fn created(now: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// A managed entity with the wire shape `{id, spec, status}`
///
/// Backends store `spec` and `status` as JSON documents, so the serialized
/// form of an implementor must be an object with exactly those three keys.
pub trait Resource: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Filter accepted by `Repository::list` for this kind
    type Filter: ResourceFilter;

    /// Custom resource kind, e.g. `ModelRoute`
    const KIND: &'static str;
    /// Custom resource plural name, e.g. `modelroutes`
    const PLURAL: &'static str;
    /// Relational table name
    const TABLE: &'static str;
    /// Whether deleting this kind cascades to child objects
    const OWNS_CHILDREN: bool = false;

    fn id(&self) -> &str;

    fn modifiable(&self) -> &Modifiable;

    fn modifiable_mut(&mut self) -> &mut Modifiable;

    /// Labels derived from the spec, keyed like [`ResourceFilter::FIELDS`]
    fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Create/read/update/delete/list contract implemented by every backend
///
/// * `create` fails with `AlreadyExists` when the ID is taken and stamps
///   `createdAt`/`updatedAt`.
/// * `update` replaces the spec wholesale, keeps `createdAt`, refreshes
///   `updatedAt`, and fails with `NotFound` when absent.
/// * `get` and `delete` fail with `NotFound` when absent.
/// * `list` gives no snapshot isolation: writes between the backend calls
///   that assemble pages may move items across page boundaries.
#[async_trait]
pub trait Repository<R: Resource>: Send + Sync {
    async fn get(&self, id: &str) -> ResourceResult<R>;

    async fn list(&self, options: ListOptions<R::Filter>) -> ResourceResult<Vec<R>>;

    async fn create(&self, resource: &mut R) -> ResourceResult<()>;

    async fn update(&self, resource: &mut R) -> ResourceResult<()>;

    async fn delete(&self, id: &str) -> ResourceResult<()>;
}
