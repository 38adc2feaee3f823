//! In-process object store
//!
//! Behaves like a namespaced API server for the calls [`ObjectStore`] makes:
//! objects are listed in name order, chunks carry real continuation tokens,
//! and every write bumps a store-wide resource version so stale replaces are
//! rejected with `Conflict`.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tokio::sync::RwLock;
use tracing::debug;

use super::store::{DeletionPropagation, ListRequest, ObjectStore, ResourceType, StoredObject};
use crate::error::StoreError;
use crate::pagination::TokenPage;

#[derive(Debug, Default)]
struct State {
    revision: u64,
    objects: HashMap<&'static str, BTreeMap<String, StoredObject>>,
}

impl State {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }
}

/// [`ObjectStore`] keeping every object in memory
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    state: RwLock<State>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects of one type
    pub async fn len(&self, resource: ResourceType) -> usize {
        self.state
            .read()
            .await
            .objects
            .get(resource.plural)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, resource: ResourceType, name: &str) -> Result<StoredObject, StoreError> {
        self.state
            .read()
            .await
            .objects
            .get(resource.plural)
            .and_then(|objects| objects.get(name))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(
        &self,
        resource: ResourceType,
        request: ListRequest,
    ) -> Result<TokenPage<StoredObject>, StoreError> {
        let state = self.state.read().await;
        let Some(objects) = state.objects.get(resource.plural) else {
            return Ok(TokenPage::new(Vec::new(), None));
        };

        let lower = match &request.continue_token {
            Some(token) => Bound::Excluded(token.as_str()),
            None => Bound::Unbounded,
        };

        let limit = request.limit.max(1);
        let mut matching = objects
            .range::<str, _>((lower, Bound::Unbounded))
            .map(|(_, object)| object)
            .filter(|object| request.selector.matches(&object.labels));

        let items: Vec<StoredObject> = matching.by_ref().take(limit).cloned().collect();
        let has_more = matching.next().is_some();
        let continue_token = if has_more {
            items.last().map(|object| object.name.clone())
        } else {
            None
        };

        debug!(kind = resource.kind, items = items.len(), has_more, "listed in-memory objects");
        Ok(TokenPage::new(items, continue_token))
    }

    async fn create(
        &self,
        resource: ResourceType,
        mut object: StoredObject,
    ) -> Result<StoredObject, StoreError> {
        let mut state = self.state.write().await;
        if state
            .objects
            .get(resource.plural)
            .is_some_and(|objects| objects.contains_key(&object.name))
        {
            return Err(StoreError::AlreadyExists);
        }

        object.resource_version = Some(state.next_revision());
        state
            .objects
            .entry(resource.plural)
            .or_default()
            .insert(object.name.clone(), object.clone());
        Ok(object)
    }

    async fn replace(
        &self,
        resource: ResourceType,
        mut object: StoredObject,
    ) -> Result<StoredObject, StoreError> {
        let mut state = self.state.write().await;
        let current_version = state
            .objects
            .get(resource.plural)
            .and_then(|objects| objects.get(&object.name))
            .map(|stored| stored.resource_version.clone())
            .ok_or(StoreError::NotFound)?;

        if object.resource_version.is_some() && object.resource_version != current_version {
            return Err(StoreError::Conflict);
        }

        object.resource_version = Some(state.next_revision());
        state
            .objects
            .entry(resource.plural)
            .or_default()
            .insert(object.name.clone(), object.clone());
        Ok(object)
    }

    async fn delete(
        &self,
        resource: ResourceType,
        name: &str,
        _propagation: Option<DeletionPropagation>,
    ) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .objects
            .get_mut(resource.plural)
            .and_then(|objects| objects.remove(name))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
