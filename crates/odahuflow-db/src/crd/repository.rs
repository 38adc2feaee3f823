//! Repository over Kubernetes custom resources

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use odahuflow_core::{
    ListOptions, Modifiable, Repository, Resource, ResourceError, ResourceResult,
};

use super::selector::LabelSelector;
use super::store::{DeletionPropagation, ListRequest, ObjectStore, ResourceType, StoredObject};
use crate::error::StoreError;
use crate::pagination::walk_continuation;

/// Default number of re-reads after an update conflict
pub const DEFAULT_UPDATE_CONFLICT_RETRIES: u32 = 3;

/// [`Repository`] storing each entity as one custom-resource object named by
/// its ID
///
/// Filter fields are mirrored into object labels so that `list` pushes the
/// filter down as a label selector. Updates are optimistic: the resource
/// version read is sent back with the replace, and a conflicting concurrent
/// write triggers a bounded number of re-read attempts.
pub struct CrdRepository<R> {
    store: Arc<dyn ObjectStore>,
    propagation: DeletionPropagation,
    conflict_retries: u32,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> CrdRepository<R> {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            propagation: DeletionPropagation::default(),
            conflict_retries: DEFAULT_UPDATE_CONFLICT_RETRIES,
            _resource: PhantomData,
        }
    }

    /// Cascade policy used when `R` owns child objects
    pub fn with_propagation(mut self, propagation: DeletionPropagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    fn resource_type() -> ResourceType {
        ResourceType::of::<R>()
    }
}

/// Split an entity into the object the store persists
fn to_object<R: Resource>(resource: &R) -> ResourceResult<StoredObject> {
    let mut value = serde_json::to_value(resource)?;
    Ok(StoredObject {
        name: resource.id().to_string(),
        resource_version: None,
        labels: resource.labels(),
        spec: value.get_mut("spec").map(Value::take).unwrap_or(Value::Null),
        status: value.get_mut("status").map(Value::take).unwrap_or_else(|| json!({})),
    })
}

/// Rebuild an entity from a stored object
fn from_object<R: Resource>(object: StoredObject) -> ResourceResult<R> {
    let status = if object.status.is_null() {
        json!({})
    } else {
        object.status
    };
    let resource = serde_json::from_value(json!({
        "id": object.name,
        "spec": object.spec,
        "status": status,
    }))
    .map_err(|err| {
        ResourceError::unavailable(format!(
            "validation of {} {} is failed: {}",
            R::KIND,
            object.name,
            err
        ))
    })?;
    Ok(resource)
}

#[async_trait]
impl<R: Resource> Repository<R> for CrdRepository<R> {
    #[instrument(skip(self), fields(kind = R::KIND))]
    async fn get(&self, id: &str) -> ResourceResult<R> {
        let object = self
            .store
            .get(Self::resource_type(), id)
            .await
            .map_err(|err| err.into_resource_error(id))?;
        from_object(object)
    }

    #[instrument(skip(self, options), fields(kind = R::KIND, page = options.page_number(), size = options.page_size()))]
    async fn list(&self, options: ListOptions<R::Filter>) -> ResourceResult<Vec<R>> {
        let selector = LabelSelector::from_filter(options.active_filter());
        debug!(selector = %selector, "listing custom resources");

        let objects = walk_continuation(options.page_number(), |continue_token| {
            let request = ListRequest {
                selector: selector.clone(),
                limit: options.page_size(),
                continue_token,
            };
            async move {
                self.store
                    .list(Self::resource_type(), request)
                    .await
                    .map_err(|err| err.into_resource_error(R::PLURAL))
            }
        })
        .await?;

        objects.into_iter().map(from_object).collect()
    }

    #[instrument(skip(self, resource), fields(kind = R::KIND, id = resource.id()))]
    async fn create(&self, resource: &mut R) -> ResourceResult<()> {
        *resource.modifiable_mut() = Modifiable::created(Utc::now());

        let object = to_object(resource)?;
        let created = self
            .store
            .create(Self::resource_type(), object)
            .await
            .map_err(|err| err.into_resource_error(resource.id()))?;

        *resource = from_object(created)?;
        info!("custom resource created");
        Ok(())
    }

    #[instrument(skip(self, resource), fields(kind = R::KIND, id = resource.id()))]
    async fn update(&self, resource: &mut R) -> ResourceResult<()> {
        let id = resource.id().to_string();
        let incoming = to_object(resource)?;

        for attempt in 0..=self.conflict_retries {
            let current = self
                .store
                .get(Self::resource_type(), &id)
                .await
                .map_err(|err| err.into_resource_error(&id))?;

            let mut status = current.status;
            if !status.is_object() {
                status = json!({});
            }
            status["updatedAt"] = serde_json::to_value(Utc::now())?;

            let object = StoredObject {
                name: id.clone(),
                resource_version: current.resource_version,
                labels: incoming.labels.clone(),
                spec: incoming.spec.clone(),
                status,
            };

            match self.store.replace(Self::resource_type(), object).await {
                Ok(replaced) => {
                    *resource = from_object(replaced)?;
                    info!(attempt, "custom resource updated");
                    return Ok(());
                }
                Err(StoreError::Conflict) => {
                    warn!(attempt, "update conflict, re-reading custom resource");
                }
                Err(err) => return Err(err.into_resource_error(&id)),
            }
        }

        Err(ResourceError::unavailable(format!(
            "entity {:?} kept changing after {} retries",
            id, self.conflict_retries
        )))
    }

    #[instrument(skip(self), fields(kind = R::KIND))]
    async fn delete(&self, id: &str) -> ResourceResult<()> {
        let propagation = R::OWNS_CHILDREN.then_some(self.propagation);
        self.store
            .delete(Self::resource_type(), id, propagation)
            .await
            .map_err(|err| err.into_resource_error(id))?;
        info!(?propagation, "custom resource deleted");
        Ok(())
    }
}
