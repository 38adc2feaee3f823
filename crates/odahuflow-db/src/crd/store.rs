//! Native custom-resource client
//!
//! [`ObjectStore`] is the narrow surface the CRD repository needs from the
//! Kubernetes API: namespaced get/list/create/replace/delete of one custom
//! resource type, with continuation-token listing and resource versions.
//! [`KubeObjectStore`] talks to a real API server; the in-memory store in
//! [`super::memory`] implements the same contract for tests.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use odahuflow_core::Resource;

use super::selector::LabelSelector;
use crate::error::StoreError;
use crate::pagination::TokenPage;

/// API group of every Odahu Flow custom resource
pub const API_GROUP: &str = "odahuflow.odahu.org";
/// API version of every Odahu Flow custom resource
pub const API_VERSION: &str = "v1alpha1";

/// Identifies one custom resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceType {
    pub kind: &'static str,
    pub plural: &'static str,
}

impl ResourceType {
    pub fn of<R: Resource>() -> Self {
        Self {
            kind: R::KIND,
            plural: R::PLURAL,
        }
    }

    fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(API_GROUP, API_VERSION, self.kind);
        ApiResource::from_gvk_with_plural(&gvk, self.plural)
    }
}

/// Cascade policy applied when deleting objects that own children
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionPropagation {
    #[default]
    Foreground,
    Background,
    Orphan,
}

impl DeletionPropagation {
    fn delete_params(policy: Option<Self>) -> DeleteParams {
        match policy {
            Some(Self::Foreground) => DeleteParams::foreground(),
            Some(Self::Background) => DeleteParams::background(),
            Some(Self::Orphan) => DeleteParams::orphan(),
            None => DeleteParams::default(),
        }
    }
}

/// A custom-resource object reduced to what the repository layer reads
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    /// Object name, equal to the entity ID
    pub name: String,
    /// Revision token, `None` for objects not yet persisted
    pub resource_version: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub spec: Value,
    pub status: Value,
}

/// Parameters of one native list call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRequest {
    pub selector: LabelSelector,
    pub limit: usize,
    pub continue_token: Option<String>,
}

/// Native custom-resource client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, resource: ResourceType, name: &str) -> Result<StoredObject, StoreError>;

    async fn list(
        &self,
        resource: ResourceType,
        request: ListRequest,
    ) -> Result<TokenPage<StoredObject>, StoreError>;

    async fn create(
        &self,
        resource: ResourceType,
        object: StoredObject,
    ) -> Result<StoredObject, StoreError>;

    /// Replace an existing object. Fails with `Conflict` when
    /// `object.resource_version` no longer matches the stored one.
    async fn replace(
        &self,
        resource: ResourceType,
        object: StoredObject,
    ) -> Result<StoredObject, StoreError>;

    async fn delete(
        &self,
        resource: ResourceType,
        name: &str,
        propagation: Option<DeletionPropagation>,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// Kubernetes API server
// ============================================================================

/// [`ObjectStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeObjectStore {
    client: Client,
    namespace: String,
}

impl KubeObjectStore {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    fn api(&self, resource: ResourceType) -> (Api<DynamicObject>, ApiResource) {
        let ar = resource.api_resource();
        let api = Api::namespaced_with(self.client.clone(), &self.namespace, &ar);
        (api, ar)
    }

    fn to_dynamic(&self, ar: &ApiResource, object: StoredObject) -> DynamicObject {
        let mut dynamic = DynamicObject::new(&object.name, ar)
            .within(&self.namespace)
            .data(json!({ "spec": object.spec, "status": object.status }));
        dynamic.metadata.labels = Some(object.labels);
        dynamic.metadata.resource_version = object.resource_version;
        dynamic
    }
}

fn from_dynamic(object: DynamicObject) -> StoredObject {
    let DynamicObject { metadata, mut data, .. } = object;
    StoredObject {
        name: metadata.name.unwrap_or_default(),
        resource_version: metadata.resource_version,
        labels: metadata.labels.unwrap_or_default(),
        spec: data.get_mut("spec").map(Value::take).unwrap_or(Value::Null),
        status: data.get_mut("status").map(Value::take).unwrap_or(Value::Null),
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    #[instrument(skip(self), fields(kind = resource.kind))]
    async fn get(&self, resource: ResourceType, name: &str) -> Result<StoredObject, StoreError> {
        let (api, _) = self.api(resource);
        let object = api.get(name).await?;
        Ok(from_dynamic(object))
    }

    #[instrument(skip(self, request), fields(kind = resource.kind, selector = %request.selector))]
    async fn list(
        &self,
        resource: ResourceType,
        request: ListRequest,
    ) -> Result<TokenPage<StoredObject>, StoreError> {
        let (api, _) = self.api(resource);

        // The API server reads a zero limit as unlimited
        let limit = u32::try_from(request.limit.max(1)).unwrap_or(u32::MAX);
        let mut params = ListParams::default().limit(limit);
        if !request.selector.is_empty() {
            params = params.labels(&request.selector.to_string());
        }
        if let Some(token) = &request.continue_token {
            params = params.continue_token(token);
        }

        let list = api.list(&params).await?;
        debug!(items = list.items.len(), "listed custom resources");

        let items = list.items.into_iter().map(from_dynamic).collect();
        Ok(TokenPage::new(items, list.metadata.continue_))
    }

    #[instrument(skip(self, object), fields(kind = resource.kind, name = %object.name))]
    async fn create(
        &self,
        resource: ResourceType,
        object: StoredObject,
    ) -> Result<StoredObject, StoreError> {
        let (api, ar) = self.api(resource);
        let created = api
            .create(&PostParams::default(), &self.to_dynamic(&ar, object))
            .await?;
        Ok(from_dynamic(created))
    }

    #[instrument(skip(self, object), fields(kind = resource.kind, name = %object.name))]
    async fn replace(
        &self,
        resource: ResourceType,
        object: StoredObject,
    ) -> Result<StoredObject, StoreError> {
        let (api, ar) = self.api(resource);
        let name = object.name.clone();
        let replaced = api
            .replace(&name, &PostParams::default(), &self.to_dynamic(&ar, object))
            .await?;
        Ok(from_dynamic(replaced))
    }

    #[instrument(skip(self), fields(kind = resource.kind))]
    async fn delete(
        &self,
        resource: ResourceType,
        name: &str,
        propagation: Option<DeletionPropagation>,
    ) -> Result<(), StoreError> {
        let (api, _) = self.api(resource);
        api.delete(name, &DeletionPropagation::delete_params(propagation))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use odahuflow_core::{Connection, ModelRoute};

    #[test]
    fn test_resource_type_of() {
        let rt = ResourceType::of::<ModelRoute>();
        assert_eq!(rt.kind, "ModelRoute");
        assert_eq!(rt.plural, "modelroutes");

        let ar = ResourceType::of::<Connection>().api_resource();
        assert_eq!(ar.api_version, "odahuflow.odahu.org/v1alpha1");
        assert_eq!(ar.plural, "connections");
    }

    #[test]
    fn test_from_dynamic_splits_spec_and_status() {
        let ar = ResourceType::of::<Connection>().api_resource();
        let mut object = DynamicObject::new("git-repo", &ar).data(json!({
            "spec": {"type": "git", "uri": "git@github.com:odahu/odahu-examples.git"},
            "status": {"createdAt": "2020-01-01T00:00:00Z"}
        }));
        object.metadata.resource_version = Some("7".to_string());

        let stored = from_dynamic(object);
        assert_eq!(stored.name, "git-repo");
        assert_eq!(stored.resource_version.as_deref(), Some("7"));
        assert_eq!(stored.spec["type"], "git");
        assert_eq!(stored.status["createdAt"], "2020-01-01T00:00:00Z");
        assert!(stored.labels.is_empty());
    }

    #[test]
    fn test_delete_params_policy() {
        let params = DeletionPropagation::delete_params(Some(DeletionPropagation::Orphan));
        assert!(params.propagation_policy.is_some());
        assert!(DeletionPropagation::delete_params(None)
            .propagation_policy
            .is_none());
    }
}
