//! Model deployments and the routes that split traffic between them

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::filter::{FilterField, ResourceFilter};
use crate::model::common::ResourceRequirements;
use crate::repository::{Modifiable, Resource};

/// Desired state of a served model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDeploymentSpec {
    /// Packaged model image
    pub image: String,
    /// Inference protocol the image speaks
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub predictor: String,
    /// Lower autoscaling bound, defaults to 0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,
    /// Upper autoscaling bound, defaults to `max(min_replicas, 1)`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
    /// Container requests and limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Role allowed to call the model, a Kubernetes label value
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role_name: String,
    /// Connection used to pull `image`, must be a registry connection
    #[serde(default, rename = "imagePullConnID", skip_serializing_if = "String::is_empty")]
    pub image_pull_conn_id: String,
    /// Must match one of the configured node pools when set
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
}

/// Observed state, maintained by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDeploymentStatus {
    /// Lifecycle state such as `Processing` or `Ready`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    /// In-cluster URL of the model service
    #[serde(default, rename = "serviceURL", skip_serializing_if = "String::is_empty")]
    pub service_url: String,
    #[serde(default)]
    pub available_replicas: i32,
    #[serde(flatten)]
    pub modifiable: Modifiable,
}

/// A trained, packaged model served behind an autoscaled service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDeployment {
    /// Unique within the namespace; the custom resource name
    pub id: String,
    pub spec: ModelDeploymentSpec,
    #[serde(default)]
    pub status: ModelDeploymentStatus,
}

impl ModelDeployment {
    pub fn new(id: impl Into<String>, spec: ModelDeploymentSpec) -> Self {
        Self {
            id: id.into(),
            spec,
            status: ModelDeploymentStatus::default(),
        }
    }
}

impl Resource for ModelDeployment {
    type Filter = ModelDeploymentFilter;

    const KIND: &'static str = "ModelDeployment";
    const PLURAL: &'static str = "modeldeployments";
    const TABLE: &'static str = "odahu_operator_deployment";
    const OWNS_CHILDREN: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn modifiable(&self) -> &Modifiable {
        &self.status.modifiable
    }

    fn modifiable_mut(&mut self) -> &mut Modifiable {
        &mut self.status.modifiable
    }

    fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        if !self.spec.role_name.is_empty() {
            labels.insert("roleName".to_string(), self.spec.role_name.clone());
        }
        labels
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelDeploymentFilter {
    pub role_name: Vec<String>,
}

impl ResourceFilter for ModelDeploymentFilter {
    const FIELDS: &'static [FilterField] = &[FilterField {
        key: "roleName",
        column: "spec->>'roleName'",
    }];

    fn values(&self, key: &str) -> &[String] {
        match key {
            "roleName" => &self.role_name,
            _ => &[],
        }
    }

    fn values_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        match key {
            "roleName" => Some(&mut self.role_name),
            _ => None,
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Weighted reference from a route to a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDeploymentTarget {
    /// ID of the deployment
    pub md_name: String,
    /// Share of traffic in percent; all weights of a route sum to 100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i32>,
}

impl ModelDeploymentTarget {
    pub fn new(md_name: impl Into<String>, weight: Option<i32>) -> Self {
        Self {
            md_name: md_name.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRouteSpec {
    /// Public path prefix, outside the reserved `/model` and `/feedback`
    pub url_prefix: String,
    /// Deployment receiving a copy of every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<String>,
    #[serde(default, rename = "modelDeployments")]
    pub model_deployment_targets: Vec<ModelDeploymentTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRouteStatus {
    /// Externally reachable URL of the route
    #[serde(default, rename = "edgeUrl", skip_serializing_if = "String::is_empty")]
    pub edge_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(flatten)]
    pub modifiable: Modifiable,
}

/// Splits and mirrors traffic across deployments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRoute {
    pub id: String,
    pub spec: ModelRouteSpec,
    #[serde(default)]
    pub status: ModelRouteStatus,
}

impl ModelRoute {
    pub fn new(id: impl Into<String>, spec: ModelRouteSpec) -> Self {
        Self {
            id: id.into(),
            spec,
            status: ModelRouteStatus::default(),
        }
    }
}

impl Resource for ModelRoute {
    type Filter = ModelRouteFilter;

    const KIND: &'static str = "ModelRoute";
    const PLURAL: &'static str = "modelroutes";
    const TABLE: &'static str = "odahu_operator_route";
    const OWNS_CHILDREN: bool = true;

    fn id(&self) -> &str {
        &self.id
    }

    fn modifiable(&self) -> &Modifiable {
        &self.status.modifiable
    }

    fn modifiable_mut(&mut self) -> &mut Modifiable {
        &mut self.status.modifiable
    }

    fn labels(&self) -> BTreeMap<String, String> {
        self.spec
            .model_deployment_targets
            .first()
            .map(|target| BTreeMap::from([("mdId".to_string(), target.md_name.clone())]))
            .unwrap_or_default()
    }
}

/// Routes are filtered by the first deployment they point at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRouteFilter {
    pub md_id: Vec<String>,
}

impl ResourceFilter for ModelRouteFilter {
    const FIELDS: &'static [FilterField] = &[FilterField {
        key: "mdId",
        column: "spec->'modelDeployments'->0->>'mdName'",
    }];

    fn values(&self, key: &str) -> &[String] {
        match key {
            "mdId" => &self.md_id,
            _ => &[],
        }
    }

    fn values_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        match key {
            "mdId" => Some(&mut self.md_id),
            _ => None,
        }
    }
}
