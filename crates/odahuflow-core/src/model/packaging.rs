//! Model packagings: turning a trained artifact into a deployable image

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::filter::{FilterField, ResourceFilter};
use crate::model::common::{ResourceRequirements, Target};
use crate::repository::{Modifiable, Resource};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPackagingSpec {
    /// Trained artifact to package. Exclusive with `training_id`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artifact_name: String,
    /// Training whose artifact is packaged. Exclusive with `artifact_name`.
    #[serde(default, rename = "trainingID", skip_serializing_if = "String::is_empty")]
    pub training_id: String,
    /// Name of the packaging integration
    #[serde(default, rename = "integrationName")]
    pub integration_name: String,
    /// Packager image, defaults to the integration's default image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Checked against the integration's argument schema
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub arguments: Map<String, Value>,
    /// Slots declared by the integration, bound to connections
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Target>,
    /// Packager pod resources, defaults to the configured ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Storage holding the artifact, defaults to the configured connection
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_connection: String,
    /// Must match one of the configured node pools when set
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
}

/// A named output of a packaging, e.g. the pushed image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingResult {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPackagingStatus {
    /// Lifecycle state such as `scheduling`, `running` or `succeeded`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    /// Packager container exit code once it has finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Human-readable reason for the current state
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<PackagingResult>,
    #[serde(flatten)]
    pub modifiable: Modifiable,
}

/// A packaging run of an artifact under a packaging integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPackaging {
    pub id: String,
    pub spec: ModelPackagingSpec,
    #[serde(default)]
    pub status: ModelPackagingStatus,
}

impl ModelPackaging {
    pub fn new(id: impl Into<String>, spec: ModelPackagingSpec) -> Self {
        Self {
            id: id.into(),
            spec,
            status: ModelPackagingStatus::default(),
        }
    }
}

impl Resource for ModelPackaging {
    type Filter = ModelPackagingFilter;

    const KIND: &'static str = "ModelPackaging";
    const PLURAL: &'static str = "modelpackagings";
    const TABLE: &'static str = "odahu_operator_packaging";

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
        BTreeMap::from([(
            "integration".to_string(),
            self.spec.integration_name.clone(),
        )])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelPackagingFilter {
    pub integration: Vec<String>,
}

impl ResourceFilter for ModelPackagingFilter {
    const FIELDS: &'static [FilterField] = &[FilterField {
        key: "integration",
        column: "spec->>'integrationName'",
    }];

    fn values(&self, key: &str) -> &[String] {
        match key {
            "integration" => &self.integration,
            _ => &[],
        }
    }

    fn values_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        match key {
            "integration" => Some(&mut self.integration),
            _ => None,
        }
    }
}
