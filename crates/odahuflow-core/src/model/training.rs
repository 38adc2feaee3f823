//! Model trainings

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::filter::{FilterField, ResourceFilter};
use crate::model::common::{ResourceRequirements, Target};
use crate::repository::{Modifiable, Resource};

/// Default template for the name of the produced artifact
pub const DEFAULT_ARTIFACT_NAME_TEMPLATE: &str = "{{ .Name }}-{{ .Version }}-{{ .RandomUUID }}.zip";

/// Name and version of the model being trained
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelIdentity {
    /// Kubernetes label value
    pub name: String,
    /// Kubernetes label value
    pub version: String,
    /// Go template for the artifact file name, see [`DEFAULT_ARTIFACT_NAME_TEMPLATE`]
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artifact_name_template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTrainingSpec {
    pub model: ModelIdentity,
    /// Name of the toolchain integration
    #[serde(default)]
    pub toolchain: String,
    /// Training image, defaults to the toolchain's default image
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Model code entrypoint run by the toolchain
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entrypoint: String,
    #[serde(default, rename = "args", skip_serializing_if = "Vec::is_empty")]
    pub entrypoint_arguments: Vec<String>,
    /// Directory of the model code inside the source connection
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub work_dir: String,
    /// Checked against the toolchain's argument schema
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub hyper_parameters: Map<String, Value>,
    /// Input data and source slots, bound to connections
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    /// Storage receiving the trained artifact
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output_connection: String,
    /// Must match a configured node pool, a GPU pool when a GPU is requested
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
}

/// One artifact produced by a finished training
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingResult {
    /// Tracking server run
    pub run_id: String,
    pub artifact_name: String,
    /// Source revision the model was trained from
    #[serde(rename = "commitID")]
    pub commit_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTrainingStatus {
    /// Lifecycle state such as `scheduling`, `running` or `succeeded`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<TrainingResult>,
    #[serde(flatten)]
    pub modifiable: Modifiable,
}

/// A training run of a model under a toolchain integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTraining {
    pub id: String,
    pub spec: ModelTrainingSpec,
    #[serde(default)]
    pub status: ModelTrainingStatus,
}

impl ModelTraining {
    pub fn new(id: impl Into<String>, spec: ModelTrainingSpec) -> Self {
        Self {
            id: id.into(),
            spec,
            status: ModelTrainingStatus::default(),
        }
    }
}

impl Resource for ModelTraining {
    type Filter = ModelTrainingFilter;

    const KIND: &'static str = "ModelTraining";
    const PLURAL: &'static str = "modeltrainings";
    const TABLE: &'static str = "odahu_operator_training";

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
        BTreeMap::from([
            ("toolchain".to_string(), self.spec.toolchain.clone()),
            ("model_name".to_string(), self.spec.model.name.clone()),
            ("model_version".to_string(), self.spec.model.version.clone()),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelTrainingFilter {
    pub toolchain: Vec<String>,
    pub model_name: Vec<String>,
    pub model_version: Vec<String>,
}

impl ResourceFilter for ModelTrainingFilter {
    const FIELDS: &'static [FilterField] = &[
        FilterField {
            key: "toolchain",
            column: "spec->>'toolchain'",
        },
        FilterField {
            key: "model_name",
            column: "spec->'model'->>'name'",
        },
        FilterField {
            key: "model_version",
            column: "spec->'model'->>'version'",
        },
    ];

    fn values(&self, key: &str) -> &[String] {
        match key {
            "toolchain" => &self.toolchain,
            "model_name" => &self.model_name,
            "model_version" => &self.model_version,
            _ => &[],
        }
    }

    fn values_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        match key {
            "toolchain" => Some(&mut self.toolchain),
            "model_name" => Some(&mut self.model_name),
            "model_version" => Some(&mut self.model_version),
            _ => None,
        }
    }
}
