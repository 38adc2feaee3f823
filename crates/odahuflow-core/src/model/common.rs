//! Types shared by several resource kinds

use serde::{Deserialize, Serialize};

/// Compute quantities for one side (requests or limits) of a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList {
    /// Quantity such as `500m` or `2`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Quantity such as `256Mi` or `1G`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    /// Number of GPUs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<String>,
}

impl ResourceList {
    pub fn new(cpu: &str, memory: &str) -> Self {
        Self {
            cpu: Some(cpu.to_string()),
            memory: Some(memory.to_string()),
            gpu: None,
        }
    }
}

/// Requests and limits, in the same format Kubernetes uses for pods
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirements {
    /// Upper bounds for the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceList>,
}

/// A named slot bound to a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Slot name declared by the integration
    pub name: String,
    /// ID of the bound connection
    pub connection_name: String,
}

impl Target {
    pub fn new(name: impl Into<String>, connection_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection_name: connection_name.into(),
        }
    }
}
