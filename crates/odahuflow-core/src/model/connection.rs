//! Connections to external systems (object storage, VCS, registries)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::filter::{FilterField, ResourceFilter};
use crate::repository::{Modifiable, Resource};

/// Replacement written over credential fields in a masked read
pub const SENSITIVE_DATA_MASK: &str = "*****";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    S3,
    Gcs,
    #[serde(rename = "azureblob")]
    AzureBlob,
    Git,
    Docker,
    Ecr,
}

impl ConnectionType {
    pub const ALL: [ConnectionType; 6] = [
        ConnectionType::S3,
        ConnectionType::Gcs,
        ConnectionType::AzureBlob,
        ConnectionType::Git,
        ConnectionType::Docker,
        ConnectionType::Ecr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::S3 => "s3",
            ConnectionType::Gcs => "gcs",
            ConnectionType::AzureBlob => "azureblob",
            ConnectionType::Git => "git",
            ConnectionType::Docker => "docker",
            ConnectionType::Ecr => "ecr",
        }
    }

    /// Types usable as object storage
    pub fn is_object_storage(&self) -> bool {
        matches!(
            self,
            ConnectionType::S3 | ConnectionType::Gcs | ConnectionType::AzureBlob
        )
    }

    /// Types usable as a container registry
    pub fn is_registry(&self) -> bool {
        matches!(self, ConnectionType::Docker | ConnectionType::Ecr)
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    /// Bucket, repository or registry address
    #[serde(default)]
    pub uri: String,
    /// Registry user, docker only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Base64-encoded
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Base64-encoded
    #[serde(default, rename = "keyID", skip_serializing_if = "String::is_empty")]
    pub key_id: String,
    /// Base64-encoded
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_secret: String,
    /// Base64-encoded SSH host key, git only
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_key: String,
    /// Cloud region; inferred from the URI for ecr
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,
    /// Cloud IAM role assumed instead of static keys
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    /// Default VCS reference (branch, tag, commit)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub web_ui_link: String,
}

impl ConnectionSpec {
    pub fn new(connection_type: ConnectionType, uri: impl Into<String>) -> Self {
        Self {
            connection_type,
            uri: uri.into(),
            username: String::new(),
            password: String::new(),
            key_id: String::new(),
            key_secret: String::new(),
            public_key: String::new(),
            region: String::new(),
            role: String::new(),
            reference: String::new(),
            description: String::new(),
            web_ui_link: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    #[serde(flatten)]
    pub modifiable: Modifiable,
}

/// Credentials and address of an external system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub spec: ConnectionSpec,
    #[serde(default)]
    pub status: ConnectionStatus,
}

impl Connection {
    pub fn new(id: impl Into<String>, spec: ConnectionSpec) -> Self {
        Self {
            id: id.into(),
            spec,
            status: ConnectionStatus::default(),
        }
    }

    /// Replace every non-empty credential field with [`SENSITIVE_DATA_MASK`]
    pub fn masked(mut self) -> Self {
        for secret in [
            &mut self.spec.password,
            &mut self.spec.key_secret,
            &mut self.spec.key_id,
        ] {
            if !secret.is_empty() {
                *secret = SENSITIVE_DATA_MASK.to_string();
            }
        }
        self
    }
}

impl Resource for Connection {
    type Filter = ConnectionFilter;

    const KIND: &'static str = "Connection";
    const PLURAL: &'static str = "connections";
    const TABLE: &'static str = "odahu_operator_connection";

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
            "type".to_string(),
            self.spec.connection_type.as_str().to_string(),
        )])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionFilter {
    pub connection_type: Vec<String>,
}

impl ResourceFilter for ConnectionFilter {
    const FIELDS: &'static [FilterField] = &[FilterField {
        key: "type",
        column: "spec->>'type'",
    }];

    fn values(&self, key: &str) -> &[String] {
        match key {
            "type" => &self.connection_type,
            _ => &[],
        }
    }

    fn values_mut(&mut self, key: &str) -> Option<&mut Vec<String>> {
        match key {
            "type" => Some(&mut self.connection_type),
            _ => None,
        }
    }
}
