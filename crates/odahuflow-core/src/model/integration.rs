//! Integration templates referenced by packagings and trainings
//!
//! An integration declares the argument schema and the target slots that a
//! concrete packaging or training has to satisfy. Packaging integrations and
//! toolchain integrations share one spec shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::NoFilter;
use crate::model::connection::ConnectionType;
use crate::repository::{Modifiable, Resource};

/// One target slot declared by an integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSchema {
    /// Unique within the integration
    pub name: String,
    /// Connection types a bound connection may have
    /// Connection types a bound connection may have
    #[serde(default)]
    pub connection_types: Vec<ConnectionType>,
    /// Missing required slots without a default are a violation
    #[serde(default)]
    pub required: bool,
    /// Connection bound to the slot when the caller leaves it out
    /// Connection bound when the caller leaves the slot out
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default: String,
}

impl TargetSchema {
    pub fn new(name: impl Into<String>, connection_types: Vec<ConnectionType>) -> Self {
        Self {
            name: name.into(),
            connection_types,
            required: false,
            default: String::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, connection: impl Into<String>) -> Self {
        self.default = connection.into();
        self
    }
}

/// A single JSON-schema keyword applied to a property, e.g. `minimum: 5`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

/// A declared argument and the keywords constraining it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.push(Parameter {
            name: name.into(),
            value,
        });
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name == name)
            .map(|parameter| &parameter.value)
    }
}

/// Object schema of the arguments; undeclared arguments are rejected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentsSchema {
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Names of properties that must be supplied
    /// Argument names that must be present
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSchema {
    #[serde(default)]
    pub targets: Vec<TargetSchema>,
    #[serde(default)]
    pub arguments: ArgumentsSchema,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSpec {
    /// Command run inside the integration image
    pub entrypoint: String,
    /// Image used when a packaging or training leaves its own empty
    pub default_image: String,
    /// Run the image as a privileged container
    /// Run the integration container privileged
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub schema: IntegrationSchema,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationStatus {
    #[serde(flatten)]
    pub modifiable: Modifiable,
}

/// Common accessors over both integration kinds
pub trait Integration: Resource {
    fn spec(&self) -> &IntegrationSpec;
}

macro_rules! integration_resource {
    ($(#[$meta:meta])* $name:ident, kind = $kind:literal, plural = $plural:literal, table = $table:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            pub id: String,
            pub spec: IntegrationSpec,
            #[serde(default)]
            pub status: IntegrationStatus,
        }

        impl $name {
            pub fn new(id: impl Into<String>, spec: IntegrationSpec) -> Self {
                Self {
                    id: id.into(),
                    spec,
                    status: IntegrationStatus::default(),
                }
            }
        }

        impl Resource for $name {
            type Filter = NoFilter;

            const KIND: &'static str = $kind;
            const PLURAL: &'static str = $plural;
            const TABLE: &'static str = $table;

            fn id(&self) -> &str {
                &self.id
            }

            fn modifiable(&self) -> &Modifiable {
                &self.status.modifiable
            }

            fn modifiable_mut(&mut self) -> &mut Modifiable {
                &mut self.status.modifiable
            }
        }

        impl Integration for $name {
            fn spec(&self) -> &IntegrationSpec {
                &self.spec
            }
        }
    };
}

integration_resource!(
    /// Template for model packagings
    PackagingIntegration,
    kind = "PackagingIntegration",
    plural = "packagingintegrations",
    table = "odahu_operator_packaging_integration"
);

integration_resource!(
    /// Template for model trainings
    ToolchainIntegration,
    kind = "ToolchainIntegration",
    plural = "toolchainintegrations",
    table = "odahu_operator_toolchain_integration"
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_wire_shape() {
        let pi: PackagingIntegration = serde_json::from_value(json!({
            "id": "docker-rest",
            "spec": {
                "entrypoint": "/usr/bin/pack",
                "defaultImage": "odahu/packager:latest",
                "schema": {
                    "targets": [
                        {"name": "target-1", "connectionTypes": ["s3", "gcs", "azureblob"], "default": "storage"},
                        {"name": "target-2", "connectionTypes": ["docker"], "required": true}
                    ],
                    "arguments": {
                        "properties": [
                            {"name": "argument-1", "parameters": [
                                {"name": "minimum", "value": 5},
                                {"name": "type", "value": "number"}
                            ]}
                        ],
                        "required": ["argument-1"]
                    }
                }
            }
        }))
        .unwrap();

        let targets = &pi.spec.schema.targets;
        assert_eq!(targets[0].default, "storage");
        assert!(!targets[0].required);
        assert_eq!(targets[1].connection_types, vec![ConnectionType::Docker]);

        let property = &pi.spec.schema.arguments.properties[0];
        assert_eq!(property.parameter("minimum"), Some(&json!(5)));
        assert_eq!(property.parameter("maximum"), None);
    }

    #[test]
    fn test_kinds_are_distinct() {
        assert_ne!(PackagingIntegration::TABLE, ToolchainIntegration::TABLE);
        assert_eq!(ToolchainIntegration::PLURAL, "toolchainintegrations");
    }
}
