//! Kubernetes label selectors derived from resource filters

use std::collections::BTreeMap;
use std::fmt;

use odahuflow_core::ResourceFilter;

/// `key` must carry one of `values`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub values: Vec<String>,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.values.as_slice() {
            [single] => write!(f, "{}={}", self.key, single),
            values => write!(f, "{} in ({})", self.key, values.join(",")),
        }
    }
}

/// Conjunction of requirements, rendered in the API server's selector syntax
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Push a filter down to the store. Empty and wildcard fields are dropped.
    pub fn from_filter<F: ResourceFilter>(filter: &F) -> Self {
        let requirements = filter
            .criteria()
            .into_iter()
            .map(|criterion| Requirement {
                key: criterion.field.key.to_string(),
                values: criterion.values.to_vec(),
            })
            .collect();
        Self { requirements }
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Evaluate the selector against an object's labels
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|requirement| {
            labels
                .get(&requirement.key)
                .is_some_and(|value| requirement.values.contains(value))
        })
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join(","))
    }
}
