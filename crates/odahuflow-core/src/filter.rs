//! Declarative list filters
//!
//! A filter is a plain struct of `Vec<String>` fields. Each field is described
//! once, statically, by a [`FilterField`] entry in [`ResourceFilter::FIELDS`]:
//! the query key used by the HTTP layer and Kubernetes labels, and the JSON
//! column path used by the relational backend. Several values for one key mean
//! OR of equality; different keys are combined with AND.

use std::collections::BTreeMap;
use std::fmt::Debug;

/// Value meaning "do not filter on this key"
pub const WILDCARD: &str = "*";

/// Static description of one filterable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterField {
    /// Query parameter and label key, e.g. `type`
    pub key: &'static str,
    /// SQL expression selecting the value from the stored row, e.g. `spec->>'type'`
    pub column: &'static str,
}

/// One active predicate: the field must equal any of `values`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion<'a> {
    pub field: &'static FilterField,
    pub values: &'a [String],
}

impl Criterion<'_> {
    pub fn accepts(&self, value: Option<&str>) -> bool {
        value.is_some_and(|v| self.values.iter().any(|candidate| candidate == v))
    }
}

/// A per-resource filter whose key mapping is a constant table
pub trait ResourceFilter: Debug + Default + Clone + Send + Sync + 'static {
    /// Field table, built at compile time
    const FIELDS: &'static [FilterField];

    /// Values supplied for `key`
    fn values(&self, key: &str) -> &[String];

    /// Mutable access used when populating the filter from query parameters
    fn values_mut(&mut self, key: &str) -> Option<&mut Vec<String>>;

    /// Active predicates. Empty fields and a lone wildcard are skipped.
    fn criteria(&self) -> Vec<Criterion<'_>> {
        Self::FIELDS
            .iter()
            .filter_map(|field| {
                let values = self.values(field.key);
                let inactive =
                    values.is_empty() || (values.len() == 1 && values[0] == WILDCARD);
                (!inactive).then_some(Criterion { field, values })
            })
            .collect()
    }

    /// Append a value for `key`. Returns `false` if the key is not filterable.
    fn push(&mut self, key: &str, value: impl Into<String>) -> bool {
        match self.values_mut(key) {
            Some(values) => {
                values.push(value.into());
                true
            }
            None => false,
        }
    }

    /// Build a filter from raw query pairs, ignoring unknown keys
    fn from_query<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = Self::default();
        for (key, value) in pairs {
            filter.push(key, value);
        }
        filter
    }

    /// Client-side evaluation against an entity's label set
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.criteria()
            .iter()
            .all(|criterion| criterion.accepts(labels.get(criterion.field.key).map(String::as_str)))
    }
}

/// Filter for resource kinds that expose no filterable fields
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NoFilter;

impl ResourceFilter for NoFilter {
    const FIELDS: &'static [FilterField] = &[];

    fn values(&self, _key: &str) -> &[String] {
        &[]
    }

    fn values_mut(&mut self, _key: &str) -> Option<&mut Vec<String>> {
        None
    }
}
