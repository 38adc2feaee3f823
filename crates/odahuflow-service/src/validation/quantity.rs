//! Resource quantity grammar
//!
//! Quantities use the Kubernetes notation: a non-negative decimal number
//! followed by an optional binary (`Ki`..`Ei`), decimal (`n`, `u`, `m`,
//! `k`, `M`..`E`) or exponent (`e3`) suffix.

use regex::Regex;
use std::sync::OnceLock;

use odahuflow_core::{FieldViolation, ResourceList, ResourceRequirements};

const QUANTITY_PATTERN: &str =
    r"^\+?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+|[KMGTPE]i|[numkMGTPE])?$";

fn quantity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(QUANTITY_PATTERN).expect("quantity pattern is a valid regex"))
}

/// Whether `value` is a well-formed quantity
pub fn is_valid_quantity(value: &str) -> bool {
    quantity_regex().is_match(value)
}

/// One violation per malformed field; every field is checked
pub fn validate_resources(resources: &ResourceRequirements, field: &str) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    for (side, list) in [("requests", &resources.requests), ("limits", &resources.limits)] {
        if let Some(list) = list {
            validate_list(list, &format!("{}.{}", field, side), &mut violations);
        }
    }
    violations
}

fn validate_list(list: &ResourceList, field: &str, violations: &mut Vec<FieldViolation>) {
    for (name, value) in [("cpu", &list.cpu), ("memory", &list.memory), ("gpu", &list.gpu)] {
        let Some(value) = value else { continue };
        if !is_valid_quantity(value) {
            violations.push(FieldViolation::invalid(
                format!("{}.{}", field, name),
                format!(
                    "quantities must match the regular expression '{}', got {:?}",
                    QUANTITY_PATTERN, value
                ),
            ));
        }
    }
}

/// Whether any side of `resources` requests a GPU
pub fn requests_gpu(resources: Option<&ResourceRequirements>) -> bool {
    let Some(resources) = resources else {
        return false;
    };
    [&resources.requests, &resources.limits]
        .into_iter()
        .flatten()
        .any(|list| list.gpu.as_deref().map_or(false, |gpu| !gpu.is_empty()))
}
