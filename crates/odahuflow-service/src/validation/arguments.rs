//! Argument validation against an integration's argument schema
//!
//! The schema is an object schema with `additionalProperties: false`. Each
//! declared property carries JSON-schema keywords; the supported ones are
//! `type`, `enum`, `minimum`, `maximum`, `exclusiveMinimum`,
//! `exclusiveMaximum`, `multipleOf`, `minLength`, `maxLength` and `pattern`.
//! Unknown keywords are ignored.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use odahuflow_core::{ArgumentsSchema, FieldViolation, Property, ViolationKind};

/// Validate `arguments`, one violation per failed keyword
pub fn validate_arguments(
    schema: &ArgumentsSchema,
    arguments: &Map<String, Value>,
    field: &str,
) -> Vec<FieldViolation> {
    let mut violations = Vec::new();

    for (name, value) in arguments {
        let path = format!("{}.{}", field, name);
        match schema.properties.iter().find(|property| &property.name == name) {
            None => violations.push(FieldViolation::new(
                path,
                ViolationKind::NotAllowed,
                format!("{}: additional property {} is not allowed", name, name),
            )),
            Some(property) => {
                violations.extend(
                    check_property(property, value)
                        .into_iter()
                        .map(|message| FieldViolation::invalid(path.clone(), format!("{}: {}", name, message))),
                );
            }
        }
    }

    for name in &schema.required {
        if !arguments.contains_key(name) {
            violations.push(FieldViolation::new(
                format!("{}.{}", field, name),
                ViolationKind::Required,
                format!("{} is required", name),
            ));
        }
    }

    violations
}

fn check_property(property: &Property, value: &Value) -> Vec<String> {
    let mut failures = Vec::new();

    if let Some(expected) = property.parameter("type") {
        if let Some(message) = check_type(expected, value) {
            // Other keywords assume the declared type
            failures.push(message);
            return failures;
        }
    }

    if let Some(Value::Array(allowed)) = property.parameter("enum") {
        if !allowed.contains(value) {
            failures.push(format!("must be one of the following: {}", join_values(allowed)));
        }
    }

    if let Some(number) = value.as_f64() {
        check_number(property, number, &mut failures);
    }

    if let Some(text) = value.as_str() {
        check_string(property, text, &mut failures);
    }

    failures
}

fn check_type(expected: &Value, value: &Value) -> Option<String> {
    let names: Vec<&str> = match expected {
        Value::String(name) => vec![name.as_str()],
        Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
        _ => return None,
    };

    if names.iter().any(|name| is_of_type(name, value)) {
        return None;
    }
    Some(format!(
        "invalid type. Expected: {}, given: {}",
        names.join(", "),
        type_name(value)
    ))
}

fn is_of_type(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0),
            _ => false,
        },
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_number(property: &Property, number: f64, failures: &mut Vec<String>) {
    // Draft 4 spells exclusiveness as a boolean next to minimum/maximum
    let exclusive_flag = |name| matches!(property.parameter(name), Some(Value::Bool(true)));

    if let Some(minimum) = property.parameter("minimum").and_then(Value::as_f64) {
        if exclusive_flag("exclusiveMinimum") {
            if number <= minimum {
                failures.push(format!("must be greater than {} (exclusiveMinimum)", minimum));
            }
        } else if number < minimum {
            failures.push(format!("must be greater than or equal to {} (minimum)", minimum));
        }
    }
    if let Some(maximum) = property.parameter("maximum").and_then(Value::as_f64) {
        if exclusive_flag("exclusiveMaximum") {
            if number >= maximum {
                failures.push(format!("must be less than {} (exclusiveMaximum)", maximum));
            }
        } else if number > maximum {
            failures.push(format!("must be less than or equal to {} (maximum)", maximum));
        }
    }
    if let Some(bound) = property.parameter("exclusiveMinimum").and_then(Value::as_f64) {
        if number <= bound {
            failures.push(format!("must be greater than {} (exclusiveMinimum)", bound));
        }
    }
    if let Some(bound) = property.parameter("exclusiveMaximum").and_then(Value::as_f64) {
        if number >= bound {
            failures.push(format!("must be less than {} (exclusiveMaximum)", bound));
        }
    }
    if let Some(divisor) = property.parameter("multipleOf").and_then(Value::as_f64) {
        if divisor > 0.0 && !is_multiple_of(number, divisor) {
            failures.push(format!("must be a multiple of {} (multipleOf)", divisor));
        }
    }
}

/// Relative tolerance of the `multipleOf` quotient
const MULTIPLE_OF_TOLERANCE: f64 = 1e-9;

fn is_multiple_of(number: f64, divisor: f64) -> bool {
    let quotient = number / divisor;
    (quotient - quotient.round()).abs() <= MULTIPLE_OF_TOLERANCE * quotient.abs().max(1.0)
}

fn pattern_cache() -> &'static RwLock<HashMap<String, Regex>> {
    static CACHE: OnceLock<RwLock<HashMap<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(Default::default)
}

/// Compile a `pattern` keyword once per process
fn compiled_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    if let Some(re) = pattern_cache()
        .read()
        .ok()
        .and_then(|cache| cache.get(pattern).cloned())
    {
        return Ok(re);
    }

    let re = Regex::new(pattern)?;
    if let Ok(mut cache) = pattern_cache().write() {
        cache.insert(pattern.to_string(), re.clone());
    }
    Ok(re)
}

fn check_string(property: &Property, text: &str, failures: &mut Vec<String>) {
    let length = text.chars().count() as u64;

    if let Some(min) = property.parameter("minLength").and_then(Value::as_u64) {
        if length < min {
            failures.push(format!("string length must be greater than or equal to {} (minLength)", min));
        }
    }
    if let Some(max) = property.parameter("maxLength").and_then(Value::as_u64) {
        if length > max {
            failures.push(format!("string length must be less than or equal to {} (maxLength)", max));
        }
    }
    if let Some(pattern) = property.parameter("pattern").and_then(Value::as_str) {
        match compiled_pattern(pattern) {
            Ok(re) if re.is_match(text) => {}
            Ok(_) => failures.push(format!("does not match pattern '{}' (pattern)", pattern)),
            Err(err) => failures.push(format!("schema pattern '{}' is not valid: {}", pattern, err)),
        }
    }
}

fn join_values(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
