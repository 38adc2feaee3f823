//! Target resolution and defaulting shared by packagings and trainings

use std::collections::HashSet;

use odahuflow_core::{Connection, Integration, Repository, ResourceResult, Target};
use tracing::info;

use super::lookup;
use super::violations::Violations;

/// Check supplied targets against the integration's target schemas, then
/// append the defaults of schemas the caller left out.
///
/// Supplied targets keep their order. Defaulted targets follow them in
/// schema declaration order. Required schemas with neither a supplied target
/// nor a default are reported together in one violation.
pub async fn resolve_targets<I: Integration>(
    connections: &dyn Repository<Connection>,
    integration: &I,
    targets: &mut Vec<Target>,
    field: &str,
    violations: &mut Violations,
) -> ResourceResult<()> {
    let schemas = &integration.spec().schema.targets;
    let mut supplied = HashSet::new();

    for (i, target) in targets.iter().enumerate() {
        let path = format!("{}[{}]", field, i);
        supplied.insert(target.name.as_str());

        let Some(schema) = schemas.iter().find(|schema| schema.name == target.name) else {
            violations.not_allowed(
                format!("{}.name", path),
                format!(
                    "cannot find {} target in {} {}",
                    target.name,
                    I::KIND,
                    integration.id()
                ),
            );
            continue;
        };

        let connection_path = format!("{}.connectionName", path);
        if target.connection_name.is_empty() {
            violations.empty(connection_path);
            continue;
        }

        match lookup(connections, &target.connection_name).await? {
            None => violations.not_found(connection_path, &target.connection_name),
            Some(connection) => {
                let found = connection.spec.connection_type;
                if !schema.connection_types.contains(&found) {
                    violations.invalid(
                        connection_path,
                        format!(
                            "{} target has not valid connection type {} for {} {}",
                            target.name,
                            found,
                            I::KIND,
                            integration.id()
                        ),
                    );
                }
            }
        }
    }

    let mut defaulted = Vec::new();
    let mut missing = Vec::new();
    for schema in schemas {
        if supplied.contains(schema.name.as_str()) {
            continue;
        }
        if !schema.default.is_empty() {
            defaulted.push(Target::new(&schema.name, &schema.default));
        } else if schema.required {
            missing.push(schema.name.as_str());
        }
    }

    if !missing.is_empty() {
        violations.required(field, format!("[{}] are required targets", missing.join(", ")));
    }

    for target in defaulted {
        info!(
            target = %target.name,
            connection = %target.connection_name,
            "target is not supplied, using the integration default"
        );
        targets.push(target);
    }

    Ok(())
}
