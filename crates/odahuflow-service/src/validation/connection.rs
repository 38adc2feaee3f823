//! Connection validation
//!
//! Secret fields travel base64-encoded. Each connection type has its own
//! set of required fields; an ECR connection can take its region from the
//! registry host in the URI.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, instrument};

use odahuflow_core::{Connection, ConnectionType, ResourceResult};

use super::id::validate_id;
use super::violations::Violations;
use super::Validator;

/// Host of an ECR registry: `<account>.dkr.ecr[-fips].<region>.amazonaws.com[.cn]`
const ECR_HOST_PATTERN: &str =
    r"^(\d{12})\.dkr\.ecr(-fips)?\.([a-zA-Z0-9][a-zA-Z0-9-_]*)\.amazonaws\.com(\.cn)?$";

fn ecr_host_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ECR_HOST_PATTERN).expect("ECR host pattern is a valid regex"))
}

/// Region of the ECR registry addressed by `uri`
pub fn ecr_region(uri: &str) -> Option<String> {
    let without_scheme = uri.split_once("://").map_or(uri, |(_, rest)| rest);
    let host = without_scheme.split('/').next().unwrap_or_default();
    ecr_host_regex()
        .captures(host)
        .and_then(|captures| captures.get(3))
        .map(|region| region.as_str().to_string())
}

/// Checks connections; it needs no repositories
#[derive(Debug, Clone, Default)]
pub struct ConnectionValidator;

impl ConnectionValidator {
    pub fn new() -> Self {
        Self
    }

    fn validate_base64_fields(conn: &Connection, violations: &mut Violations) {
        let spec = &conn.spec;
        for (field, name, value) in [
            ("spec.password", "password", &spec.password),
            ("spec.keySecret", "key secret", &spec.key_secret),
            ("spec.keyID", "key id", &spec.key_id),
            ("spec.publicKey", "public key", &spec.public_key),
        ] {
            if let Err(err) = STANDARD.decode(value) {
                violations.invalid(field, format!("{} must be base64-encoded, error: {}", name, err));
            }
        }
    }

    fn validate_type(conn: &mut Connection, violations: &mut Violations) {
        let spec = &mut conn.spec;
        match spec.connection_type {
            ConnectionType::S3 => {
                if spec.region.is_empty() {
                    violations.empty("spec.region");
                }
                if !spec.role.is_empty() {
                    violations.not_allowed("spec.role", "s3 type does not support role parameter yet");
                }
                if spec.key_id.is_empty() || spec.key_secret.is_empty() {
                    violations.required(
                        "spec.keySecret",
                        "s3 type requires that keyID and keySecret parameters must be non-empty",
                    );
                }
            }
            ConnectionType::Gcs => {
                if spec.region.is_empty() {
                    violations.empty("spec.region");
                }
                if !spec.role.is_empty() {
                    violations.not_allowed("spec.role", "gcs type does not support role parameter yet");
                }
                if spec.key_secret.is_empty() {
                    violations.required("spec.keySecret", "gcs type requires that keySecret parameter must be non-empty");
                }
            }
            ConnectionType::AzureBlob => {
                if spec.key_secret.is_empty() {
                    violations.required(
                        "spec.keySecret",
                        "azureblob type requires that keySecret parameter contains HTTP endpoint with SAS Token",
                    );
                }
            }
            ConnectionType::Docker => {
                if spec.password.is_empty() {
                    violations.required("spec.password", "docker type requires the password parameter");
                }
                if spec.username.is_empty() {
                    violations.required("spec.username", "docker type requires the username parameter");
                }
            }
            ConnectionType::Ecr => {
                if !spec.uri.is_empty() {
                    match ecr_region(&spec.uri) {
                        None => violations.invalid(
                            "spec.uri",
                            format!("not valid uri for ecr type: {}", spec.uri),
                        ),
                        Some(region) if spec.region.is_empty() => {
                            info!(id = %conn.id, region = %region, "region is empty, using the region of the registry URI");
                            spec.region = region;
                        }
                        Some(_) => {}
                    }
                }
                if spec.key_id.is_empty() || spec.key_secret.is_empty() {
                    violations.required(
                        "spec.keySecret",
                        "ecr type requires that keyID and keySecret parameters must be non-empty",
                    );
                }
            }
            // A git connection may omit its public key
            ConnectionType::Git => {}
        }
    }
}

#[async_trait]
impl Validator<Connection> for ConnectionValidator {
    #[instrument(skip(self, conn), fields(id = %conn.id, kind = %conn.spec.connection_type))]
    async fn validate_and_set_defaults(&self, conn: &mut Connection) -> ResourceResult<()> {
        let mut violations = Violations::new();

        if let Err(message) = validate_id(&conn.id) {
            violations.invalid("id", message);
        }
        Self::validate_base64_fields(conn, &mut violations);
        if conn.spec.uri.is_empty() {
            violations.empty("spec.uri");
        }
        Self::validate_type(conn, &mut violations);

        violations.into_result(&conn.id)
    }
}
