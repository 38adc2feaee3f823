//! Identifier and label grammars, and generated IDs
//!
//! An ID has at most 63 characters, only lowercase alphanumerics or `-`,
//! starts with a letter and ends with an alphanumeric character.

use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of an ID
pub const MAX_ID_LENGTH: usize = 63;

/// Length of a lower-cased ULID
const ULID_LENGTH: usize = 26;

const ID_PATTERN: &str = "^[a-z]([-a-z0-9]{0,61}[a-z0-9])?$";
const LABEL_PATTERN: &str = "^(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])?$";

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ID_PATTERN).expect("ID pattern is a valid regex"))
}

fn label_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(LABEL_PATTERN).expect("label pattern is a valid regex"))
}

/// Check `id` against the ID grammar, returning the violation message
pub fn validate_id(id: &str) -> Result<(), String> {
    if id_regex().is_match(id) {
        return Ok(());
    }
    if id.is_empty() {
        return Err("ID is not valid: empty \"ID\"".to_string());
    }
    Err(format!(
        "ID {:?} is not valid: it must contain at most {} lowercase alphanumeric characters or '-', \
         start with a letter and end with an alphanumeric character",
        id, MAX_ID_LENGTH
    ))
}

/// Check that `value` can be used as a Kubernetes label value
pub fn validate_label(value: &str) -> Result<(), String> {
    if label_regex().is_match(value) {
        return Ok(());
    }
    Err(format!(
        "{} must be valid Kubernetes label, i.e. match this pattern: {}",
        value, LABEL_PATTERN
    ))
}

/// Generate an ID that always satisfies [`validate_id`]
///
/// `hints` are joined into a readable prefix, reduced to the ID alphabet and
/// truncated so that the prefix plus a lower-cased ULID fits. `fallback` is
/// used when nothing usable remains of the hints.
pub fn generate_id(hints: &[&str], fallback: &str) -> String {
    let max_prefix = MAX_ID_LENGTH - ULID_LENGTH - 1;

    let mut prefix = sanitize(&hints.join("-"));
    prefix.truncate(max_prefix);
    let mut prefix = prefix.trim_end_matches('-').to_string();

    if prefix.is_empty() {
        prefix = sanitize(fallback);
        prefix.truncate(max_prefix);
        prefix = prefix.trim_end_matches('-').to_string();
    }

    let suffix = ulid::Ulid::new().to_string().to_lowercase();
    if prefix.is_empty() {
        format!("id-{}", &suffix[..ULID_LENGTH - 3])
    } else {
        format!("{}-{}", prefix, suffix)
    }
}

/// Lowercase, map everything outside `[a-z0-9]` to `-`, collapse runs and
/// strip anything before the first letter
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        if out.is_empty() && !c.is_ascii_lowercase() {
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_grammar() {
        let longest = "a".repeat(63);
        let too_long = "a".repeat(64);
        for valid in ["s", "aaa", "some-valid-id", longest.as_str()] {
            assert!(validate_id(valid).is_ok(), "{} should be valid", valid);
        }
        for invalid in ["", "-some-id", "some-id-", "SOME-id", "1abc", "a_b", too_long.as_str()] {
            assert!(validate_id(invalid).is_err(), "{} should be invalid", invalid);
        }
        assert!(validate_id("").unwrap_err().contains("empty"));
    }

    #[test]
    fn test_label_grammar() {
        assert!(validate_label("").is_ok());
        assert!(validate_label("Wine.Quality_1").is_ok());
        assert!(validate_label("1.0").is_ok());
        assert!(validate_label("-wine").is_err());
        assert!(validate_label("wine quality").is_err());
    }

    #[test]
    fn test_generated_ids_are_valid() {
        let long = "very-long-artifact-name".repeat(5);
        let cases: [&[&str]; 5] = [
            &["wine", "docker-rest"],
            &["Wine Quality!!", "v1.0"],
            &["42", "---"],
            &[""],
            &[long.as_str()],
        ];
        for hints in cases {
            let id = generate_id(hints, "mp");
            assert!(validate_id(&id).is_ok(), "{} should be valid", id);
        }

        assert!(generate_id(&["wine", "docker-rest"], "mp").starts_with("wine-docker-rest-"));
        assert!(generate_id(&["Wine Quality", "v1.0"], "mt").starts_with("wine-quality-v1-0-"));
        assert!(generate_id(&["42"], "mp").starts_with("mp-"));
        assert!(generate_id(&[], "").starts_with("id-"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_id(&["wine"], "mp");
        let b = generate_id(&["wine"], "mp");
        assert_ne!(a, b);
    }
}
