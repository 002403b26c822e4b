//! Field-level redaction applied to audit and confirmation payloads before
//! persistence (spec.md §4.7).

use serde_json::Value;
use sha2::{Digest, Sha256};

const MARKER_PREFIX: &str = "[REDACTED:";

/// Replaces each named field in `payload` whose value is a non-empty string
/// with `"[REDACTED:<8-hex-chars>]"`. Non-string or missing values are
/// untouched. Nested objects are not recursed into. Idempotent: a value
/// already carrying the marker prefix is left unchanged.
pub fn redact_fields(payload: &Value, fields: &[String]) -> Value {
    let mut out = payload.clone();
    if let Some(obj) = out.as_object_mut() {
        for field in fields {
            if let Some(Value::String(s)) = obj.get(field) {
                if s.is_empty() || s.starts_with(MARKER_PREFIX) {
                    continue;
                }
                let marker = hash_marker(s);
                obj.insert(field.clone(), Value::String(marker));
            }
        }
    }
    out
}

/// Full-payload marker used when `store_full_audit_data=false`.
pub fn full_redaction_marker() -> Value {
    serde_json::json!({ "redacted": true })
}

fn hash_marker(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    let hex = hex::encode(digest);
    format!("{MARKER_PREFIX}{}]", &hex[..8])
}

/// Applies the redaction policy from `Settings` to a single payload: full
/// marker if audit data isn't stored, per-field hashing if PHI redaction is
/// enabled, otherwise the payload verbatim.
pub fn apply_policy(
    payload: &Value,
    store_full_audit_data: bool,
    redact_phi_fields: bool,
    phi_fields: &[String],
) -> Value {
    if !store_full_audit_data {
        return full_redaction_marker();
    }
    if redact_phi_fields {
        return redact_fields(payload, phi_fields);
    }
    payload.clone()
}
