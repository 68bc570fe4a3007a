//! Draft-level semantic validation.
//!
//! Runs on the post-patch document before it is persisted. Violations are
//! collected across the whole document so an editor can highlight every
//! problem in one round trip; any violation rejects the entire patch.

use levelset_protocol::{ConfigValue, DocumentError, RawConfigEntry, Violation, VALUES_FIELD};
use serde_json::Value;

/// Upper bound on the serialized size of a single JSON payload.
pub const MAX_JSON_VALUE_BYTES: usize = 64 * 1024;

/// Validate a draft document, returning every violated rule.
pub fn validate_document(document: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();

    let Some(doc) = document.as_object() else {
        violations.push(Violation::document(
            "document_shape",
            "draft document must be an object",
        ));
        return violations;
    };

    let Some(values) = doc.get(VALUES_FIELD) else {
        return violations;
    };
    let Some(entries) = values.as_object() else {
        violations.push(Violation::document(
            "values_shape",
            format!("'{VALUES_FIELD}' must be an object"),
        ));
        return violations;
    };

    for (key, raw) in entries {
        validate_entry(key, raw, &mut violations);
    }

    violations
}

fn validate_entry(key: &str, raw: &Value, violations: &mut Vec<Violation>) {
    let entry = match RawConfigEntry::from_json(raw) {
        Ok(entry) => entry,
        Err(e) => {
            violations.push(Violation::entry(key, rule_for(&e), e.to_string()));
            return;
        }
    };

    let value = match ConfigValue::coerce(entry.kind, &entry.value) {
        Ok(value) => value,
        Err(e) => {
            violations.push(Violation::entry(key, "value_syntax", e.to_string()));
            return;
        }
    };

    match &value {
        ConfigValue::String(s) => {
            if s.trim().is_empty() {
                violations.push(Violation::entry(
                    key,
                    "string_blank",
                    "STRING values must not be blank",
                ));
            }
        }
        ConfigValue::Json(tree) => {
            let size = serde_json::to_string(tree).map(|s| s.len()).unwrap_or(0);
            if size > MAX_JSON_VALUE_BYTES {
                violations.push(Violation::entry(
                    key,
                    "json_too_large",
                    format!("JSON value is {size} bytes, limit is {MAX_JSON_VALUE_BYTES}"),
                ));
            }
        }
        ConfigValue::Boolean(_) | ConfigValue::Number(_) => {}
    }
}

fn rule_for(err: &DocumentError) -> &'static str {
    match err {
        DocumentError::UnknownKind(_) => "unknown_type",
        DocumentError::BadWindow { .. } => "window_syntax",
        DocumentError::MissingField(_) => "entry_incomplete",
        _ => "entry_shape",
    }
}
