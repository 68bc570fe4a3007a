//! Config resolution.
//!
//! Resolution computes the effective value set of a raw document at an
//! instant: activation-window filtering first, then type coercion, with
//! keys sorted lexicographically. Deterministic output is required for
//! stable hashing and stable diffing.

use chrono::{DateTime, Utc};
use levelset_protocol::{
    ConfigValue, DocumentError, RawConfigEntry, ResolvedConfig, Violation, VALUES_FIELD,
};
use serde_json::Value;

use crate::error::{EngineError, Result};

/// Resolve a raw draft document at `now`.
///
/// An absent `values` field resolves to an empty set; a present but
/// non-object `values` is a hard configuration error. Malformed entries
/// are contract violations: all of them are collected and reported
/// together, never silently dropped.
pub fn resolve_document(document: &Value, now: DateTime<Utc>) -> Result<ResolvedConfig> {
    let Some(values) = document.get(VALUES_FIELD) else {
        return Ok(ResolvedConfig::new());
    };
    let entries = values.as_object().ok_or_else(|| {
        EngineError::Validation(vec![Violation::document(
            "values_shape",
            format!("'{VALUES_FIELD}' must be an object"),
        )])
    })?;

    let mut resolved = ResolvedConfig::new();
    let mut violations = Vec::new();

    for (key, raw) in entries {
        let entry = match RawConfigEntry::from_json(raw) {
            Ok(entry) => entry,
            Err(e) => {
                violations.push(Violation::entry(key, rule_for(&e), e.to_string()));
                continue;
            }
        };

        // Window filtering happens before coercion: an inactive entry is
        // simply absent from the result.
        if !entry.is_active_at(now) {
            continue;
        }

        match ConfigValue::coerce(entry.kind, &entry.value) {
            Ok(value) => resolved.insert(key.clone(), value),
            Err(e) => violations.push(Violation::entry(key, "value_syntax", e.to_string())),
        }
    }

    if !violations.is_empty() {
        return Err(EngineError::Validation(violations));
    }
    Ok(resolved)
}

fn rule_for(err: &DocumentError) -> &'static str {
    match err {
        DocumentError::UnknownKind(_) => "unknown_type",
        DocumentError::BadWindow { .. } => "window_syntax",
        _ => "entry_shape",
    }
}
