//! Semantic diff between two published snapshots.
//!
//! Classification over the union of keys: added, removed, type-changed,
//! value-changed. Equal entries are suppressed. Comparison is type-aware:
//! NUMBER compares numerically (`"10"` equals `"10.00"`), JSON compares
//! structurally (key order and whitespace never produce a spurious diff).
//! A snapshot entry that cannot be decoded propagates as an integrity
//! failure, never as "same" or "different".

use std::collections::BTreeSet;

use levelset_protocol::{ChangedEntry, ResolvedConfig, VersionDiff, VersionRef};
use serde_json::Value;

use crate::error::{EngineError, Result};

/// Diff two decoded snapshots.
pub fn diff_snapshots(
    from: VersionRef,
    from_snapshot: &Value,
    to: VersionRef,
    to_snapshot: &Value,
) -> Result<VersionDiff> {
    let old = decode(from_snapshot, &from)?;
    let new = decode(to_snapshot, &to)?;

    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut type_changed = Vec::new();
    let mut value_changed = Vec::new();

    // BTreeSet iteration keeps the result deterministic by key.
    for key in keys {
        match (old.get(key), new.get(key)) {
            (None, Some(_)) => added.push(key.clone()),
            (Some(_), None) => removed.push(key.clone()),
            (Some(old_value), Some(new_value)) => {
                if old_value.kind() != new_value.kind() {
                    type_changed.push(ChangedEntry {
                        key: key.clone(),
                        old_type: old_value.kind(),
                        new_type: new_value.kind(),
                        old_value: old_value.payload_json(),
                        new_value: new_value.payload_json(),
                    });
                } else if !old_value.semantically_equals(new_value) {
                    value_changed.push(ChangedEntry {
                        key: key.clone(),
                        old_type: old_value.kind(),
                        new_type: new_value.kind(),
                        old_value: old_value.payload_json(),
                        new_value: new_value.payload_json(),
                    });
                }
                // Equal entries are suppressed entirely
            }
            (None, None) => unreachable!("key came from the union of both maps"),
        }
    }

    Ok(VersionDiff {
        from_version: from,
        to_version: to,
        added,
        removed,
        type_changed,
        value_changed,
    })
}

fn decode(snapshot: &Value, version: &VersionRef) -> Result<ResolvedConfig> {
    ResolvedConfig::from_snapshot_json(snapshot).map_err(|e| {
        EngineError::integrity(format!(
            "snapshot of version {} ({}) is corrupt: {e}",
            version.label, version.version_id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vref(label: &str, sequence: i64) -> VersionRef {
        VersionRef {
            version_id: format!("id-{label}"),
            sequence,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_added_removed_changed() {
        let old = json!({
            "a": {"type": "NUMBER", "value": "1"},
            "b": {"type": "NUMBER", "value": "2"}
        });
        let new = json!({
            "b": {"type": "NUMBER", "value": "3"},
            "c": {"type": "NUMBER", "value": "4"}
        });
        let diff = diff_snapshots(vref("v1", 1), &old, vref("v2", 2), &new).unwrap();
        assert_eq!(diff.added, vec!["c"]);
        assert_eq!(diff.removed, vec!["a"]);
        assert_eq!(diff.value_changed.len(), 1);
        assert_eq!(diff.value_changed[0].key, "b");
        assert!(diff.type_changed.is_empty());
    }

    #[test]
    fn test_numeric_formatting_is_not_a_change() {
        let old = json!({"gold": {"type": "NUMBER", "value": "10"}});
        let new = json!({"gold": {"type": "NUMBER", "value": "10.00"}});
        let diff = diff_snapshots(vref("v1", 1), &old, vref("v2", 2), &new).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_json_key_order_is_not_a_change() {
        let old = json!({"drops": {"type": "JSON", "value": {"a": 1, "b": 2}}});
        let new = json!({"drops": {"type": "JSON", "value": {"b": 2, "a": 1}}});
        let diff = diff_snapshots(vref("v1", 1), &old, vref("v2", 2), &new).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_type_change_is_not_value_compared() {
        let old = json!({"limit": {"type": "NUMBER", "value": "10"}});
        let new = json!({"limit": {"type": "STRING", "value": "10"}});
        let diff = diff_snapshots(vref("v1", 1), &old, vref("v2", 2), &new).unwrap();
        assert_eq!(diff.type_changed.len(), 1);
        assert!(diff.value_changed.is_empty());
        let entry = &diff.type_changed[0];
        assert_eq!(entry.old_type.as_str(), "NUMBER");
        assert_eq!(entry.new_type.as_str(), "STRING");
    }

    #[test]
    fn test_corrupt_snapshot_propagates() {
        let old = json!({"x": {"type": "NUMBER", "value": "not-a-number"}});
        let new = json!({});
        let err = diff_snapshots(vref("v1", 1), &old, vref("v2", 2), &new).unwrap_err();
        assert!(matches!(err, EngineError::Integrity(_)));
        assert!(err.to_string().contains("v1"));
    }

    #[test]
    fn test_result_is_key_ordered() {
        let old = json!({});
        let new = json!({
            "zebra": {"type": "BOOLEAN", "value": true},
            "apple": {"type": "BOOLEAN", "value": true},
            "mango": {"type": "BOOLEAN", "value": true}
        });
        let diff = diff_snapshots(vref("v1", 1), &old, vref("v2", 2), &new).unwrap();
        assert_eq!(diff.added, vec!["apple", "mango", "zebra"]);
    }
}
