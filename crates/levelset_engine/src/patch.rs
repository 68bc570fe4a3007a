//! RFC 6902 patch application.
//!
//! A pure function `(document, ops) -> document | error`. The patch is
//! applied to a scratch copy in full-or-nothing fashion: a structural
//! failure (invalid path, bad operation) reports the offending operation
//! and leaves the input untouched. Semantic validation of the result is the
//! caller's job.

use levelset_protocol::Violation;
use serde_json::Value;

use crate::error::{EngineError, Result};

/// Apply JSON Patch operations to a document, returning the patched copy.
pub fn apply_patch(document: &Value, ops: &Value) -> Result<Value> {
    let patch: json_patch::Patch = serde_json::from_value(ops.clone()).map_err(|e| {
        EngineError::Validation(vec![Violation::document(
            "patch_structure",
            format!("patch is not a valid RFC 6902 document: {e}"),
        )])
    })?;

    let mut working = document.clone();
    json_patch::patch(&mut working, &patch).map_err(|e| {
        EngineError::Validation(vec![Violation::document(
            "patch_structure",
            format!("patch could not be applied: {e}"),
        )])
    })?;

    Ok(working)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_add_and_replace() {
        let doc = json!({"values": {"a": {"type": "STRING", "value": "old"}}});
        let ops = json!([
            {"op": "replace", "path": "/values/a/value", "value": "new"},
            {"op": "add", "path": "/values/b",
             "value": {"type": "BOOLEAN", "value": true}}
        ]);
        let patched = apply_patch(&doc, &ops).unwrap();
        assert_eq!(patched["values"]["a"]["value"], "new");
        assert_eq!(patched["values"]["b"]["type"], "BOOLEAN");
        // Input untouched
        assert_eq!(doc["values"]["a"]["value"], "old");
    }

    #[test]
    fn test_bad_path_fails_whole_patch() {
        let doc = json!({"values": {"a": {"type": "STRING", "value": "old"}}});
        let ops = json!([
            {"op": "replace", "path": "/values/a/value", "value": "new"},
            {"op": "remove", "path": "/values/missing"}
        ]);
        let err = apply_patch(&doc, &ops).unwrap_err();
        let violations = err.violations().unwrap();
        assert_eq!(violations[0].rule, "patch_structure");
        // First op must not have leaked into the document
        assert_eq!(doc["values"]["a"]["value"], "old");
    }

    #[test]
    fn test_malformed_patch_document() {
        let doc = json!({});
        let err = apply_patch(&doc, &json!([{"op": "teleport", "path": "/x"}])).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
