//! Version diff result types.
//!
//! Produced by the diff calculator when comparing two published snapshots.
//! Key lists are lexicographically ordered; unchanged keys are suppressed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::ValueKind;

/// Identity of one side of a diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRef {
    pub version_id: String,
    pub sequence: i64,
    pub label: String,
}

/// One key whose type or value changed between two versions.
///
/// For a pure value change `old_type == new_type`; a type change reports
/// both sides' payloads but never compares them (value comparison is
/// meaningless across types).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedEntry {
    pub key: String,
    pub old_type: ValueKind,
    pub new_type: ValueKind,
    pub old_value: Value,
    pub new_value: Value,
}

/// Semantic diff between two published snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDiff {
    pub from_version: VersionRef,
    pub to_version: VersionRef,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub type_changed: Vec<ChangedEntry>,
    pub value_changed: Vec<ChangedEntry>,
}

impl VersionDiff {
    /// True when the two snapshots are semantically identical.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.type_changed.is_empty()
            && self.value_changed.is_empty()
    }
}
