//! The resolved value set.
//!
//! Resolution turns a raw draft document into the effective settings at an
//! instant: window-filtered, type-coerced, sorted by key. The same shape is
//! what snapshots persist and what game clients receive.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::value::{ConfigValue, ValueKind};

/// A sorted mapping from setting key to typed value.
///
/// Backed by a `BTreeMap` so iteration order is lexicographic by key —
/// hashing and diffing depend on that determinism.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedConfig {
    entries: BTreeMap<String, ConfigValue>,
}

/// A snapshot that cannot be decoded. This is corrupted persisted state,
/// not caller error.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not a JSON object")]
    NotAnObject,

    #[error("snapshot entry '{key}' is malformed: {detail}")]
    BadEntry { key: String, detail: String },
}

impl ResolvedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ConfigValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Serialize as `{key: {"type": ..., "value": ...}}`.
    ///
    /// This is the persisted snapshot format and the client response body.
    /// Key order in the serialization follows the map's lexicographic order.
    pub fn to_snapshot_json(&self) -> Value {
        let mut out = serde_json::Map::new();
        for (key, value) in &self.entries {
            let mut entry = serde_json::Map::new();
            entry.insert("type".to_string(), Value::String(value.kind().as_str().to_string()));
            entry.insert("value".to_string(), value.payload_json());
            out.insert(key.clone(), Value::Object(entry));
        }
        Value::Object(out)
    }

    /// Decode a persisted snapshot.
    ///
    /// A malformed entry names the offending key — snapshots are written by
    /// the publish path, so a decode failure means the stored row is
    /// corrupt and the caller must treat it as an integrity violation, not
    /// skip the entry.
    pub fn from_snapshot_json(snapshot: &Value) -> Result<Self, SnapshotError> {
        let obj = snapshot.as_object().ok_or(SnapshotError::NotAnObject)?;
        let mut resolved = Self::new();
        for (key, entry) in obj {
            let entry_obj = entry.as_object().ok_or_else(|| bad(key, "not an object"))?;
            let kind_str = entry_obj
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| bad(key, "missing 'type'"))?;
            let kind = ValueKind::parse(kind_str)
                .ok_or_else(|| bad(key, &format!("unknown type '{kind_str}'")))?;
            let payload = entry_obj
                .get("value")
                .ok_or_else(|| bad(key, "missing 'value'"))?;
            let value = ConfigValue::coerce(kind, payload)
                .map_err(|e| bad(key, &e.to_string()))?;
            resolved.insert(key.clone(), value);
        }
        Ok(resolved)
    }
}

fn bad(key: &str, detail: &str) -> SnapshotError {
    SnapshotError::BadEntry {
        key: key.to_string(),
        detail: detail.to_string(),
    }
}

impl IntoIterator for ResolvedConfig {
    type Item = (String, ConfigValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
