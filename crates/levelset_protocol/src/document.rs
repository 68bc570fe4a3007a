//! The raw draft document.
//!
//! A draft is stored as loose JSON (administrators edit it through RFC 6902
//! patches), shaped as:
//!
//! ```json
//! {
//!   "values": {
//!     "max_party_size": { "type": "NUMBER", "value": "4" },
//!     "winter_event":   { "type": "BOOLEAN", "value": true,
//!                         "activeFrom": "2026-12-01T00:00:00Z",
//!                         "activeUntil": "2027-01-07T00:00:00Z" }
//!   }
//! }
//! ```
//!
//! Entries are only given structure when read: the validator and the
//! resolver both go through [`RawConfigEntry::from_json`] so the two agree
//! on what a well-formed entry is.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::value::ValueKind;

/// Field holding the settings map inside a draft document.
pub const VALUES_FIELD: &str = "values";

const TYPE_FIELD: &str = "type";
const VALUE_FIELD: &str = "value";
const ACTIVE_FROM_FIELD: &str = "activeFrom";
const ACTIVE_UNTIL_FIELD: &str = "activeUntil";

/// Structural problems with a single draft entry.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("entry is not an object")]
    EntryNotObject,

    #[error("entry is missing '{0}'")]
    MissingField(&'static str),

    #[error("'{TYPE_FIELD}' must be a string, got {0}")]
    TypeNotString(Value),

    #[error("Unknown value type: {0}")]
    UnknownKind(String),

    #[error("'{field}' is not an RFC 3339 instant: {detail}")]
    BadWindow { field: &'static str, detail: String },
}

/// One parsed entry of a draft's `values` map.
///
/// The payload is left raw here; coercion by kind happens at the
/// consumption site (validator, resolver).
#[derive(Debug, Clone)]
pub struct RawConfigEntry {
    pub kind: ValueKind,
    pub value: Value,
    pub active_from: Option<DateTime<Utc>>,
    pub active_until: Option<DateTime<Utc>>,
}

impl RawConfigEntry {
    /// Parse a single entry of the `values` map.
    pub fn from_json(entry: &Value) -> Result<Self, DocumentError> {
        let obj = entry.as_object().ok_or(DocumentError::EntryNotObject)?;

        let kind_value = obj
            .get(TYPE_FIELD)
            .ok_or(DocumentError::MissingField(TYPE_FIELD))?;
        let kind_str = kind_value
            .as_str()
            .ok_or_else(|| DocumentError::TypeNotString(kind_value.clone()))?;
        let kind = ValueKind::parse(kind_str)
            .ok_or_else(|| DocumentError::UnknownKind(kind_str.to_string()))?;

        let value = obj
            .get(VALUE_FIELD)
            .ok_or(DocumentError::MissingField(VALUE_FIELD))?
            .clone();

        let active_from = parse_window(obj, ACTIVE_FROM_FIELD)?;
        let active_until = parse_window(obj, ACTIVE_UNTIL_FIELD)?;

        Ok(Self {
            kind,
            value,
            active_from,
            active_until,
        })
    }

    /// Whether the entry is effective at `now`.
    ///
    /// `activeFrom` is inclusive and `activeUntil` is exclusive: an entry
    /// becomes active exactly at its start instant, and is already inactive
    /// exactly at its end instant.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if let Some(from) = self.active_from {
            if from > now {
                return false;
            }
        }
        if let Some(until) = self.active_until {
            if until <= now {
                return false;
            }
        }
        true
    }
}

fn parse_window(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, DocumentError> {
    let Some(raw) = obj.get(field) else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let text = raw.as_str().ok_or_else(|| DocumentError::BadWindow {
        field,
        detail: format!("expected a string, got {raw}"),
    })?;
    let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| DocumentError::BadWindow {
        field,
        detail: e.to_string(),
    })?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

/// An empty draft document: `{"values": {}}`.
pub fn empty_document() -> Value {
    serde_json::json!({ VALUES_FIELD: {} })
}
