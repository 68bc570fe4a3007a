//! API boundary shapes.
//!
//! These are the response bodies the engine exposes to controllers, the CLI
//! and game clients. All types use serde with camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to the version a draft was materialized from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseVersionRef {
    pub version_id: String,
    pub published_at: DateTime<Utc>,
}

/// The editable draft plus its lifecycle metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftView {
    pub environment_id: String,
    pub draft_json: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_version: Option<BaseVersionRef>,
    /// True when the draft was edited after the last promotion.
    pub is_dirty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_at: Option<DateTime<Utc>>,
}

/// One entry of the version history listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSummary {
    pub id: String,
    pub sequence: i64,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub contract_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_log: Option<String>,
}

/// Full version detail, snapshot included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDetails {
    #[serde(flatten)]
    pub summary: VersionSummary,
    pub snapshot_json: Value,
}

/// Which document a resolve request targets.
///
/// Only `Published` is reachable by untrusted game clients; `Draft` serves
/// editor previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResolveMode {
    Published,
    Draft,
}

impl ResolveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "PUBLISHED",
            Self::Draft => "DRAFT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PUBLISHED" => Some(Self::Published),
            "DRAFT" => Some(Self::Draft),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResolveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One violated draft-validation rule.
///
/// Validation failures always carry the complete list of violations so an
/// editor can highlight every problem in a single round trip.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Offending settings key, when the rule applies to one entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Stable rule identifier (e.g. `number_syntax`, `json_too_large`).
    pub rule: &'static str,
    pub message: String,
}

impl Violation {
    pub fn document(rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            key: None,
            rule,
            message: message.into(),
        }
    }

    pub fn entry(key: impl Into<String>, rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            rule,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(f, "[{}] {}: {}", self.rule, key, self.message),
            None => write!(f, "[{}] {}", self.rule, self.message),
        }
    }
}
