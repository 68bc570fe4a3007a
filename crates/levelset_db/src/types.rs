//! Row models for all Levelset database entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An environment of a project (e.g. `production`, `staging`).
///
/// Environment CRUD proper belongs to the admin plane; this core only needs
/// identity and existence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The per-environment configuration singleton: the active version pointer
/// and the mutable draft. Exactly one row per environment, created at
/// environment-creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigState {
    pub environment_id: String,
    pub active_version_id: Option<String>,
    pub draft_json: Option<Value>,
    pub draft_updated_at: Option<DateTime<Utc>>,
    pub draft_updated_by: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub published_by: Option<String>,
}

impl ConfigState {
    /// True when a draft exists, a promotion has happened, and the draft was
    /// edited after that promotion.
    pub fn is_dirty(&self) -> bool {
        match (self.draft_json.as_ref(), self.draft_updated_at, self.published_at) {
            (Some(_), Some(updated), Some(published)) => updated > published,
            _ => false,
        }
    }

    /// True when a draft document is materialized.
    pub fn has_draft(&self) -> bool {
        self.draft_json.is_some()
    }
}

/// An immutable published version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigVersion {
    pub id: String,
    pub environment_id: String,
    /// Monotonic per environment, starting at 1.
    pub sequence: i64,
    /// Human label, `v{sequence}`.
    pub label: String,
    /// Digest over the key->type contract at publish time.
    pub contract_hash: String,
    /// Contract hash of the previous version; None for the first.
    pub parent_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub change_log: Option<String>,
}

/// Parameters for inserting a new version + snapshot pair.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub id: String,
    pub environment_id: String,
    pub sequence: i64,
    pub label: String,
    pub contract_hash: String,
    pub parent_hash: Option<String>,
    pub created_by: String,
    pub change_log: Option<String>,
}
