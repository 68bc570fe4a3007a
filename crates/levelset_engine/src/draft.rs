//! Draft service: owns the single mutable draft per environment.
//!
//! A draft is born lazily on first read (materialized from the active
//! version's snapshot, or an empty document) and is destroyed the moment a
//! promotion succeeds. All draft mutation happens under the environment's
//! exclusive lock.

use std::sync::Arc;

use chrono::Utc;
use levelset_db::{ConfigState, LevelsetDb};
use levelset_protocol::{
    document, BaseVersionRef, DraftView, ResolvedConfig, VALUES_FIELD,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::error::{EngineError, Result};
use crate::locks::EnvLockRegistry;
use crate::{patch, validate};

#[derive(Clone)]
pub struct DraftService {
    db: LevelsetDb,
    locks: EnvLockRegistry,
    audit: Arc<dyn AuditSink>,
}

impl DraftService {
    pub fn new(db: LevelsetDb, locks: EnvLockRegistry, audit: Arc<dyn AuditSink>) -> Self {
        Self { db, locks, audit }
    }

    /// Fetch the environment's draft, materializing it on first access.
    ///
    /// Idempotent: when a draft already exists this is a pure read. The
    /// exclusive lock prevents two initializations racing to both
    /// materialize.
    pub async fn fetch_or_initialize(&self, environment_id: &str) -> Result<DraftView> {
        self.ensure_environment(environment_id).await?;
        let _guard = self.locks.acquire(environment_id).await;

        let state = self.require_state(environment_id).await?;
        if state.has_draft() {
            return Ok(draft_view(state));
        }

        let document = self.base_document(&state).await?;
        let now = LevelsetDb::now_millis();
        self.db
            .state_update_draft(environment_id, &document, None, now)
            .await?;
        debug!(environment_id, "Draft materialized");

        let state = self.require_state(environment_id).await?;
        Ok(draft_view(state))
    }

    /// Apply RFC 6902 operations to the environment's draft.
    ///
    /// Full-or-nothing: a structural patch failure or any semantic
    /// violation rejects the whole patch and leaves the persisted draft
    /// untouched. Violations are reported completely, not first-only.
    pub async fn apply_patch(
        &self,
        user_id: &str,
        environment_id: &str,
        ops: &Value,
    ) -> Result<DraftView> {
        self.ensure_environment(environment_id).await?;
        let _guard = self.locks.acquire(environment_id).await;

        let state = self.require_state(environment_id).await?;
        let base = match &state.draft_json {
            Some(doc) => doc.clone(),
            None => self.base_document(&state).await?,
        };

        let patched = patch::apply_patch(&base, ops)?;

        let violations = validate::validate_document(&patched);
        if !violations.is_empty() {
            return Err(EngineError::Validation(violations));
        }

        let now = LevelsetDb::now_millis();
        self.db
            .state_update_draft(environment_id, &patched, Some(user_id), now)
            .await?;

        self.audit.emit(AuditEvent {
            environment_id: environment_id.to_string(),
            subject_id: environment_id.to_string(),
            changed_by: user_id.to_string(),
            action: AuditAction::DraftUpdated,
            change_description: "draft updated via patch".to_string(),
            snapshot_json: None,
            occurred_at: Utc::now(),
        });

        let state = self.require_state(environment_id).await?;
        Ok(draft_view(state))
    }

    /// The document a fresh draft starts from: the active version's
    /// snapshot reshaped into a raw values document, or an empty document
    /// when the environment has never been promoted.
    async fn base_document(&self, state: &ConfigState) -> Result<Value> {
        match state.active_version_id.as_deref() {
            Some(version_id) => {
                let resolved = self.load_snapshot(version_id).await?;
                Ok(document_from_resolved(&resolved))
            }
            None => Ok(document::empty_document()),
        }
    }

    async fn load_snapshot(&self, version_id: &str) -> Result<ResolvedConfig> {
        let text = self.db.snapshot_get(version_id).await?.ok_or_else(|| {
            EngineError::integrity(format!("active version {version_id} has no snapshot"))
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|e| {
            EngineError::integrity(format!("snapshot of version {version_id} is not JSON: {e}"))
        })?;
        ResolvedConfig::from_snapshot_json(&value).map_err(|e| {
            EngineError::integrity(format!("snapshot of version {version_id} is corrupt: {e}"))
        })
    }

    async fn ensure_environment(&self, environment_id: &str) -> Result<()> {
        if self.db.env_exists(environment_id).await? {
            Ok(())
        } else {
            Err(EngineError::not_found("environment", environment_id))
        }
    }

    async fn require_state(&self, environment_id: &str) -> Result<ConfigState> {
        // The config_state row is created with the environment; its absence
        // for an existing environment is corruption, not caller error.
        self.db.state_get(environment_id).await?.ok_or_else(|| {
            EngineError::integrity(format!(
                "environment {environment_id} has no config_state row"
            ))
        })
    }
}

/// Reshape a resolved set back into an editable values document.
///
/// Activation windows were consumed at publish time and do not survive into
/// the snapshot, so materialized entries carry only type and value.
fn document_from_resolved(resolved: &ResolvedConfig) -> Value {
    json!({ VALUES_FIELD: resolved.to_snapshot_json() })
}

fn draft_view(state: ConfigState) -> DraftView {
    let is_dirty = state.is_dirty();
    let base_version = match (&state.active_version_id, state.published_at) {
        (Some(version_id), Some(published_at)) => Some(BaseVersionRef {
            version_id: version_id.clone(),
            published_at,
        }),
        _ => None,
    };
    DraftView {
        environment_id: state.environment_id,
        draft_json: state.draft_json.unwrap_or_else(document::empty_document),
        base_version,
        is_dirty,
        last_modified_at: state.draft_updated_at,
    }
}
