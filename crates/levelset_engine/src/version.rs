//! Version service: publish, promote, rollback and query immutable
//! configuration versions.
//!
//! Publishing only creates history - it never promotes and never touches
//! the draft. Promotion repoints the active version and discards the draft
//! under the environment's exclusive lock. Rollback is promotion of a
//! previously published version, kept as a distinct operation for
//! auditability.

use std::sync::Arc;

use chrono::Utc;
use levelset_db::{ConfigState, ConfigVersion, DbError, LevelsetDb, NewVersion};
use levelset_protocol::{
    ResolveMode, ResolvedConfig, VersionDetails, VersionDiff, VersionRef, VersionSummary,
};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::error::{EngineError, Result};
use crate::locks::EnvLockRegistry;
use crate::{contract, diff, resolve};

/// Attempts before a sequence-allocation race surfaces as a Conflict.
const PUBLISH_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct VersionService {
    db: LevelsetDb,
    locks: EnvLockRegistry,
    audit: Arc<dyn AuditSink>,
}

impl VersionService {
    pub fn new(db: LevelsetDb, locks: EnvLockRegistry, audit: Arc<dyn AuditSink>) -> Self {
        Self { db, locks, audit }
    }

    /// Publish the environment's draft as a new immutable version.
    ///
    /// Resolves the draft (not the active snapshot) at the current instant,
    /// allocates the next sequence, links the contract-hash lineage and
    /// persists version + snapshot atomically. Lock-free with respect to
    /// promotion: only appends immutable rows, with the uniqueness
    /// constraint as the race backstop.
    pub async fn publish_new_version(
        &self,
        user_id: &str,
        environment_id: &str,
        notes: Option<String>,
    ) -> Result<ConfigVersion> {
        self.ensure_environment(environment_id).await?;
        let state = self.require_state(environment_id).await?;
        let draft = state.draft_json.ok_or_else(|| {
            EngineError::Conflict(format!(
                "environment {environment_id} has no draft to publish"
            ))
        })?;

        let resolved = resolve::resolve_document(&draft, Utc::now())?;
        let contract_hash = contract::contract_hash(&resolved);
        let snapshot_value = resolved.to_snapshot_json();
        let snapshot_json = serde_json::to_string(&snapshot_value)?;

        let mut last_conflict = String::new();
        for attempt in 1..=PUBLISH_ATTEMPTS {
            let head = self.db.version_head(environment_id).await?;
            let (sequence, parent_hash) = match &head {
                Some(head) => (head.sequence + 1, Some(head.contract_hash.clone())),
                None => (1, None),
            };

            let new_version = NewVersion {
                id: Uuid::new_v4().to_string(),
                environment_id: environment_id.to_string(),
                sequence,
                label: format!("v{sequence}"),
                contract_hash: contract_hash.clone(),
                parent_hash,
                created_by: user_id.to_string(),
                change_log: notes.clone(),
            };

            match self
                .db
                .version_insert_with_snapshot(&new_version, &snapshot_json)
                .await
            {
                Ok(version) => {
                    self.audit.emit(AuditEvent {
                        environment_id: environment_id.to_string(),
                        subject_id: version.id.clone(),
                        changed_by: user_id.to_string(),
                        action: AuditAction::VersionPublished,
                        change_description: format!("published {}", version.label),
                        snapshot_json: Some(snapshot_value.clone()),
                        occurred_at: Utc::now(),
                    });
                    info!(
                        environment_id,
                        label = %version.label,
                        contract_hash = %version.contract_hash,
                        "Published configuration version"
                    );
                    return Ok(version);
                }
                Err(DbError::Conflict(msg)) => {
                    debug!(environment_id, attempt, "Publish lost sequence race, retrying");
                    last_conflict = msg;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::Conflict(last_conflict))
    }

    /// Make a version the environment's active one.
    ///
    /// Clears the draft: its purpose was to produce exactly this version or
    /// an ancestor of it. Promoting an older version than the current
    /// active one is permitted.
    pub async fn promote_version(
        &self,
        environment_id: &str,
        version_id: &str,
        promoted_by: &str,
    ) -> Result<()> {
        self.activate(
            environment_id,
            version_id,
            promoted_by,
            AuditAction::VersionPromoted,
        )
        .await
    }

    /// Roll back to a previously published version.
    ///
    /// Semantically identical to promotion; recorded under its own audit
    /// action.
    pub async fn rollback_to_version(
        &self,
        environment_id: &str,
        version_id: &str,
        user_id: &str,
    ) -> Result<()> {
        self.activate(
            environment_id,
            version_id,
            user_id,
            AuditAction::VersionRolledBack,
        )
        .await
    }

    async fn activate(
        &self,
        environment_id: &str,
        version_id: &str,
        user_id: &str,
        action: AuditAction,
    ) -> Result<()> {
        self.ensure_environment(environment_id).await?;
        let version = self.require_version_in_env(environment_id, version_id).await?;

        // A published version without a snapshot is a broken invariant.
        let snapshot_text = self.db.snapshot_get(version_id).await?.ok_or_else(|| {
            EngineError::integrity(format!(
                "version {} ({version_id}) has no snapshot",
                version.label
            ))
        })?;

        // Same lock tier as draft mutation: a promotion cannot race a
        // concurrent edit, and it fully overwrites the draft fields.
        let _guard = self.locks.acquire(environment_id).await;
        self.db
            .state_promote(
                environment_id,
                version_id,
                user_id,
                LevelsetDb::now_millis(),
            )
            .await?;

        self.audit.emit(AuditEvent {
            environment_id: environment_id.to_string(),
            subject_id: version_id.to_string(),
            changed_by: user_id.to_string(),
            action,
            change_description: format!("activated {}", version.label),
            snapshot_json: serde_json::from_str(&snapshot_text).ok(),
            occurred_at: Utc::now(),
        });
        info!(
            environment_id,
            version_id,
            label = %version.label,
            action = action.as_str(),
            "Activated configuration version"
        );
        Ok(())
    }

    /// The currently active version's summary, or None when unpublished.
    pub async fn get_active_version(
        &self,
        environment_id: &str,
    ) -> Result<Option<VersionSummary>> {
        self.ensure_environment(environment_id).await?;
        let state = self.require_state(environment_id).await?;
        let Some(active_id) = state.active_version_id.clone() else {
            return Ok(None);
        };
        let version = self.db.version_get(&active_id).await?.ok_or_else(|| {
            EngineError::integrity(format!("active version {active_id} does not exist"))
        })?;
        Ok(Some(summarize(&version, &state)))
    }

    /// All versions of an environment, newest first. Exactly one entry is
    /// marked active (or none, when unpublished).
    pub async fn list_all_versions(&self, environment_id: &str) -> Result<Vec<VersionSummary>> {
        self.ensure_environment(environment_id).await?;
        let state = self.require_state(environment_id).await?;
        let versions = self.db.version_list(environment_id).await?;
        Ok(versions.iter().map(|v| summarize(v, &state)).collect())
    }

    /// Full detail of one version, snapshot included.
    pub async fn get_version_details(
        &self,
        environment_id: &str,
        version_id: &str,
    ) -> Result<VersionDetails> {
        self.ensure_environment(environment_id).await?;
        let state = self.require_state(environment_id).await?;
        let version = self.require_version_in_env(environment_id, version_id).await?;
        let snapshot_json = self.load_snapshot_value(&version).await?;
        Ok(VersionDetails {
            summary: summarize(&version, &state),
            snapshot_json,
        })
    }

    /// Semantic diff between two versions of the same environment.
    pub async fn diff_versions(
        &self,
        environment_id: &str,
        from_id: &str,
        to_id: &str,
    ) -> Result<VersionDiff> {
        self.ensure_environment(environment_id).await?;
        let from = self.require_version_in_env(environment_id, from_id).await?;
        let to = self.require_version_in_env(environment_id, to_id).await?;
        let from_snapshot = self.load_snapshot_value(&from).await?;
        let to_snapshot = self.load_snapshot_value(&to).await?;
        diff::diff_snapshots(
            version_ref(&from),
            &from_snapshot,
            version_ref(&to),
            &to_snapshot,
        )
    }

    /// The effective value set an environment serves.
    ///
    /// PUBLISHED decodes the active version's snapshot (the only mode
    /// reachable by untrusted game clients); DRAFT resolves the current
    /// draft document at the current instant for editor previews.
    pub async fn resolve(
        &self,
        environment_id: &str,
        mode: ResolveMode,
    ) -> Result<ResolvedConfig> {
        self.ensure_environment(environment_id).await?;
        let state = self.require_state(environment_id).await?;

        match mode {
            ResolveMode::Published => {
                let Some(active_id) = state.active_version_id.clone() else {
                    return Err(EngineError::not_found("active version", environment_id));
                };
                let version = self.db.version_get(&active_id).await?.ok_or_else(|| {
                    EngineError::integrity(format!("active version {active_id} does not exist"))
                })?;
                let snapshot = self.load_snapshot_value(&version).await?;
                ResolvedConfig::from_snapshot_json(&snapshot).map_err(|e| {
                    EngineError::integrity(format!(
                        "active snapshot of {} is corrupt: {e}",
                        version.label
                    ))
                })
            }
            ResolveMode::Draft => match &state.draft_json {
                Some(doc) => resolve::resolve_document(doc, Utc::now()),
                None => Ok(ResolvedConfig::new()),
            },
        }
    }

    async fn load_snapshot_value(&self, version: &ConfigVersion) -> Result<Value> {
        let text = self.db.snapshot_get(&version.id).await?.ok_or_else(|| {
            EngineError::integrity(format!(
                "version {} ({}) has no snapshot",
                version.label, version.id
            ))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            EngineError::integrity(format!(
                "snapshot of version {} is not JSON: {e}",
                version.label
            ))
        })
    }

    async fn require_version_in_env(
        &self,
        environment_id: &str,
        version_id: &str,
    ) -> Result<ConfigVersion> {
        let version = self
            .db
            .version_get(version_id)
            .await?
            .ok_or_else(|| EngineError::not_found("version", version_id))?;
        if version.environment_id != environment_id {
            // A version belonging to another environment is not visible here
            return Err(EngineError::not_found("version", version_id));
        }
        Ok(version)
    }

    async fn ensure_environment(&self, environment_id: &str) -> Result<()> {
        if self.db.env_exists(environment_id).await? {
            Ok(())
        } else {
            Err(EngineError::not_found("environment", environment_id))
        }
    }

    async fn require_state(&self, environment_id: &str) -> Result<ConfigState> {
        self.db.state_get(environment_id).await?.ok_or_else(|| {
            EngineError::integrity(format!(
                "environment {environment_id} has no config_state row"
            ))
        })
    }
}

fn summarize(version: &ConfigVersion, state: &ConfigState) -> VersionSummary {
    let is_active = state.active_version_id.as_deref() == Some(version.id.as_str());
    VersionSummary {
        id: version.id.clone(),
        sequence: version.sequence,
        label: version.label.clone(),
        created_at: version.created_at,
        created_by: version.created_by.clone(),
        is_active,
        published_at: if is_active { state.published_at } else { None },
        contract_hash: version.contract_hash.clone(),
        parent_hash: version.parent_hash.clone(),
        change_log: version.change_log.clone(),
    }
}

fn version_ref(version: &ConfigVersion) -> VersionRef {
    VersionRef {
        version_id: version.id.clone(),
        sequence: version.sequence,
        label: version.label.clone(),
    }
}
