//! Audit event boundary.
//!
//! Successful mutations emit an event to a sink consumed asynchronously by
//! the audit plane. Delivery is best-effort from this core's viewpoint:
//! emission never blocks and never fails the primary mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DraftUpdated,
    VersionPublished,
    VersionPromoted,
    VersionRolledBack,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DraftUpdated => "draft_updated",
            Self::VersionPublished => "version_published",
            Self::VersionPromoted => "version_promoted",
            Self::VersionRolledBack => "version_rolled_back",
        }
    }
}

/// One outbound audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub environment_id: String,
    /// Version id or config key the change applies to.
    pub subject_id: String,
    pub changed_by: String,
    pub action: AuditAction,
    pub change_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_json: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

/// Outbound audit sink.
///
/// Implementations must not block the caller; a sink that forwards to a
/// queue or network should hand off and return.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Default sink: records events to the tracing pipeline.
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            environment_id = %event.environment_id,
            subject_id = %event.subject_id,
            changed_by = %event.changed_by,
            action = event.action.as_str(),
            "{}",
            event.change_description
        );
    }
}
