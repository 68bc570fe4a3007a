//! The Levelset configuration engine.
//!
//! Turns an editable per-environment draft into durable, comparable,
//! time-aware configuration versions:
//!
//! - [`resolve`] computes the effective value set of a raw document at an
//!   instant (window-filtered, type-coerced, key-sorted).
//! - [`contract`] hashes a resolved set's key->type contract for lineage.
//! - [`diff`] semantically compares two published snapshots.
//! - [`DraftService`] owns the single mutable draft per environment.
//! - [`VersionService`] publishes, promotes, rolls back and queries
//!   immutable versions.
//!
//! All mutation of an environment's draft/active-version state goes through
//! a per-environment exclusive lock; publishing is lock-free and relies on
//! the database uniqueness constraint as its race backstop.

pub mod audit;
pub mod contract;
pub mod diff;
pub mod draft;
pub mod error;
pub mod locks;
pub mod patch;
pub mod resolve;
pub mod validate;
pub mod version;

pub use audit::{AuditAction, AuditEvent, AuditSink, LogAuditSink};
pub use draft::DraftService;
pub use error::{EngineError, Result};
pub use locks::EnvLockRegistry;
pub use version::VersionService;

use std::sync::Arc;

use levelset_db::LevelsetDb;

/// The engine's two services wired over one database handle, one lock
/// registry and one audit sink.
#[derive(Clone)]
pub struct ConfigServices {
    pub drafts: DraftService,
    pub versions: VersionService,
}

impl ConfigServices {
    /// Build services with the default (tracing-backed) audit sink.
    pub fn new(db: LevelsetDb) -> Self {
        Self::with_audit_sink(db, Arc::new(LogAuditSink))
    }

    /// Build services with a custom audit sink.
    pub fn with_audit_sink(db: LevelsetDb, audit: Arc<dyn AuditSink>) -> Self {
        let locks = EnvLockRegistry::new();
        Self {
            drafts: DraftService::new(db.clone(), locks.clone(), Arc::clone(&audit)),
            versions: VersionService::new(db, locks, audit),
        }
    }
}
