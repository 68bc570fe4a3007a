//! Shared data model for Levelset remote configuration.
//!
//! Settings are typed key/value pairs. Administrators edit a mutable draft
//! document; publishing resolves it into an immutable, content-hashed
//! snapshot that game clients read. This crate holds the types every
//! interface (engine, CLI, API surface) agrees on.

pub mod api;
pub mod diff;
pub mod document;
pub mod resolved;
pub mod value;

// Re-export types for convenience
pub use api::{
    BaseVersionRef, DraftView, ResolveMode, VersionDetails, VersionSummary, Violation,
};
pub use diff::{ChangedEntry, VersionDiff, VersionRef};
pub use document::{DocumentError, RawConfigEntry, VALUES_FIELD};
pub use resolved::{ResolvedConfig, SnapshotError};
pub use value::{ConfigValue, ValueError, ValueKind};
