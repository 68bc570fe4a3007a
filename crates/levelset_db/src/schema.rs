//! Database schema creation for all Levelset tables.
//!
//! All CREATE TABLE statements live here - single source of truth.

use crate::error::Result;
use crate::LevelsetDb;
use tracing::info;

impl LevelsetDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        // Enable WAL mode for better concurrent access
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&self.pool)
            .await?;
        sqlx::query("PRAGMA foreign_keys=ON")
            .execute(&self.pool)
            .await?;

        self.create_environment_tables().await?;
        self.create_config_tables().await?;

        info!("Database schema verified");
        Ok(())
    }

    /// Create environment tables
    async fn create_environment_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS environments (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(project_id, name)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_environments_project ON environments(project_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Create configuration tables (versions, snapshots, draft state)
    async fn create_config_tables(&self) -> Result<()> {
        // Published versions: immutable, append-only. The unique constraint
        // on (environment_id, version_sequence) is the backstop for
        // concurrent publish races.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS config_versions (
                id TEXT PRIMARY KEY,
                environment_id TEXT NOT NULL REFERENCES environments(id),
                version_sequence INTEGER NOT NULL,
                version_label TEXT NOT NULL,
                contract_hash TEXT NOT NULL,
                parent_hash TEXT,
                created_at INTEGER NOT NULL,
                created_by TEXT NOT NULL,
                change_log TEXT,
                UNIQUE(environment_id, version_sequence),
                UNIQUE(environment_id, version_label)
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Per-environment singleton: active version pointer + mutable draft.
        // One row per environment, created alongside the environment.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS config_state (
                environment_id TEXT PRIMARY KEY REFERENCES environments(id),
                active_version_id TEXT REFERENCES config_versions(id),
                draft_json TEXT,
                draft_updated_at INTEGER,
                draft_updated_by TEXT,
                published_at INTEGER,
                published_by TEXT
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Resolved value sets, 1:1 with versions.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS config_snapshots (
                version_id TEXT PRIMARY KEY REFERENCES config_versions(id),
                snapshot_json TEXT NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_versions_environment ON config_versions(environment_id, version_sequence DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
