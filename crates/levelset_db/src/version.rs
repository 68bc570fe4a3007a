//! Version and snapshot operations.
//!
//! Versions are append-only and never mutated or deleted; rollback
//! reinterprets an old version as newly active, it does not touch rows.

use crate::error::Result;
use crate::types::{ConfigVersion, NewVersion};
use crate::LevelsetDb;
use sqlx::Row;

impl LevelsetDb {
    /// Insert a version and its snapshot atomically.
    ///
    /// A sequence or label collision (two concurrent publishes) rolls the
    /// transaction back and surfaces as `DbError::Conflict` - the caller
    /// recomputes the sequence and retries.
    pub async fn version_insert_with_snapshot(
        &self,
        version: &NewVersion,
        snapshot_json: &str,
    ) -> Result<ConfigVersion> {
        let now = Self::now_millis();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO config_versions
               (id, environment_id, version_sequence, version_label,
                contract_hash, parent_hash, created_at, created_by, change_log)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&version.id)
        .bind(&version.environment_id)
        .bind(version.sequence)
        .bind(&version.label)
        .bind(&version.contract_hash)
        .bind(&version.parent_hash)
        .bind(now)
        .bind(&version.created_by)
        .bind(&version.change_log)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO config_snapshots (version_id, snapshot_json) VALUES (?, ?)")
            .bind(&version.id)
            .bind(snapshot_json)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ConfigVersion {
            id: version.id.clone(),
            environment_id: version.environment_id.clone(),
            sequence: version.sequence,
            label: version.label.clone(),
            contract_hash: version.contract_hash.clone(),
            parent_hash: version.parent_hash.clone(),
            created_at: Self::millis_to_datetime(now),
            created_by: version.created_by.clone(),
            change_log: version.change_log.clone(),
        })
    }

    /// Highest sequence published for an environment (0 when none).
    pub async fn version_max_sequence(&self, environment_id: &str) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(version_sequence), 0) AS max_seq FROM config_versions WHERE environment_id = ?",
        )
        .bind(environment_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("max_seq"))
    }

    /// The most recently published version of an environment, if any.
    pub async fn version_head(&self, environment_id: &str) -> Result<Option<ConfigVersion>> {
        let row = sqlx::query(
            r#"SELECT id, environment_id, version_sequence, version_label, contract_hash,
                      parent_hash, created_at, created_by, change_log
               FROM config_versions WHERE environment_id = ?
               ORDER BY version_sequence DESC LIMIT 1"#,
        )
        .bind(environment_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_version(&row)?)),
            None => Ok(None),
        }
    }

    /// Get a version by ID.
    pub async fn version_get(&self, version_id: &str) -> Result<Option<ConfigVersion>> {
        let row = sqlx::query(
            r#"SELECT id, environment_id, version_sequence, version_label, contract_hash,
                      parent_hash, created_at, created_by, change_log
               FROM config_versions WHERE id = ?"#,
        )
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_version(&row)?)),
            None => Ok(None),
        }
    }

    /// List all versions of an environment, newest first.
    pub async fn version_list(&self, environment_id: &str) -> Result<Vec<ConfigVersion>> {
        let rows = sqlx::query(
            r#"SELECT id, environment_id, version_sequence, version_label, contract_hash,
                      parent_hash, created_at, created_by, change_log
               FROM config_versions WHERE environment_id = ?
               ORDER BY version_sequence DESC"#,
        )
        .bind(environment_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_version).collect()
    }

    /// Fetch the snapshot JSON for a version.
    pub async fn snapshot_get(&self, version_id: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT snapshot_json FROM config_snapshots WHERE version_id = ?")
            .bind(version_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("snapshot_json")))
    }
}

fn row_to_version(row: &sqlx::sqlite::SqliteRow) -> Result<ConfigVersion> {
    let created_at: i64 = row.get("created_at");
    Ok(ConfigVersion {
        id: row.get("id"),
        environment_id: row.get("environment_id"),
        sequence: row.get("version_sequence"),
        label: row.get("version_label"),
        contract_hash: row.get("contract_hash"),
        parent_hash: row.get("parent_hash"),
        created_at: LevelsetDb::millis_to_datetime(created_at),
        created_by: row.get("created_by"),
        change_log: row.get("change_log"),
    })
}
