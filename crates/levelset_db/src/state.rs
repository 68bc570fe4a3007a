//! Config-state singleton operations (active version pointer + draft).
//!
//! Mutual exclusion per environment is the engine's job (it holds the
//! per-environment lock across the read-modify-write); this layer only
//! does the row reads and writes.

use crate::error::Result;
use crate::types::ConfigState;
use crate::LevelsetDb;
use serde_json::Value;
use sqlx::Row;

impl LevelsetDb {
    /// Get the config-state row for an environment.
    ///
    /// The row is created with the environment, so absence means the
    /// environment itself does not exist.
    pub async fn state_get(&self, environment_id: &str) -> Result<Option<ConfigState>> {
        let row = sqlx::query(
            r#"SELECT environment_id, active_version_id, draft_json,
                      draft_updated_at, draft_updated_by, published_at, published_by
               FROM config_state WHERE environment_id = ?"#,
        )
        .bind(environment_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_state(&row)?)),
            None => Ok(None),
        }
    }

    /// Persist a new draft document with provenance.
    pub async fn state_update_draft(
        &self,
        environment_id: &str,
        draft: &Value,
        updated_by: Option<&str>,
        updated_at_millis: i64,
    ) -> Result<()> {
        let draft_json = serde_json::to_string(draft)?;

        sqlx::query(
            r#"UPDATE config_state
               SET draft_json = ?, draft_updated_at = ?, draft_updated_by = ?
               WHERE environment_id = ?"#,
        )
        .bind(&draft_json)
        .bind(updated_at_millis)
        .bind(updated_by)
        .bind(environment_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Repoint the active version and discard the draft in one statement.
    ///
    /// Promotion always fully overwrites the draft fields, so it cannot
    /// interleave unsafely with a concurrent draft edit regardless of
    /// commit order.
    pub async fn state_promote(
        &self,
        environment_id: &str,
        version_id: &str,
        published_by: &str,
        published_at_millis: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE config_state
               SET active_version_id = ?,
                   published_at = ?,
                   published_by = ?,
                   draft_json = NULL,
                   draft_updated_at = NULL,
                   draft_updated_by = NULL
               WHERE environment_id = ?"#,
        )
        .bind(version_id)
        .bind(published_at_millis)
        .bind(published_by)
        .bind(environment_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_state(row: &sqlx::sqlite::SqliteRow) -> Result<ConfigState> {
    let draft_json: Option<String> = row.get("draft_json");
    let draft_json = match draft_json {
        Some(text) => Some(serde_json::from_str(&text)?),
        None => None,
    };

    let draft_updated_at: Option<i64> = row.get("draft_updated_at");
    let published_at: Option<i64> = row.get("published_at");

    Ok(ConfigState {
        environment_id: row.get("environment_id"),
        active_version_id: row.get("active_version_id"),
        draft_json,
        draft_updated_at: draft_updated_at.map(LevelsetDb::millis_to_datetime),
        draft_updated_by: row.get("draft_updated_by"),
        published_at: published_at.map(LevelsetDb::millis_to_datetime),
        published_by: row.get("published_by"),
    })
}
