//! Environment database operations.
//!
//! The collaborator boundary this core consumes: existence checks and
//! minimal creation (which also seeds the config_state singleton row).

use crate::error::Result;
use crate::types::Environment;
use crate::LevelsetDb;
use sqlx::Row;
use uuid::Uuid;

impl LevelsetDb {
    /// Create an environment and its config_state singleton atomically.
    pub async fn env_create(&self, project_id: &str, name: &str) -> Result<Environment> {
        let id = Uuid::new_v4().to_string();
        let now = Self::now_millis();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO environments (id, project_id, name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(project_id)
        .bind(name)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // The singleton lives for the environment's lifetime; everything in
        // it starts null (no draft, no active version).
        sqlx::query("INSERT INTO config_state (environment_id) VALUES (?)")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Environment {
            id,
            project_id: project_id.to_string(),
            name: name.to_string(),
            created_at: Self::millis_to_datetime(now),
        })
    }

    /// Check whether an environment exists.
    pub async fn env_exists(&self, id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM environments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Get an environment by ID.
    pub async fn env_get(&self, id: &str) -> Result<Option<Environment>> {
        let row = sqlx::query(
            "SELECT id, project_id, name, created_at FROM environments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_environment(&row)?)),
            None => Ok(None),
        }
    }

    /// List all environments.
    pub async fn env_list(&self) -> Result<Vec<Environment>> {
        let rows = sqlx::query(
            "SELECT id, project_id, name, created_at FROM environments ORDER BY project_id, name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_environment).collect()
    }
}

fn row_to_environment(row: &sqlx::sqlite::SqliteRow) -> Result<Environment> {
    let created_at: i64 = row.get("created_at");
    Ok(Environment {
        id: row.get("id"),
        project_id: row.get("project_id"),
        name: row.get("name"),
        created_at: LevelsetDb::millis_to_datetime(created_at),
    })
}
