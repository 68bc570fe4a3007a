//! Storage-layer tests over a temporary database.

use levelset_db::{DbError, LevelsetDb, NewVersion};
use serde_json::json;
use tempfile::TempDir;

async fn open_db() -> (TempDir, LevelsetDb) {
    let tmp = TempDir::new().unwrap();
    let db = LevelsetDb::open(tmp.path().join("test.sqlite3")).await.unwrap();
    (tmp, db)
}

fn new_version(env_id: &str, sequence: i64) -> NewVersion {
    NewVersion {
        id: format!("ver-{env_id}-{sequence}"),
        environment_id: env_id.to_string(),
        sequence,
        label: format!("v{sequence}"),
        contract_hash: "abc123".to_string(),
        parent_hash: None,
        created_by: "tester".to_string(),
        change_log: None,
    }
}

#[tokio::test]
async fn test_env_create_seeds_config_state() {
    let (_tmp, db) = open_db().await;

    let env = db.env_create("proj", "production").await.unwrap();
    assert!(db.env_exists(&env.id).await.unwrap());

    let state = db.state_get(&env.id).await.unwrap().unwrap();
    assert!(state.active_version_id.is_none());
    assert!(state.draft_json.is_none());
    assert!(!state.is_dirty());
}

#[tokio::test]
async fn test_duplicate_environment_name_conflicts() {
    let (_tmp, db) = open_db().await;

    db.env_create("proj", "production").await.unwrap();
    let err = db.env_create("proj", "production").await.unwrap_err();
    assert!(err.is_conflict());

    // Same name in another project is fine
    db.env_create("other", "production").await.unwrap();
}

#[tokio::test]
async fn test_sequence_collision_is_a_conflict() {
    let (_tmp, db) = open_db().await;
    let env = db.env_create("proj", "production").await.unwrap();

    db.version_insert_with_snapshot(&new_version(&env.id, 1), "{}")
        .await
        .unwrap();

    let mut dup = new_version(&env.id, 1);
    dup.id = "ver-other-id".to_string();
    let err = db
        .version_insert_with_snapshot(&dup, "{}")
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Conflict(_)));

    // The failed insert must not have left a snapshot behind
    assert!(db.snapshot_get("ver-other-id").await.unwrap().is_none());
    assert_eq!(db.version_max_sequence(&env.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_version_queries() {
    let (_tmp, db) = open_db().await;
    let env = db.env_create("proj", "production").await.unwrap();

    for sequence in 1..=3 {
        db.version_insert_with_snapshot(&new_version(&env.id, sequence), "{}")
            .await
            .unwrap();
    }

    let head = db.version_head(&env.id).await.unwrap().unwrap();
    assert_eq!(head.sequence, 3);

    let listed = db.version_list(&env.id).await.unwrap();
    let sequences: Vec<i64> = listed.iter().map(|v| v.sequence).collect();
    assert_eq!(sequences, vec![3, 2, 1]);
}

#[tokio::test]
async fn test_promote_clears_draft_fields() {
    let (_tmp, db) = open_db().await;
    let env = db.env_create("proj", "production").await.unwrap();

    let version = db
        .version_insert_with_snapshot(&new_version(&env.id, 1), "{}")
        .await
        .unwrap();

    db.state_update_draft(&env.id, &json!({"values": {}}), Some("alice"), LevelsetDb::now_millis())
        .await
        .unwrap();
    let state = db.state_get(&env.id).await.unwrap().unwrap();
    assert!(state.has_draft());
    assert_eq!(state.draft_updated_by.as_deref(), Some("alice"));

    db.state_promote(&env.id, &version.id, "bob", LevelsetDb::now_millis())
        .await
        .unwrap();

    let state = db.state_get(&env.id).await.unwrap().unwrap();
    assert_eq!(state.active_version_id.as_deref(), Some(version.id.as_str()));
    assert!(state.draft_json.is_none());
    assert!(state.draft_updated_at.is_none());
    assert!(state.draft_updated_by.is_none());
    assert_eq!(state.published_by.as_deref(), Some("bob"));
}
