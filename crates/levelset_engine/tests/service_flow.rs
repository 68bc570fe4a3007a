//! End-to-end service tests over a real SQLite database.

use levelset_db::LevelsetDb;
use levelset_engine::{ConfigServices, EngineError};
use levelset_protocol::{ConfigValue, ResolveMode, ValueKind};
use serde_json::{json, Value};
use tempfile::TempDir;

async fn setup() -> (TempDir, LevelsetDb, ConfigServices, String) {
    let tmp = TempDir::new().unwrap();
    let db = LevelsetDb::open(tmp.path().join("levelset.sqlite3"))
        .await
        .unwrap();
    let env = db.env_create("proj-1", "production").await.unwrap();
    let services = ConfigServices::new(db.clone());
    (tmp, db, services, env.id)
}

fn add_op(key: &str, kind: &str, value: Value) -> Value {
    json!({
        "op": "add",
        "path": format!("/values/{key}"),
        "value": {"type": kind, "value": value}
    })
}

#[tokio::test]
async fn test_draft_initialization_is_idempotent() {
    let (_tmp, _db, services, env) = setup().await;

    let first = services.drafts.fetch_or_initialize(&env).await.unwrap();
    let second = services.drafts.fetch_or_initialize(&env).await.unwrap();

    assert_eq!(first.draft_json, json!({"values": {}}));
    assert_eq!(first.draft_json, second.draft_json);
    // The second call is a pure read: the materialization stamp is unchanged
    assert_eq!(first.last_modified_at, second.last_modified_at);
    assert!(first.base_version.is_none());
    assert!(!first.is_dirty);
}

#[tokio::test]
async fn test_unknown_environment_is_not_found() {
    let (_tmp, _db, services, _env) = setup().await;

    let err = services
        .drafts
        .fetch_or_initialize("no-such-env")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "environment", .. }));
}

#[tokio::test]
async fn test_rejected_patch_leaves_draft_untouched() {
    let (_tmp, _db, services, env) = setup().await;

    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("speed", "NUMBER", json!("1.5"))]))
        .await
        .unwrap();

    // Structurally valid patch, semantically invalid result
    let err = services
        .drafts
        .apply_patch(
            "alice",
            &env,
            &json!([add_op("speed_cap", "NUMBER", json!("fast"))]),
        )
        .await
        .unwrap_err();
    let violations = err.violations().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].key.as_deref(), Some("speed_cap"));

    // Structurally invalid patch
    let err = services
        .drafts
        .apply_patch("alice", &env, &json!([{"op": "remove", "path": "/values/ghost"}]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let view = services.drafts.fetch_or_initialize(&env).await.unwrap();
    assert!(view.draft_json["values"]["speed"].is_object());
    assert!(view.draft_json["values"].get("speed_cap").is_none());
}

#[tokio::test]
async fn test_publish_creates_history_but_never_promotes() {
    let (_tmp, db, services, env) = setup().await;

    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("flag", "BOOLEAN", json!(true))]))
        .await
        .unwrap();

    let version = services
        .versions
        .publish_new_version("alice", &env, Some("first cut".into()))
        .await
        .unwrap();
    assert_eq!(version.sequence, 1);
    assert_eq!(version.label, "v1");
    assert!(version.parent_hash.is_none());

    // Publishing does not promote and does not touch the draft
    let state = db.state_get(&env).await.unwrap().unwrap();
    assert!(state.active_version_id.is_none());
    assert!(state.draft_json.is_some());

    let active = services.versions.get_active_version(&env).await.unwrap();
    assert!(active.is_none());
}

#[tokio::test]
async fn test_publish_without_draft_is_a_conflict() {
    let (_tmp, _db, services, env) = setup().await;

    let err = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn test_promotion_clears_draft_and_repoints() {
    let (_tmp, db, services, env) = setup().await;

    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("motd", "STRING", json!("hi"))]))
        .await
        .unwrap();
    let version = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();

    services
        .versions
        .promote_version(&env, &version.id, "bob")
        .await
        .unwrap();

    let state = db.state_get(&env).await.unwrap().unwrap();
    assert_eq!(state.active_version_id.as_deref(), Some(version.id.as_str()));
    assert_eq!(state.published_by.as_deref(), Some("bob"));
    assert!(state.draft_json.is_none());
    assert!(state.draft_updated_at.is_none());
    assert!(state.draft_updated_by.is_none());
    assert!(!state.is_dirty());
}

#[tokio::test]
async fn test_draft_rematerializes_from_active_snapshot() {
    let (_tmp, _db, services, env) = setup().await;

    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("gold", "NUMBER", json!("250"))]))
        .await
        .unwrap();
    let version = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();
    services
        .versions
        .promote_version(&env, &version.id, "alice")
        .await
        .unwrap();

    let view = services.drafts.fetch_or_initialize(&env).await.unwrap();
    assert_eq!(view.draft_json["values"]["gold"]["type"], "NUMBER");
    assert_eq!(view.draft_json["values"]["gold"]["value"], "250");
    let base = view.base_version.expect("draft has a base version");
    assert_eq!(base.version_id, version.id);
}

#[tokio::test]
async fn test_contract_hash_lineage() {
    let (_tmp, _db, services, env) = setup().await;

    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("a", "NUMBER", json!("1"))]))
        .await
        .unwrap();
    let v1 = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();

    // Value-only edit: contract (key->type shape) is unchanged
    services
        .drafts
        .apply_patch(
            "alice",
            &env,
            &json!([{"op": "replace", "path": "/values/a/value", "value": "2"}]),
        )
        .await
        .unwrap();
    let v2 = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();

    // Shape edit: new key changes the contract
    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("b", "STRING", json!("x"))]))
        .await
        .unwrap();
    let v3 = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();

    assert_eq!(v2.parent_hash.as_deref(), Some(v1.contract_hash.as_str()));
    assert_eq!(v2.contract_hash, v1.contract_hash);
    assert_eq!(v3.parent_hash.as_deref(), Some(v2.contract_hash.as_str()));
    assert_ne!(v3.contract_hash, v2.contract_hash);
    assert_eq!((v1.sequence, v2.sequence, v3.sequence), (1, 2, 3));
}

#[tokio::test]
async fn test_concurrent_publishes_are_gapless() {
    let (_tmp, _db, services, env) = setup().await;

    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("k", "NUMBER", json!("7"))]))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..3 {
        let versions = services.versions.clone();
        let env = env.clone();
        handles.push(tokio::spawn(async move {
            versions
                .publish_new_version(&format!("user-{i}"), &env, None)
                .await
                .unwrap()
        }));
    }

    let mut sequences: Vec<i64> = Vec::new();
    for handle in handles {
        sequences.push(handle.await.unwrap().sequence);
    }
    sequences.sort_unstable();
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_listing_marks_exactly_one_active() {
    let (_tmp, _db, services, env) = setup().await;

    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("x", "NUMBER", json!("1"))]))
        .await
        .unwrap();
    let v1 = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();
    services
        .drafts
        .apply_patch(
            "alice",
            &env,
            &json!([{"op": "replace", "path": "/values/x/value", "value": "2"}]),
        )
        .await
        .unwrap();
    let v2 = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();

    // Unpublished environment: no entry is active
    let listed = services.versions.list_all_versions(&env).await.unwrap();
    assert_eq!(listed.iter().filter(|v| v.is_active).count(), 0);

    services
        .versions
        .promote_version(&env, &v2.id, "alice")
        .await
        .unwrap();

    let listed = services.versions.list_all_versions(&env).await.unwrap();
    // Ordered by sequence descending
    assert_eq!(listed[0].id, v2.id);
    assert_eq!(listed[1].id, v1.id);
    assert_eq!(listed.iter().filter(|v| v.is_active).count(), 1);
    assert!(listed[0].is_active);
    assert!(listed[0].published_at.is_some());
    assert!(listed[1].published_at.is_none());
}

#[tokio::test]
async fn test_rollback_promotes_an_older_version() {
    let (_tmp, db, services, env) = setup().await;

    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("x", "NUMBER", json!("1"))]))
        .await
        .unwrap();
    let v1 = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();
    services
        .drafts
        .apply_patch(
            "alice",
            &env,
            &json!([{"op": "replace", "path": "/values/x/value", "value": "2"}]),
        )
        .await
        .unwrap();
    let v2 = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();
    services
        .versions
        .promote_version(&env, &v2.id, "alice")
        .await
        .unwrap();

    services
        .versions
        .rollback_to_version(&env, &v1.id, "bob")
        .await
        .unwrap();

    let state = db.state_get(&env).await.unwrap().unwrap();
    assert_eq!(state.active_version_id.as_deref(), Some(v1.id.as_str()));

    // Rollback created no new version rows
    let listed = services.versions.list_all_versions(&env).await.unwrap();
    assert_eq!(listed.len(), 2);

    let resolved = services
        .versions
        .resolve(&env, ResolveMode::Published)
        .await
        .unwrap();
    assert_eq!(
        resolved.get("x"),
        Some(&ConfigValue::coerce(ValueKind::Number, &json!("1")).unwrap())
    );
}

#[tokio::test]
async fn test_diff_reports_complete_classification() {
    let (_tmp, _db, services, env) = setup().await;

    services
        .drafts
        .apply_patch(
            "alice",
            &env,
            &json!([
                add_op("a", "NUMBER", json!("1")),
                add_op("b", "NUMBER", json!("2"))
            ]),
        )
        .await
        .unwrap();
    let v1 = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();

    services
        .drafts
        .apply_patch(
            "alice",
            &env,
            &json!([
                {"op": "remove", "path": "/values/a"},
                {"op": "replace", "path": "/values/b/value", "value": "3"},
                add_op("c", "NUMBER", json!("4"))
            ]),
        )
        .await
        .unwrap();
    let v2 = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();

    let diff = services
        .versions
        .diff_versions(&env, &v1.id, &v2.id)
        .await
        .unwrap();
    assert_eq!(diff.added, vec!["c"]);
    assert_eq!(diff.removed, vec!["a"]);
    assert_eq!(diff.value_changed.len(), 1);
    assert_eq!(diff.value_changed[0].key, "b");
    assert!(diff.type_changed.is_empty());
}

#[tokio::test]
async fn test_diff_rejects_foreign_versions() {
    let (_tmp, db, services, env) = setup().await;

    let other = db.env_create("proj-1", "staging").await.unwrap();
    services
        .drafts
        .apply_patch("alice", &other.id, &json!([add_op("y", "NUMBER", json!("9"))]))
        .await
        .unwrap();
    let foreign = services
        .versions
        .publish_new_version("alice", &other.id, None)
        .await
        .unwrap();

    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("x", "NUMBER", json!("1"))]))
        .await
        .unwrap();
    let ours = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();

    let err = services
        .versions
        .diff_versions(&env, &ours.id, &foreign.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { kind: "version", .. }));
}

#[tokio::test]
async fn test_resolve_published_requires_promotion() {
    let (_tmp, _db, services, env) = setup().await;

    let err = services
        .versions
        .resolve(&env, ResolveMode::Published)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));

    // Draft mode with no draft resolves empty
    let resolved = services
        .versions
        .resolve(&env, ResolveMode::Draft)
        .await
        .unwrap();
    assert!(resolved.is_empty());
}

#[tokio::test]
async fn test_missing_snapshot_is_an_integrity_violation() {
    let (_tmp, db, services, env) = setup().await;

    services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("x", "NUMBER", json!("1"))]))
        .await
        .unwrap();
    let version = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();

    // Corrupt the store: a published version must always have a snapshot
    sqlx::query("DELETE FROM config_snapshots WHERE version_id = ?")
        .bind(&version.id)
        .execute(db.pool())
        .await
        .unwrap();

    let err = services
        .versions
        .promote_version(&env, &version.id, "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Integrity(_)));

    let err = services
        .versions
        .get_version_details(&env, &version.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Integrity(_)));
}

#[tokio::test]
async fn test_dirty_tracking_across_lifecycle() {
    let (_tmp, _db, services, env) = setup().await;

    // No publish yet: edits never count as dirty
    let view = services
        .drafts
        .apply_patch("alice", &env, &json!([add_op("x", "NUMBER", json!("1"))]))
        .await
        .unwrap();
    assert!(!view.is_dirty);

    let version = services
        .versions
        .publish_new_version("alice", &env, None)
        .await
        .unwrap();
    services
        .versions
        .promote_version(&env, &version.id, "alice")
        .await
        .unwrap();

    // Post-promotion edit postdates the publish stamp
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let view = services
        .drafts
        .apply_patch(
            "alice",
            &env,
            &json!([{"op": "replace", "path": "/values/x/value", "value": "2"}]),
        )
        .await
        .unwrap();
    assert!(view.is_dirty);
}
