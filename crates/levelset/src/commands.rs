//! Command handlers for the Levelset CLI.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use levelset_db::LevelsetDb;
use levelset_engine::ConfigServices;
use levelset_protocol::ResolveMode;
use serde_json::Value;

pub async fn env_create(db: &LevelsetDb, project: &str, name: &str) -> Result<()> {
    let env = db.env_create(project, name).await?;
    println!("Created environment {} ({}/{})", env.id, env.project_id, env.name);
    Ok(())
}

pub async fn env_list(db: &LevelsetDb) -> Result<()> {
    let envs = db.env_list().await?;
    if envs.is_empty() {
        println!("No environments.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Project", "Name", "Created"]);
    for env in envs {
        table.add_row(vec![
            Cell::new(&env.id),
            Cell::new(&env.project_id),
            Cell::new(&env.name),
            Cell::new(format_time(env.created_at)),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn draft_show(services: &ConfigServices, environment: &str) -> Result<()> {
    let view = services.drafts.fetch_or_initialize(environment).await?;
    print_json(&serde_json::to_value(&view)?)?;
    Ok(())
}

pub async fn draft_patch(
    services: &ConfigServices,
    environment: &str,
    user: &str,
    ops: &str,
) -> Result<()> {
    let ops = load_ops(ops)?;
    let view = services.drafts.apply_patch(user, environment, &ops).await?;
    print_json(&serde_json::to_value(&view)?)?;
    Ok(())
}

pub async fn publish(
    services: &ConfigServices,
    environment: &str,
    user: &str,
    notes: Option<String>,
) -> Result<()> {
    let version = services
        .versions
        .publish_new_version(user, environment, notes)
        .await?;
    println!(
        "Published {} (sequence {}, contract {})",
        version.label, version.sequence, version.contract_hash
    );
    Ok(())
}

pub async fn promote(
    services: &ConfigServices,
    environment: &str,
    version: &str,
    user: &str,
) -> Result<()> {
    services
        .versions
        .promote_version(environment, version, user)
        .await?;
    println!("Promoted {version} to active.");
    Ok(())
}

pub async fn rollback(
    services: &ConfigServices,
    environment: &str,
    version: &str,
    user: &str,
) -> Result<()> {
    services
        .versions
        .rollback_to_version(environment, version, user)
        .await?;
    println!("Rolled back to {version}.");
    Ok(())
}

pub async fn versions(services: &ConfigServices, environment: &str) -> Result<()> {
    let versions = services.versions.list_all_versions(environment).await?;
    if versions.is_empty() {
        println!("No versions published.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Label", "Active", "Created", "By", "Contract", "Parent", "Notes",
    ]);
    for v in versions {
        table.add_row(vec![
            Cell::new(&v.label),
            Cell::new(if v.is_active { "*" } else { "" }),
            Cell::new(format_time(v.created_at)),
            Cell::new(&v.created_by),
            Cell::new(short_hash(&v.contract_hash)),
            Cell::new(v.parent_hash.as_deref().map(short_hash).unwrap_or_default()),
            Cell::new(v.change_log.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn version_details(
    services: &ConfigServices,
    environment: &str,
    version: &str,
) -> Result<()> {
    let details = services
        .versions
        .get_version_details(environment, version)
        .await?;
    print_json(&serde_json::to_value(&details)?)?;
    Ok(())
}

pub async fn diff(
    services: &ConfigServices,
    environment: &str,
    from: &str,
    to: &str,
) -> Result<()> {
    let diff = services.versions.diff_versions(environment, from, to).await?;
    if diff.is_empty() {
        println!(
            "{} and {} are semantically identical.",
            diff.from_version.label, diff.to_version.label
        );
        return Ok(());
    }
    print_json(&serde_json::to_value(&diff)?)?;
    Ok(())
}

pub async fn resolve(
    services: &ConfigServices,
    environment: &str,
    mode: ResolveMode,
) -> Result<()> {
    let resolved = services.versions.resolve(environment, mode).await?;
    print_json(&resolved.to_snapshot_json())?;
    Ok(())
}

/// Patch operations: inline JSON, or `@file` to read from disk.
fn load_ops(ops: &str) -> Result<Value> {
    let text = match ops.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read patch file: {path}"))?,
        None => ops.to_string(),
    };
    serde_json::from_str(&text).context("Patch operations are not valid JSON")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn short_hash(hash: &str) -> String {
    hash.chars().take(12).collect()
}
