//! History database migrations.

use crate::{ProxmoxError, ProxmoxResult};
use sqlx::SqlitePool;
use tracing::{info, instrument};

const SCHEMA_VERSION: i64 = 2;

fn migration_failed(error: sqlx::Error) -> ProxmoxError {
    ProxmoxError::Persistence(format!("Migration failed: {}", error))
}

#[instrument(skip(pool))]
pub(crate) async fn run(pool: &SqlitePool) -> ProxmoxResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(migration_failed)?;

    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await
            .map_err(migration_failed)?;
    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("History schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!(
        "Migrating history schema from version {} to {}",
        current_version, SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    if current_version < 2 {
        migrate_to_v2(pool).await?;
    }

    Ok(())
}

#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> ProxmoxResult<()> {
    info!("Running migration to schema version 1");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cluster_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            aggregate_cpu REAL NOT NULL,
            aggregate_memory_used INTEGER NOT NULL,
            aggregate_memory_total INTEGER NOT NULL,
            node_count INTEGER NOT NULL,
            workloads_running INTEGER NOT NULL,
            workloads_total INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(migration_failed)?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_cluster_history_timestamp ON cluster_history(timestamp)",
    )
    .execute(pool)
    .await
    .map_err(migration_failed)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS node_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            node_name TEXT NOT NULL,
            cpu REAL NOT NULL,
            memory_used INTEGER NOT NULL,
            memory_total INTEGER NOT NULL,
            status TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(migration_failed)?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (1)")
        .execute(pool)
        .await
        .map_err(migration_failed)?;

    Ok(())
}

/// Node rows carry their host so equally named nodes of different clusters
/// stay apart.
#[instrument(skip(pool))]
async fn migrate_to_v2(pool: &SqlitePool) -> ProxmoxResult<()> {
    info!("Running migration to schema version 2");

    sqlx::query("ALTER TABLE node_history ADD COLUMN host TEXT NOT NULL DEFAULT ''")
        .execute(pool)
        .await
        .map_err(migration_failed)?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_node_history_lookup
            ON node_history(host, node_name, timestamp)
        "#,
    )
    .execute(pool)
    .await
    .map_err(migration_failed)?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (2)")
        .execute(pool)
        .await
        .map_err(migration_failed)?;

    Ok(())
}
