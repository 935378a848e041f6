//! Append-only SQLite history of cluster aggregates and per-node figures.

use crate::{
    ProxmoxError, ProxmoxResult,
    core::{
        domain::{
            model::{
                history::{HistoryPoint, NodeHistoryPoint},
                snapshot::ClusterSnapshot,
            },
            value_object::serde_helpers::unix_seconds,
        },
        infrastructure::migrations,
    },
};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Write side of the history as seen by the scheduler.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Stores one aggregate row plus one row per node of `snapshot`.
    async fn append(&self, snapshot: &ClusterSnapshot) -> ProxmoxResult<()>;

    /// Deletes rows older than `retention`; returns the number of rows removed.
    async fn prune(&self, retention: Duration) -> ProxmoxResult<u64>;
}

/// SQLite-backed time series store.
///
/// Timestamps are Unix seconds. Stored timestamps never decrease: a snapshot
/// stamped earlier than the newest stored row (clock step backwards) is
/// written with the newest row's timestamp.
pub struct HistoryStore {
    pool: SqlitePool,
    /// Newest stored timestamp; the lock also serializes appends.
    last_timestamp: Mutex<i64>,
}

impl HistoryStore {
    /// Opens (or creates) a store at `path` and runs migrations.
    #[instrument(skip(path))]
    pub async fn open(path: impl AsRef<Path>) -> ProxmoxResult<Self> {
        let path = path.as_ref();
        info!("Opening history store at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ProxmoxError::Persistence(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Opens a store that lives only as long as this value (for tests and demos).
    pub async fn open_in_memory() -> ProxmoxResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // A single connection that is never recycled keeps the database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> ProxmoxResult<Self> {
        migrations::run(&pool).await?;

        let last: Option<i64> = sqlx::query_scalar("SELECT MAX(timestamp) FROM cluster_history")
            .fetch_one(&pool)
            .await?;

        Ok(Self {
            pool,
            last_timestamp: Mutex::new(last.unwrap_or(i64::MIN)),
        })
    }

    /// Aggregate points within `[now - window, now]`, oldest first.
    pub async fn query(&self, window: Duration) -> ProxmoxResult<Vec<HistoryPoint>> {
        self.query_at(unix_seconds(SystemTime::now()), window).await
    }

    /// Like [`query`](Self::query) with an explicit `now` (Unix seconds).
    ///
    /// A zero window returns nothing.
    #[instrument(skip(self))]
    pub async fn query_at(&self, now: i64, window: Duration) -> ProxmoxResult<Vec<HistoryPoint>> {
        let Some(start) = window_start(now, window) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT timestamp, aggregate_cpu, aggregate_memory_used, aggregate_memory_total,
                   node_count, workloads_running, workloads_total
            FROM cluster_history
            WHERE timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp, id
            "#,
        )
        .bind(start)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(history_point_from_row).collect()
    }

    /// Per-node points of one node within `[now - window, now]`, oldest first.
    pub async fn query_node(
        &self,
        host: &str,
        node: &str,
        window: Duration,
    ) -> ProxmoxResult<Vec<NodeHistoryPoint>> {
        self.query_node_at(host, node, unix_seconds(SystemTime::now()), window)
            .await
    }

    #[instrument(skip(self))]
    pub async fn query_node_at(
        &self,
        host: &str,
        node: &str,
        now: i64,
        window: Duration,
    ) -> ProxmoxResult<Vec<NodeHistoryPoint>> {
        let Some(start) = window_start(now, window) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT timestamp, host, node_name, cpu, memory_used, memory_total, status
            FROM node_history
            WHERE host = ? AND node_name = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp, id
            "#,
        )
        .bind(host)
        .bind(node)
        .bind(start)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(node_point_from_row).collect()
    }

    /// Deletes rows older than `cutoff` (Unix seconds) from both tables.
    #[instrument(skip(self))]
    pub async fn prune_before(&self, cutoff: i64) -> ProxmoxResult<u64> {
        let mut tx = self.pool.begin().await?;

        let cluster = sqlx::query("DELETE FROM cluster_history WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;
        let nodes = sqlx::query("DELETE FROM node_history WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let deleted = cluster.rows_affected() + nodes.rows_affected();
        if deleted > 0 {
            debug!(deleted, "Pruned old history rows");
        }
        Ok(deleted)
    }

    /// Closes the underlying pool; later calls fail with a persistence error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl HistorySink for HistoryStore {
    #[instrument(skip(self, snapshot), fields(nodes = snapshot.node_count()))]
    async fn append(&self, snapshot: &ClusterSnapshot) -> ProxmoxResult<()> {
        let mut point = HistoryPoint::from_snapshot(snapshot);

        let mut last = self.last_timestamp.lock().await;
        point.timestamp = point.timestamp.max(*last);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO cluster_history (timestamp, aggregate_cpu, aggregate_memory_used,
                                         aggregate_memory_total, node_count,
                                         workloads_running, workloads_total)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(point.timestamp)
        .bind(point.aggregate_cpu)
        .bind(point.aggregate_memory_used as i64)
        .bind(point.aggregate_memory_total as i64)
        .bind(i64::from(point.node_count))
        .bind(i64::from(point.workloads_running))
        .bind(i64::from(point.workloads_total))
        .execute(&mut *tx)
        .await?;

        for node in snapshot.nodes() {
            sqlx::query(
                r#"
                INSERT INTO node_history (timestamp, host, node_name, cpu, memory_used,
                                          memory_total, status)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(point.timestamp)
            .bind(&node.host)
            .bind(&node.name)
            .bind(node.cpu)
            .bind(node.memory_used as i64)
            .bind(node.memory_total as i64)
            .bind(node.status.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        *last = point.timestamp;

        debug!(timestamp = point.timestamp, "History point stored");
        Ok(())
    }

    async fn prune(&self, retention: Duration) -> ProxmoxResult<u64> {
        let retention = i64::try_from(retention.as_secs()).unwrap_or(i64::MAX);
        let cutoff = unix_seconds(SystemTime::now()).saturating_sub(retention);
        self.prune_before(cutoff).await
    }
}

fn window_start(now: i64, window: Duration) -> Option<i64> {
    if window.is_zero() {
        return None;
    }
    let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
    Some(now.saturating_sub(window))
}

fn history_point_from_row(row: &SqliteRow) -> ProxmoxResult<HistoryPoint> {
    Ok(HistoryPoint {
        timestamp: row.try_get("timestamp")?,
        aggregate_cpu: row.try_get("aggregate_cpu")?,
        aggregate_memory_used: row.try_get::<i64, _>("aggregate_memory_used")? as u64,
        aggregate_memory_total: row.try_get::<i64, _>("aggregate_memory_total")? as u64,
        node_count: row.try_get::<i64, _>("node_count")? as u32,
        workloads_running: row.try_get::<i64, _>("workloads_running")? as u32,
        workloads_total: row.try_get::<i64, _>("workloads_total")? as u32,
    })
}

fn node_point_from_row(row: &SqliteRow) -> ProxmoxResult<NodeHistoryPoint> {
    Ok(NodeHistoryPoint {
        timestamp: row.try_get("timestamp")?,
        host: row.try_get("host")?,
        node_name: row.try_get("node_name")?,
        cpu: row.try_get("cpu")?,
        memory_used: row.try_get::<i64, _>("memory_used")? as u64,
        memory_total: row.try_get::<i64, _>("memory_total")? as u64,
        status: row.try_get("status")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::model::snapshot::fixtures::snapshot_at;
    use std::time::UNIX_EPOCH;

    const HOUR: u64 = 3600;
    const NOW: u64 = 1_700_000_000;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[tokio::test]
    async fn test_append_and_query_window() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        for hours_ago in [9, 5, 1] {
            store
                .append(&snapshot_at(at(NOW - hours_ago * HOUR)))
                .await
                .unwrap();
        }

        let points = store
            .query_at(NOW as i64, Duration::from_secs(6 * HOUR))
            .await
            .unwrap();
        let timestamps: Vec<i64> = points.iter().map(|p| p.timestamp).collect();
        assert_eq!(
            timestamps,
            vec![(NOW - 5 * HOUR) as i64, (NOW - HOUR) as i64]
        );
        assert_eq!(points[0].node_count, 2);
        assert_eq!(points[0].aggregate_memory_total, 8192);
    }

    #[tokio::test]
    async fn test_zero_window_is_empty() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        store.append(&snapshot_at(at(NOW))).await.unwrap();

        let points = store.query_at(NOW as i64, Duration::ZERO).await.unwrap();
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn test_timestamps_never_decrease() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        store.append(&snapshot_at(at(NOW))).await.unwrap();
        store.append(&snapshot_at(at(NOW - 30))).await.unwrap();

        let points = store
            .query_at(NOW as i64, Duration::from_secs(HOUR))
            .await
            .unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.timestamp == NOW as i64));
    }

    #[tokio::test]
    async fn test_node_history_is_scoped_by_host() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        store.append(&snapshot_at(at(NOW - 60))).await.unwrap();

        let points = store
            .query_node_at("pve-a:8006", "node2", NOW as i64, Duration::from_secs(HOUR))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].memory_used, 1024);
        assert_eq!(points[0].status, "online");

        let other = store
            .query_node_at("pve-b:8006", "node2", NOW as i64, Duration::from_secs(HOUR))
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_prune_removes_old_rows() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        store
            .append(&snapshot_at(at(NOW - 10 * HOUR)))
            .await
            .unwrap();
        store.append(&snapshot_at(at(NOW - HOUR))).await.unwrap();

        let deleted = store
            .prune_before((NOW - 5 * HOUR) as i64)
            .await
            .unwrap();
        // One aggregate row and two node rows.
        assert_eq!(deleted, 3);

        let points = store
            .query_at(NOW as i64, Duration::from_secs(24 * HOUR))
            .await
            .unwrap();
        assert_eq!(points.len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history").join("monitor.db");

        let store = HistoryStore::open(&path).await.unwrap();
        store.append(&snapshot_at(at(NOW))).await.unwrap();
        store.close().await;

        let reopened = HistoryStore::open(&path).await.unwrap();
        reopened.append(&snapshot_at(at(NOW - 100))).await.unwrap();
        let points = reopened
            .query_at(NOW as i64, Duration::from_secs(HOUR))
            .await
            .unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.timestamp == NOW as i64));
    }

    #[tokio::test]
    async fn test_closed_store_reports_persistence_error() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        store.close().await;

        let result = store.append(&snapshot_at(at(NOW))).await;
        assert!(matches!(result, Err(ProxmoxError::Persistence(_))));
    }
}
