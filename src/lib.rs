mod auth;
mod core;

#[cfg(test)]
mod tests;

pub use crate::auth::application::service::session_manager::SessionManager;
pub use crate::core::application::{
    latest_state_cache::{LatestStateCache, Readiness},
    scheduler::Scheduler,
};
pub use crate::core::domain::error::{ProxmoxError, ProxmoxResult, ValidationError};
pub use crate::core::domain::model::{
    history::{HistoryPoint, NodeHistoryPoint},
    host_credential::HostCredential,
    monitor_config::{MonitorConfig, RateLimitConfig, ValidationConfig},
    session::Session,
    snapshot::{
        ClusterSnapshot, ClusterStatus, DegradedNode, FetchCategory, HostFailure, HostStatus,
        HostSummary, NodeMetrics, NodeState, StorageMetrics, WorkloadKey, WorkloadKind,
        WorkloadMetrics, WorkloadState,
    },
};
pub use crate::core::infrastructure::{
    collector::{ClusterCollector, SnapshotSource},
    history_store::{HistorySink, HistoryStore},
};

use crate::core::{
    domain::model::proxmox_connection::ProxmoxConnection,
    infrastructure::api_client::ApiClient,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Collects state from one or more Proxmox VE hosts on a fixed interval,
/// serves the newest snapshot instantly and keeps a queryable history.
///
/// # Examples
///
/// ```no_run
/// use leeca_proxmox_monitor::{HostCredential, ProxmoxMonitor, ProxmoxResult};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> ProxmoxResult<()> {
///     let monitor = ProxmoxMonitor::builder()
///         .host(HostCredential::new("pve1.example.com", "monitor@pve", "secret"))
///         .host(HostCredential::new("pve2.example.com", "monitor@pve", "secret").port(8007))
///         .interval(Duration::from_secs(10))
///         .history_path("/var/lib/monitor/history.db")
///         .build()
///         .await?;
///
///     monitor.start().await?;
///     if let Some(snapshot) = monitor.latest_snapshot() {
///         println!("{} nodes online", snapshot.node_count());
///     }
///     let last_day = monitor.history(24).await?;
///     println!("{} history points", last_day.len());
///
///     monitor.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ProxmoxMonitor {
    sessions: Arc<SessionManager>,
    cache: Arc<LatestStateCache>,
    history: Arc<HistoryStore>,
    scheduler: Arc<Scheduler>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Default)]
enum HistoryLocation {
    #[default]
    InMemory,
    Path(PathBuf),
}

/// Builder for ProxmoxMonitor configuration
///
/// History is kept in memory unless a file is given with
/// [`ProxmoxMonitorBuilder::history_path`].
#[derive(Debug, Default)]
pub struct ProxmoxMonitorBuilder {
    hosts: Vec<HostCredential>,
    config: MonitorConfig,
    history: HistoryLocation,
}

impl ProxmoxMonitorBuilder {
    /// Adds one host. Hosts are collected in the order they were added.
    pub fn host(mut self, credential: HostCredential) -> Self {
        self.hosts.push(credential);
        self
    }

    pub fn hosts(mut self, credentials: impl IntoIterator<Item = HostCredential>) -> Self {
        self.hosts.extend(credentials);
        self
    }

    /// Replaces every timing, retention and validation setting at once.
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn failure_backoff(mut self, backoff: Duration) -> Self {
        self.config.failure_backoff = backoff;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn cycle_timeout(mut self, timeout: Duration) -> Self {
        self.config.cycle_timeout = timeout;
        self
    }

    /// Age after which history rows are pruned; `None` keeps them forever.
    pub fn retention(mut self, retention: Option<Duration>) -> Self {
        self.config.history_retention = retention;
        self
    }

    pub fn retention_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.retention_sweep_interval = interval;
        self
    }

    /// Persists history in a SQLite file (created if missing).
    ///
    /// Without it history lives in memory and is lost when the process exits.
    pub fn history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history = HistoryLocation::Path(path.into());
        self
    }

    /// Keeps history in memory only (the default). Nothing survives a
    /// restart; use [`ProxmoxMonitorBuilder::history_path`] for durable history.
    pub fn in_memory_history(mut self) -> Self {
        self.history = HistoryLocation::InMemory;
        self
    }

    /// Limits the data calls made to each host.
    ///
    /// # Errors
    /// Returns a validation error if either value is zero.
    pub fn rate_limit(mut self, requests_per_second: u32, burst_size: u32) -> ProxmoxResult<Self> {
        if requests_per_second == 0 || burst_size == 0 {
            return Err(ValidationError::Field {
                field: "rate_limit".to_string(),
                message: "Rate limit and burst size must be greater than 0".to_string(),
            }
            .into());
        }
        self.config.rate_limit = Some(RateLimitConfig {
            requests_per_second,
            burst_size,
        });
        Ok(self)
    }

    /// Rejects passwords whose zxcvbn score is below `min_score` (0 to 4).
    ///
    /// # Errors
    /// Returns a validation error if `min_score` is above 4.
    pub fn enable_password_strength(mut self, min_score: u8) -> ProxmoxResult<Self> {
        let score = match min_score {
            0 => zxcvbn::Score::Zero,
            1 => zxcvbn::Score::One,
            2 => zxcvbn::Score::Two,
            3 => zxcvbn::Score::Three,
            4 => zxcvbn::Score::Four,
            _ => {
                return Err(ValidationError::Field {
                    field: "password_strength".to_string(),
                    message: "Score must be between 0 and 4".to_string(),
                }
                .into());
            }
        };
        self.config.validation.password_min_score = Some(score);
        Ok(self)
    }

    /// Rejects reserved account names such as `root` or `admin`.
    pub fn block_reserved_usernames(mut self) -> Self {
        self.config.validation.block_reserved_usernames = true;
        self
    }

    /// Validates the configuration and wires every component together.
    ///
    /// No host is contacted here; the first login happens in the first cycle.
    ///
    /// # Errors
    /// * a validation error for an empty host list, a duplicate host, a zero
    ///   interval or an invalid credential
    /// * `ProxmoxError::Persistence` if the history store cannot be opened
    pub async fn build(self) -> ProxmoxResult<ProxmoxMonitor> {
        if self.hosts.is_empty() {
            return Err(ValidationError::Field {
                field: "hosts".to_string(),
                message: "At least one host is required".to_string(),
            }
            .into());
        }
        if self.config.interval.is_zero() {
            return Err(ValidationError::Field {
                field: "interval".to_string(),
                message: "Interval must be greater than 0".to_string(),
            }
            .into());
        }

        let mut seen = HashSet::new();
        let mut connections = Vec::with_capacity(self.hosts.len());
        for credential in &self.hosts {
            let connection =
                ProxmoxConnection::from_credential(credential, &self.config.validation)?;
            if !seen.insert(connection.host_id().to_string()) {
                return Err(ValidationError::ConstraintViolation(format!(
                    "Host {} is configured more than once",
                    connection.host_id()
                ))
                .into());
            }
            connections.push(Arc::new(connection));
        }

        let sessions = Arc::new(SessionManager::new(
            connections.iter().cloned(),
            self.config.request_timeout,
        )?);

        let clients = connections
            .iter()
            .map(|connection| {
                ApiClient::new(
                    connection.host_id(),
                    Arc::clone(&sessions),
                    self.config.request_timeout,
                    self.config.rate_limit,
                )
                .map(Arc::new)
            })
            .collect::<ProxmoxResult<Vec<_>>>()?;

        let history = Arc::new(match &self.history {
            HistoryLocation::InMemory => HistoryStore::open_in_memory().await?,
            HistoryLocation::Path(path) => HistoryStore::open(path).await?,
        });

        let cache = Arc::new(LatestStateCache::new());
        let (shutdown, shutdown_rx) = watch::channel(false);
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(ClusterCollector::new(clients)),
            Arc::clone(&cache),
            Arc::clone(&history) as Arc<dyn HistorySink>,
            self.config,
            shutdown_rx,
        ));

        info!(hosts = connections.len(), "Monitor configured");

        Ok(ProxmoxMonitor {
            sessions,
            cache,
            history,
            scheduler,
            shutdown,
            task: Mutex::new(None),
        })
    }
}

impl ProxmoxMonitor {
    /// Creates a new builder for ProxmoxMonitor configuration
    pub fn builder() -> ProxmoxMonitorBuilder {
        ProxmoxMonitorBuilder::default()
    }

    /// Spawns the collection loop. Calling it again while running does nothing.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Shutdown` after [`shutdown`](Self::shutdown).
    pub async fn start(&self) -> ProxmoxResult<()> {
        if *self.shutdown.borrow() {
            return Err(ProxmoxError::Shutdown);
        }

        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!("Monitor already started");
            return Ok(());
        }

        let scheduler = Arc::clone(&self.scheduler);
        *task = Some(tokio::spawn(async move { scheduler.run().await }));
        Ok(())
    }

    /// Runs one cycle now, waiting for a scheduled cycle in progress first.
    ///
    /// # Errors
    /// The cycle's error; the cache keeps its previous snapshot.
    pub async fn refresh_now(&self) -> ProxmoxResult<Arc<ClusterSnapshot>> {
        self.scheduler.run_cycle().await
    }

    /// The newest snapshot, or `None` until the first cycle succeeds.
    pub fn latest_snapshot(&self) -> Option<Arc<ClusterSnapshot>> {
        self.cache.get()
    }

    pub fn readiness(&self) -> Readiness {
        self.cache.readiness()
    }

    /// Aggregate history of the last `window_hours`, oldest first.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Persistence` if the store cannot be read.
    pub async fn history(&self, window_hours: u32) -> ProxmoxResult<Vec<HistoryPoint>> {
        self.history.query(hours(window_hours)).await
    }

    /// History of one node of one host over the last `window_hours`, oldest first.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Persistence` if the store cannot be read.
    pub async fn node_history(
        &self,
        host: &str,
        node: &str,
        window_hours: u32,
    ) -> ProxmoxResult<Vec<NodeHistoryPoint>> {
        self.history.query_node(host, node, hours(window_hours)).await
    }

    /// Configured host ids (`host:port`).
    pub fn host_ids(&self) -> Vec<String> {
        self.sessions.host_ids().map(str::to_string).collect()
    }

    /// Stops the loop, abandons an in-flight cycle without publishing,
    /// then closes every session and the history store.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        if let Some(task) = self.task.lock().await.take() {
            if let Err(error) = task.await {
                warn!(%error, "Scheduler task ended abnormally");
            }
        }

        self.sessions.close().await;
        self.history.close().await;
        info!("Monitor stopped");
    }
}

fn hours(window_hours: u32) -> Duration {
    Duration::from_secs(u64::from(window_hours) * 3600)
}
