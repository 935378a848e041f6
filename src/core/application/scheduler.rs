//! Fixed-interval driver of collection cycles.

use crate::{
    ProxmoxError, ProxmoxResult,
    core::{
        application::latest_state_cache::LatestStateCache,
        domain::model::{monitor_config::MonitorConfig, snapshot::ClusterSnapshot},
        infrastructure::{collector::SnapshotSource, history_store::HistorySink},
    },
};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{error, info, instrument, warn};

/// Runs collection cycles and is the only writer of the cache and the history.
///
/// Cycles never overlap: the scheduled loop and [`run_cycle`](Self::run_cycle)
/// calls made from elsewhere take turns on the same lock.
pub struct Scheduler {
    source: Arc<dyn SnapshotSource>,
    cache: Arc<LatestStateCache>,
    history: Arc<dyn HistorySink>,
    config: MonitorConfig,
    shutdown: watch::Receiver<bool>,
    /// Held for the duration of a cycle; holds the time of the last retention sweep.
    cycle: Mutex<Option<Instant>>,
}

impl Scheduler {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        cache: Arc<LatestStateCache>,
        history: Arc<dyn HistorySink>,
        config: MonitorConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            cache,
            history,
            config,
            shutdown,
            cycle: Mutex::new(None),
        }
    }

    /// Loops until shutdown is signalled.
    ///
    /// The next cycle starts `interval` after the previous one started, or
    /// `failure_backoff` after a failed cycle ended.
    pub async fn run(&self) {
        info!(interval = ?self.config.interval, "Scheduler started");
        loop {
            let started = Instant::now();
            let wait_until = match self.run_cycle().await {
                Ok(_) => started + self.config.interval,
                Err(ProxmoxError::Shutdown) => break,
                Err(_) => Instant::now() + self.config.failure_backoff,
            };

            tokio::select! {
                _ = sleep_until(wait_until) => {}
                _ = self.shutdown_signalled() => break,
            }
        }
        info!("Scheduler stopped");
    }

    /// Runs one cycle: collect, then publish to the cache and the history.
    ///
    /// A failed, panicking or timed-out collection leaves the cache and the
    /// history untouched and is recorded as a failed cycle. A history write
    /// failure is logged; the cache is still updated.
    ///
    /// # Errors
    /// * `ProxmoxError::Shutdown` if shutdown was signalled before or during collection
    /// * the collection error otherwise
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> ProxmoxResult<Arc<ClusterSnapshot>> {
        let mut last_sweep = self.cycle.lock().await;
        if *self.shutdown.borrow() {
            return Err(ProxmoxError::Shutdown);
        }

        let source = Arc::clone(&self.source);
        let mut task = tokio::spawn(async move { source.collect().await });

        let collected = tokio::select! {
            joined = timeout(self.config.cycle_timeout, &mut task) => match joined {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(ProxmoxError::Collection(format!(
                    "collection task failed: {}",
                    join_error
                ))),
                Err(_) => {
                    task.abort();
                    Err(ProxmoxError::Collection(format!(
                        "cycle exceeded {:?}",
                        self.config.cycle_timeout
                    )))
                }
            },
            _ = self.shutdown_signalled() => {
                task.abort();
                info!("Cycle abandoned on shutdown");
                return Err(ProxmoxError::Shutdown);
            }
        };

        let snapshot = match collected {
            Ok(snapshot) => Arc::new(snapshot),
            Err(error) => {
                warn!(%error, "Cycle failed, keeping previous snapshot");
                self.cache.record_failure(error.to_string());
                return Err(error);
            }
        };

        self.publish(Arc::clone(&snapshot)).await;
        self.sweep_if_due(&mut last_sweep).await;
        Ok(snapshot)
    }

    async fn publish(&self, snapshot: Arc<ClusterSnapshot>) {
        self.cache.set(Arc::clone(&snapshot));

        if let Err(error) = self.history.append(&snapshot).await {
            error!(%error, "Failed to append history point");
        }

        info!(
            nodes = snapshot.node_count(),
            workloads = snapshot.workloads().len(),
            degraded = snapshot.degraded_nodes().len(),
            status = ?snapshot.cluster_status(),
            "Snapshot published"
        );
    }

    async fn sweep_if_due(&self, last_sweep: &mut Option<Instant>) {
        let Some(retention) = self.config.history_retention else {
            return;
        };
        if last_sweep.is_some_and(|at| at.elapsed() < self.config.retention_sweep_interval) {
            return;
        }

        match self.history.prune(retention).await {
            Ok(deleted) => info!(deleted, "Retention sweep finished"),
            Err(error) => error!(%error, "Retention sweep failed"),
        }
        *last_sweep = Some(Instant::now());
    }

    /// Resolves once shutdown is signalled; never resolves if the sender is gone.
    async fn shutdown_signalled(&self) {
        let mut shutdown = self.shutdown.clone();
        if shutdown.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
