//! Lossy per-cycle summaries persisted for trend queries.

use crate::core::domain::{
    model::snapshot::ClusterSnapshot, value_object::serde_helpers::unix_seconds,
};
use serde::{Deserialize, Serialize};

/// Cluster-wide aggregate of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    /// Mean CPU usage over the nodes read in the cycle (0.0 to 1.0).
    pub aggregate_cpu: f64,
    pub aggregate_memory_used: u64,
    pub aggregate_memory_total: u64,
    pub node_count: u32,
    pub workloads_running: u32,
    pub workloads_total: u32,
}

impl HistoryPoint {
    #[must_use]
    pub fn from_snapshot(snapshot: &ClusterSnapshot) -> Self {
        Self {
            timestamp: unix_seconds(snapshot.collected_at()),
            aggregate_cpu: snapshot.average_cpu(),
            aggregate_memory_used: snapshot.memory_used(),
            aggregate_memory_total: snapshot.total_memory(),
            node_count: snapshot.node_count() as u32,
            workloads_running: snapshot.workloads_running() as u32,
            workloads_total: snapshot.workloads().len() as u32,
        }
    }
}

/// One node's figures in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHistoryPoint {
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    pub host: String,
    pub node_name: String,
    pub cpu: f64,
    pub memory_used: u64,
    pub memory_total: u64,
    pub status: String,
}
