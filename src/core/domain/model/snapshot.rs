//! Typed, immutable result of one collection cycle.
//!
//! Wire payloads are converted into these types at the collection boundary;
//! nothing downstream of the collector sees raw JSON.

use crate::core::domain::value_object::serde_helpers::system_time;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Overall status: `online` if at least one node was read in the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterStatus {
    Online,
    Offline,
}

/// Contribution of one host to a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    /// Every node and every category was read.
    Online,
    /// Nodes were listed but at least one node fetch failed.
    Degraded,
    /// Nothing was read from the host.
    Offline,
}

/// Why a host contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum HostFailure {
    /// The host rejected the configured credentials.
    Authentication(String),
    /// Network, TLS, timeout or server-side failure.
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSummary {
    pub host: String,
    pub status: HostStatus,
    pub node_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<HostFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Online,
    Offline,
    Unknown,
}

impl NodeState {
    pub(crate) fn from_api(status: &str) -> Self {
        match status {
            "online" => NodeState::Online,
            "offline" => NodeState::Offline,
            _ => NodeState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Online => "online",
            NodeState::Offline => "offline",
            NodeState::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMetrics {
    pub host: String,
    pub name: String,
    pub status: NodeState,
    /// CPU usage in [0, 1].
    pub cpu: f64,
    pub cpu_cores: u32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub uptime: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    /// At least one of the node's guest or storage listings failed.
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    Vm,
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadState {
    Running,
    Stopped,
    Paused,
    Unknown,
}

impl WorkloadState {
    pub(crate) fn from_api(status: &str) -> Self {
        match status {
            "running" => WorkloadState::Running,
            "stopped" => WorkloadState::Stopped,
            "paused" | "suspended" => WorkloadState::Paused,
            _ => WorkloadState::Unknown,
        }
    }
}

/// Identity of a workload across clusters: guest ids are only unique per host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WorkloadKey {
    pub host: String,
    pub node: String,
    pub vmid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadMetrics {
    pub host: String,
    pub node: String,
    pub vmid: u32,
    pub name: String,
    pub kind: WorkloadKind,
    pub status: WorkloadState,
    /// CPU usage in [0, 1].
    pub cpu: f64,
    pub memory_used: u64,
    pub memory_max: u64,
}

impl WorkloadMetrics {
    #[must_use]
    pub fn key(&self) -> WorkloadKey {
        WorkloadKey {
            host: self.host.clone(),
            node: self.node.clone(),
            vmid: self.vmid,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == WorkloadState::Running
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageMetrics {
    pub host: String,
    pub node: String,
    pub storage: String,
    pub kind: String,
    pub total: u64,
    pub used: u64,
    pub available: u64,
}

/// One of the four independent per-node fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchCategory {
    Status,
    Vms,
    Containers,
    Storage,
}

/// A node for which some of its fetches failed in this cycle.
///
/// When `Status` is among the failures the node is absent from
/// `ClusterSnapshot::nodes`; its guests and storages may still be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradedNode {
    pub host: String,
    pub node: String,
    pub failed: Vec<FetchCategory>,
}

/// Immutable aggregate of everything collected in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSnapshot {
    #[serde(with = "system_time")]
    collected_at: SystemTime,
    hosts: Vec<HostSummary>,
    nodes: Vec<NodeMetrics>,
    workloads: Vec<WorkloadMetrics>,
    storages: Vec<StorageMetrics>,
    degraded_nodes: Vec<DegradedNode>,
    total_cpu_cores: u64,
    total_memory: u64,
    cluster_status: ClusterStatus,
}

impl ClusterSnapshot {
    /// Assembles a snapshot and derives its totals.
    ///
    /// Workloads are keyed by `(host, node, vmid)`; a duplicate key keeps the
    /// last entry. Totals cover the successfully-read nodes only.
    pub(crate) fn new(
        collected_at: SystemTime,
        hosts: Vec<HostSummary>,
        nodes: Vec<NodeMetrics>,
        workloads: Vec<WorkloadMetrics>,
        storages: Vec<StorageMetrics>,
        degraded_nodes: Vec<DegradedNode>,
    ) -> Self {
        let workloads: BTreeMap<WorkloadKey, WorkloadMetrics> =
            workloads.into_iter().map(|w| (w.key(), w)).collect();

        let total_cpu_cores = nodes.iter().map(|n| u64::from(n.cpu_cores)).sum();
        let total_memory = nodes.iter().map(|n| n.memory_total).sum();
        let cluster_status = if nodes.is_empty() {
            ClusterStatus::Offline
        } else {
            ClusterStatus::Online
        };

        Self {
            collected_at,
            hosts,
            nodes,
            workloads: workloads.into_values().collect(),
            storages,
            degraded_nodes,
            total_cpu_cores,
            total_memory,
            cluster_status,
        }
    }

    pub fn collected_at(&self) -> SystemTime {
        self.collected_at
    }

    pub fn hosts(&self) -> &[HostSummary] {
        &self.hosts
    }

    pub fn nodes(&self) -> &[NodeMetrics] {
        &self.nodes
    }

    /// Workloads ordered by `(host, node, vmid)`.
    pub fn workloads(&self) -> &[WorkloadMetrics] {
        &self.workloads
    }

    pub fn storages(&self) -> &[StorageMetrics] {
        &self.storages
    }

    pub fn degraded_nodes(&self) -> &[DegradedNode] {
        &self.degraded_nodes
    }

    pub fn total_cpu_cores(&self) -> u64 {
        self.total_cpu_cores
    }

    pub fn total_memory(&self) -> u64 {
        self.total_memory
    }

    pub fn cluster_status(&self) -> ClusterStatus {
        self.cluster_status
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn workloads_running(&self) -> usize {
        self.workloads.iter().filter(|w| w.is_running()).count()
    }

    /// Mean CPU usage over the read nodes (`0.0` when none was read).
    pub fn average_cpu(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        self.nodes.iter().map(|n| n.cpu).sum::<f64>() / self.nodes.len() as f64
    }

    pub fn memory_used(&self) -> u64 {
        self.nodes.iter().map(|n| n.memory_used).sum()
    }

    pub fn workload(&self, key: &WorkloadKey) -> Option<&WorkloadMetrics> {
        self.workloads
            .binary_search_by(|w| {
                (w.host.as_str(), w.node.as_str(), w.vmid).cmp(&(
                    key.host.as_str(),
                    key.node.as_str(),
                    key.vmid,
                ))
            })
            .ok()
            .map(|idx| &self.workloads[idx])
    }

    pub fn host(&self, host: &str) -> Option<&HostSummary> {
        self.hosts.iter().find(|h| h.host == host)
    }

    /// Returns `true` if the node was read or is accounted for as degraded.
    pub fn knows_node(&self, host: &str, node: &str) -> bool {
        self.nodes.iter().any(|n| n.host == host && n.name == node)
            || self
                .degraded_nodes
                .iter()
                .any(|d| d.host == host && d.node == node)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_derived_totals() {
        let snapshot = snapshot_at(SystemTime::now());

        assert_eq!(snapshot.total_cpu_cores(), 12);
        assert_eq!(snapshot.total_memory(), 8192);
        assert_eq!(snapshot.memory_used(), 3072);
        assert_eq!(snapshot.node_count(), 2);
        assert_eq!(snapshot.workloads_running(), 1);
        assert!((snapshot.average_cpu() - 0.30).abs() < 1e-9);
        assert_eq!(snapshot.cluster_status(), ClusterStatus::Online);
    }

    #[test]
    fn test_empty_snapshot_is_offline() {
        let snapshot = ClusterSnapshot::new(
            SystemTime::now(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(snapshot.cluster_status(), ClusterStatus::Offline);
        assert_eq!(snapshot.average_cpu(), 0.0);
    }

    #[test]
    fn test_workload_ids_do_not_collide_across_hosts() {
        let snapshot = ClusterSnapshot::new(
            SystemTime::now(),
            Vec::new(),
            vec![
                node("pve-a:8006", "node1", 0.1, 1, 2, 1),
                node("pve-b:8006", "node1", 0.1, 1, 2, 1),
            ],
            vec![
                workload("pve-b:8006", "node1", 100, true),
                workload("pve-a:8006", "node1", 100, false),
            ],
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(snapshot.workloads().len(), 2);
        let key_a = WorkloadKey {
            host: "pve-a:8006".to_string(),
            node: "node1".to_string(),
            vmid: 100,
        };
        let found = snapshot.workload(&key_a).unwrap();
        assert!(!found.is_running());
        assert_eq!(snapshot.workloads()[0].host, "pve-a:8006");
    }

    #[test]
    fn test_serialized_shape() {
        let snapshot = snapshot_at(std::time::UNIX_EPOCH + std::time::Duration::from_secs(60));
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["collected_at"], 60);
        assert_eq!(json["cluster_status"], "online");
        assert_eq!(json["nodes"][0]["status"], "online");
        assert_eq!(json["workloads"][0]["kind"], "vm");
        assert_eq!(json["hosts"][0]["status"], "online");
    }
}
