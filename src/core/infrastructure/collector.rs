//! Fan-out collection across hosts, nodes and metric categories.

use crate::{
    ProxmoxError, ProxmoxResult,
    core::{
        domain::model::{
            guest::GuestListItem,
            node_list_item::NodeListItem,
            node_status::NodeStatus,
            snapshot::{
                ClusterSnapshot, DegradedNode, FetchCategory, HostFailure, HostStatus,
                HostSummary, NodeMetrics, NodeState, StorageMetrics, WorkloadKind,
                WorkloadMetrics, WorkloadState,
            },
            storage::StorageListItem,
        },
        infrastructure::api_client::ApiClient,
    },
};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, instrument, warn};

/// Anything that can produce one snapshot per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Runs one collection pass.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Collection` if no host contributed anything.
    async fn collect(&self) -> ProxmoxResult<ClusterSnapshot>;
}

/// Collects every configured host concurrently and merges the results.
pub struct ClusterCollector {
    clients: Vec<Arc<ApiClient>>,
}

/// What one host contributed to a cycle.
#[derive(Default)]
struct HostContribution {
    nodes: Vec<NodeMetrics>,
    workloads: Vec<WorkloadMetrics>,
    storages: Vec<StorageMetrics>,
    degraded: Vec<DegradedNode>,
}

/// What one node contributed to a cycle.
struct NodeContribution {
    node: Option<NodeMetrics>,
    workloads: Vec<WorkloadMetrics>,
    storages: Vec<StorageMetrics>,
    failed: Vec<FetchCategory>,
}

impl ClusterCollector {
    pub fn new(clients: Vec<Arc<ApiClient>>) -> Self {
        Self { clients }
    }

    async fn collect_host(
        client: &ApiClient,
    ) -> (HostSummary, ProxmoxResult<HostContribution>) {
        let host_id = client.host_id();
        let listing = match client.get::<Vec<NodeListItem>>("nodes").await {
            Ok(listing) => listing,
            Err(error) => {
                let failure = if error.is_authentication()
                    || matches!(error, ProxmoxError::Unauthorized(_))
                {
                    warn!(host = host_id, kind = "auth", %error, "Host rejected credentials");
                    HostFailure::Authentication(error.to_string())
                } else {
                    warn!(host = host_id, kind = "transient", %error, "Host unreachable");
                    HostFailure::Unreachable(error.to_string())
                };
                let summary = HostSummary {
                    host: host_id.to_string(),
                    status: HostStatus::Offline,
                    node_count: 0,
                    failure: Some(failure),
                };
                return (summary, Err(error));
            }
        };

        let results = join_all(listing.iter().map(|item| Self::collect_node(client, item))).await;

        let mut contribution = HostContribution::default();
        for (item, result) in listing.iter().zip(results) {
            if !result.failed.is_empty() {
                contribution.degraded.push(DegradedNode {
                    host: host_id.to_string(),
                    node: item.node.clone(),
                    failed: result.failed,
                });
            }
            contribution.nodes.extend(result.node);
            contribution.workloads.extend(result.workloads);
            contribution.storages.extend(result.storages);
        }

        let status = if contribution.degraded.is_empty() {
            HostStatus::Online
        } else {
            HostStatus::Degraded
        };
        debug!(
            host = host_id,
            nodes = contribution.nodes.len(),
            degraded = contribution.degraded.len(),
            "Host collected"
        );

        let summary = HostSummary {
            host: host_id.to_string(),
            status,
            node_count: contribution.nodes.len(),
            failure: None,
        };
        (summary, Ok(contribution))
    }

    async fn collect_node(client: &ApiClient, item: &NodeListItem) -> NodeContribution {
        let host_id = client.host_id();
        let node = item.node.as_str();

        let status_path = format!("nodes/{node}/status");
        let qemu_path = format!("nodes/{node}/qemu");
        let lxc_path = format!("nodes/{node}/lxc");
        let storage_path = format!("nodes/{node}/storage");
        let (status, vms, containers, storages) = tokio::join!(
            client.get::<NodeStatus>(&status_path),
            client.get::<Vec<GuestListItem>>(&qemu_path),
            client.get::<Vec<GuestListItem>>(&lxc_path),
            client.get::<Vec<StorageListItem>>(&storage_path),
        );

        let mut failed = Vec::new();
        let mut note_failure = |category: FetchCategory, error: &ProxmoxError| {
            if error.is_authentication() || matches!(error, ProxmoxError::Unauthorized(_)) {
                warn!(host = host_id, node, ?category, kind = "auth", %error, "Node fetch rejected");
            } else {
                warn!(host = host_id, node, ?category, kind = "transient", %error, "Node fetch failed");
            }
            failed.push(category);
        };

        let mut workloads = Vec::new();
        match vms {
            Ok(list) => workloads.extend(
                list.into_iter()
                    .map(|g| workload_metrics(host_id, node, WorkloadKind::Vm, g)),
            ),
            Err(error) => note_failure(FetchCategory::Vms, &error),
        }
        match containers {
            Ok(list) => workloads.extend(
                list.into_iter()
                    .map(|g| workload_metrics(host_id, node, WorkloadKind::Container, g)),
            ),
            Err(error) => note_failure(FetchCategory::Containers, &error),
        }
        let storages = match storages {
            Ok(list) => list
                .into_iter()
                .map(|s| storage_metrics(host_id, node, s))
                .collect(),
            Err(error) => {
                note_failure(FetchCategory::Storage, &error);
                Vec::new()
            }
        };
        let status = match status {
            Ok(status) => Some(status),
            Err(error) => {
                note_failure(FetchCategory::Status, &error);
                None
            }
        };

        failed.sort();
        let degraded = !failed.is_empty();
        NodeContribution {
            node: status.map(|s| node_metrics(host_id, item, s, degraded)),
            workloads,
            storages,
            failed,
        }
    }
}

#[async_trait]
impl SnapshotSource for ClusterCollector {
    #[instrument(skip(self), fields(hosts = self.clients.len()))]
    async fn collect(&self) -> ProxmoxResult<ClusterSnapshot> {
        let collected_at = SystemTime::now();
        let results = join_all(self.clients.iter().map(|c| Self::collect_host(c))).await;

        let mut hosts = Vec::with_capacity(results.len());
        let mut merged = HostContribution::default();
        let mut errors = Vec::new();

        for (summary, result) in results {
            match result {
                Ok(contribution) => {
                    merged.nodes.extend(contribution.nodes);
                    merged.workloads.extend(contribution.workloads);
                    merged.storages.extend(contribution.storages);
                    merged.degraded.extend(contribution.degraded);
                }
                Err(error) => errors.push(format!("{}: {}", summary.host, error)),
            }
            hosts.push(summary);
        }

        if !hosts.is_empty() && errors.len() == hosts.len() {
            return Err(ProxmoxError::Collection(format!(
                "no host could be read ({})",
                errors.join("; ")
            )));
        }

        Ok(ClusterSnapshot::new(
            collected_at,
            hosts,
            merged.nodes,
            merged.workloads,
            merged.storages,
            merged.degraded,
        ))
    }
}

fn clamp_fraction(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn node_metrics(host: &str, item: &NodeListItem, status: NodeStatus, degraded: bool) -> NodeMetrics {
    let cpu_cores = if status.cpuinfo.cpus > 0 {
        status.cpuinfo.cpus
    } else {
        item.maxcpu.unwrap_or(0)
    };
    NodeMetrics {
        host: host.to_string(),
        name: item.node.clone(),
        status: NodeState::from_api(&item.status),
        cpu: clamp_fraction(status.cpu),
        cpu_cores,
        memory_used: status.memory.used,
        memory_total: status.memory.total,
        uptime: status.uptime,
        temperature: status.temperature,
        power: status.power,
        degraded,
    }
}

fn workload_metrics(
    host: &str,
    node: &str,
    kind: WorkloadKind,
    guest: GuestListItem,
) -> WorkloadMetrics {
    WorkloadMetrics {
        host: host.to_string(),
        node: node.to_string(),
        vmid: guest.vmid,
        name: guest.name.unwrap_or_else(|| guest.vmid.to_string()),
        kind,
        status: WorkloadState::from_api(&guest.status),
        cpu: clamp_fraction(guest.cpu.unwrap_or(0.0)),
        memory_used: guest.mem.unwrap_or(0),
        memory_max: guest.maxmem.unwrap_or(0),
    }
}

fn storage_metrics(host: &str, node: &str, storage: StorageListItem) -> StorageMetrics {
    StorageMetrics {
        host: host.to_string(),
        node: node.to_string(),
        storage: storage.storage,
        kind: storage.storage_type,
        total: storage.total,
        used: storage.used,
        available: storage.avail,
    }
}
