//! Mock Proxmox hosts shared by the cross-component tests.

use crate::{
    ClusterCollector, HostCredential, SessionManager, ValidationConfig,
    core::{
        domain::model::proxmox_connection::ProxmoxConnection,
        infrastructure::api_client::ApiClient,
    },
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const GIB: u64 = 1024 * 1024 * 1024;

/// One wiremock server answering like a single-cluster PVE API.
pub struct MockHost {
    pub server: MockServer,
}

impl MockHost {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn credential(&self) -> HostCredential {
        let address = self.server.address();
        HostCredential::new(address.ip().to_string(), "monitor@pve", "secret")
            .port(address.port())
            .secure(false)
    }

    pub fn host_id(&self) -> String {
        self.credential().host_id()
    }

    pub async fn mount_login(&self) {
        Mock::given(method("POST"))
            .and(path("/api2/json/access/ticket"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "ticket": "PVE:monitor@pve:4EEC61E2::sig",
                    "CSRFPreventionToken": "4EEC61E2:abc123",
                    "username": "monitor@pve"
                }
            })))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_login_rejected(&self) {
        Mock::given(method("POST"))
            .and(path("/api2/json/access/ticket"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_nodes(&self, nodes: &[&str]) {
        let listing: Vec<Value> = nodes
            .iter()
            .map(|node| json!({"node": node, "status": "online", "type": "node"}))
            .collect();
        self.mount_get(
            "/api2/json/nodes",
            ResponseTemplate::new(200).set_body_json(json!({ "data": listing })),
        )
        .await;
    }

    pub async fn mount_status(&self, node: &str, cpu: f64, used: u64, total: u64, cpus: u32) {
        self.mount_get(
            &format!("/api2/json/nodes/{node}/status"),
            ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "cpu": cpu,
                    "memory": {"total": total, "used": used, "free": total - used},
                    "uptime": 86400,
                    "cpuinfo": {"cpus": cpus, "cores": cpus, "sockets": 1, "model": "Test CPU"},
                    "pveversion": "pve-manager/8.3.0"
                }
            })),
        )
        .await;
    }

    pub async fn mount_guests(&self, node: &str, kind: &str, guests: Value) {
        self.mount_get(
            &format!("/api2/json/nodes/{node}/{kind}"),
            ResponseTemplate::new(200).set_body_json(json!({ "data": guests })),
        )
        .await;
    }

    pub async fn mount_storage(&self, node: &str) {
        self.mount_get(
            &format!("/api2/json/nodes/{node}/storage"),
            ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "storage": "local-lvm", "type": "lvmthin", "active": 1,
                    "total": 100 * GIB, "used": 40 * GIB, "avail": 60 * GIB
                }]
            })),
        )
        .await;
    }

    /// A node with the given status figures, no guests and one storage.
    pub async fn mount_healthy_node(&self, node: &str, cpu: f64, used: u64, total: u64, cpus: u32) {
        self.mount_status(node, cpu, used, total, cpus).await;
        self.mount_guests(node, "qemu", json!([])).await;
        self.mount_guests(node, "lxc", json!([])).await;
        self.mount_storage(node).await;
    }

    /// Every endpoint of `node` answers with `status` (595: node unreachable).
    pub async fn mount_unreachable_node(&self, node: &str, status: u16) {
        for endpoint in ["status", "qemu", "lxc", "storage"] {
            self.mount_get(
                &format!("/api2/json/nodes/{node}/{endpoint}"),
                ResponseTemplate::new(status).set_body_string("no route to host"),
            )
            .await;
        }
    }

    pub async fn mount_get(&self, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}

/// Wires a collector the way the monitor builder does.
pub fn collector_for(hosts: &[&MockHost]) -> ClusterCollector {
    let connections: Vec<Arc<ProxmoxConnection>> = hosts
        .iter()
        .map(|host| {
            Arc::new(
                ProxmoxConnection::from_credential(&host.credential(), &ValidationConfig::default())
                    .unwrap(),
            )
        })
        .collect();
    let sessions = Arc::new(
        SessionManager::new(connections.iter().cloned(), Duration::from_secs(5)).unwrap(),
    );
    let clients = connections
        .iter()
        .map(|connection| {
            Arc::new(
                ApiClient::new(
                    connection.host_id(),
                    Arc::clone(&sessions),
                    Duration::from_secs(5),
                    None,
                )
                .unwrap(),
            )
        })
        .collect();
    ClusterCollector::new(clients)
}
