use super::common::{GIB, MockHost, collector_for};
use crate::{
    ClusterStatus, FetchCategory, HostFailure, HostStatus, ProxmoxError, SnapshotSource,
    WorkloadKey, WorkloadKind, WorkloadState,
};
use serde_json::json;
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{header, method, path, path_regex},
};

#[tokio::test]
async fn test_partial_outage_across_two_hosts() {
    let host_a = MockHost::start().await;
    host_a.mount_login().await;
    host_a.mount_nodes(&["node1", "node2"]).await;
    host_a.mount_healthy_node("node1", 0.30, 4 * GIB, 8 * GIB, 4).await;
    host_a.mount_unreachable_node("node2", 595).await;

    let host_b = MockHost::start().await;
    host_b.mount_login().await;
    host_b.mount_nodes(&["node1"]).await;
    host_b.mount_healthy_node("node1", 0.10, GIB, 2 * GIB, 2).await;

    let snapshot = collector_for(&[&host_a, &host_b]).collect().await.unwrap();

    assert_eq!(snapshot.node_count(), 2);
    assert_eq!(snapshot.total_cpu_cores(), 6);
    assert_eq!(snapshot.total_memory(), 10 * GIB);
    assert_eq!(snapshot.memory_used(), 5 * GIB);
    assert_eq!(snapshot.cluster_status(), ClusterStatus::Online);
    assert!((snapshot.average_cpu() - 0.20).abs() < 1e-9);

    let read: Vec<(&str, &str)> = snapshot
        .nodes()
        .iter()
        .map(|n| (n.host.as_str(), n.name.as_str()))
        .collect();
    assert!(read.contains(&(host_a.host_id().as_str(), "node1")));
    assert!(read.contains(&(host_b.host_id().as_str(), "node1")));

    assert_eq!(snapshot.degraded_nodes().len(), 1);
    let degraded = &snapshot.degraded_nodes()[0];
    assert_eq!(degraded.host, host_a.host_id());
    assert_eq!(degraded.node, "node2");
    assert_eq!(
        degraded.failed,
        vec![
            FetchCategory::Status,
            FetchCategory::Vms,
            FetchCategory::Containers,
            FetchCategory::Storage
        ]
    );

    assert_eq!(
        snapshot.host(&host_a.host_id()).unwrap().status,
        HostStatus::Degraded
    );
    assert_eq!(
        snapshot.host(&host_b.host_id()).unwrap().status,
        HostStatus::Online
    );
    assert_eq!(snapshot.storages().len(), 2);
}

#[tokio::test]
async fn test_rejected_credentials_do_not_block_other_hosts() {
    let host_a = MockHost::start().await;
    host_a.mount_login_rejected().await;

    let host_b = MockHost::start().await;
    host_b.mount_login().await;
    host_b.mount_nodes(&["node1"]).await;
    host_b.mount_healthy_node("node1", 0.10, GIB, 2 * GIB, 2).await;

    let snapshot = collector_for(&[&host_a, &host_b]).collect().await.unwrap();

    assert_eq!(snapshot.node_count(), 1);
    assert_eq!(snapshot.nodes()[0].host, host_b.host_id());
    assert_eq!(snapshot.cluster_status(), ClusterStatus::Online);

    let summary = snapshot.host(&host_a.host_id()).unwrap();
    assert_eq!(summary.status, HostStatus::Offline);
    assert_eq!(summary.node_count, 0);
    assert!(matches!(
        summary.failure,
        Some(HostFailure::Authentication(_))
    ));
}

#[tokio::test]
async fn test_unreachable_host_is_marked_offline() {
    let host_a = MockHost::start().await;
    host_a.mount_login().await;
    host_a
        .mount_get("/api2/json/nodes", ResponseTemplate::new(500))
        .await;

    let host_b = MockHost::start().await;
    host_b.mount_login().await;
    host_b.mount_nodes(&[]).await;

    let snapshot = collector_for(&[&host_a, &host_b]).collect().await.unwrap();

    let summary = snapshot.host(&host_a.host_id()).unwrap();
    assert!(matches!(summary.failure, Some(HostFailure::Unreachable(_))));
    // A host without nodes still counts as read; the cluster has no nodes though.
    assert_eq!(snapshot.cluster_status(), ClusterStatus::Offline);
}

#[tokio::test]
async fn test_every_host_failing_is_a_collection_error() {
    let host_a = MockHost::start().await;
    host_a.mount_login_rejected().await;
    let host_b = MockHost::start().await;
    host_b.mount_login().await;
    host_b
        .mount_get("/api2/json/nodes", ResponseTemplate::new(503))
        .await;

    let result = collector_for(&[&host_a, &host_b]).collect().await;
    assert!(matches!(result, Err(ProxmoxError::Collection(_))));
}

#[tokio::test]
async fn test_workload_ids_are_scoped_by_host() {
    let mut hosts = Vec::new();
    for name in ["web", "db"] {
        let host = MockHost::start().await;
        host.mount_login().await;
        host.mount_nodes(&["node1"]).await;
        host.mount_status("node1", 0.2, GIB, 2 * GIB, 2).await;
        host.mount_guests(
            "node1",
            "qemu",
            json!([{"vmid": 100, "name": name, "status": "running", "cpu": 0.5,
                    "mem": GIB, "maxmem": 2 * GIB}]),
        )
        .await;
        host.mount_guests(
            "node1",
            "lxc",
            json!([{"vmid": "200", "name": format!("{name}-ct"), "status": "stopped"}]),
        )
        .await;
        host.mount_storage("node1").await;
        hosts.push(host);
    }

    let snapshot = collector_for(&[&hosts[0], &hosts[1]])
        .collect()
        .await
        .unwrap();

    assert_eq!(snapshot.workloads().len(), 4);
    assert_eq!(snapshot.workloads_running(), 2);

    let db_vm = snapshot
        .workload(&WorkloadKey {
            host: hosts[1].host_id(),
            node: "node1".to_string(),
            vmid: 100,
        })
        .unwrap();
    assert_eq!(db_vm.name, "db");
    assert_eq!(db_vm.kind, WorkloadKind::Vm);

    let web_ct = snapshot
        .workload(&WorkloadKey {
            host: hosts[0].host_id(),
            node: "node1".to_string(),
            vmid: 200,
        })
        .unwrap();
    assert_eq!(web_ct.kind, WorkloadKind::Container);
    assert_eq!(web_ct.status, WorkloadState::Stopped);

    for workload in snapshot.workloads() {
        assert!(snapshot.knows_node(&workload.host, &workload.node));
    }
}

#[tokio::test]
async fn test_failed_category_degrades_node_only() {
    let host = MockHost::start().await;
    host.mount_login().await;
    host.mount_nodes(&["node1"]).await;
    host.mount_status("node1", 0.25, GIB, 4 * GIB, 8).await;
    host.mount_guests(
        "node1",
        "qemu",
        json!([{"vmid": 101, "name": "app", "status": "running"}]),
    )
    .await;
    host.mount_guests("node1", "lxc", json!([])).await;
    host.mount_get(
        "/api2/json/nodes/node1/storage",
        ResponseTemplate::new(500).set_body_string("storage backend timeout"),
    )
    .await;

    let snapshot = collector_for(&[&host]).collect().await.unwrap();

    assert_eq!(snapshot.node_count(), 1);
    assert!(snapshot.nodes()[0].degraded);
    assert_eq!(snapshot.workloads().len(), 1);
    assert!(snapshot.storages().is_empty());
    assert_eq!(
        snapshot.degraded_nodes()[0].failed,
        vec![FetchCategory::Storage]
    );
    assert_eq!(
        snapshot.host(&host.host_id()).unwrap().status,
        HostStatus::Degraded
    );
}

#[tokio::test]
async fn test_guests_of_unreadable_node_are_kept_with_degraded_marker() {
    let host = MockHost::start().await;
    host.mount_login().await;
    host.mount_nodes(&["node1"]).await;
    host.mount_get("/api2/json/nodes/node1/status", ResponseTemplate::new(500))
        .await;
    host.mount_guests(
        "node1",
        "qemu",
        json!([{"vmid": 101, "name": "app", "status": "running"}]),
    )
    .await;
    host.mount_guests("node1", "lxc", json!([])).await;
    host.mount_storage("node1").await;

    let snapshot = collector_for(&[&host]).collect().await.unwrap();

    assert_eq!(snapshot.node_count(), 0);
    assert_eq!(snapshot.workloads().len(), 1);
    let workload = &snapshot.workloads()[0];
    assert!(snapshot.knows_node(&workload.host, &workload.node));
    assert_eq!(
        snapshot.degraded_nodes()[0].failed,
        vec![FetchCategory::Status]
    );
}

#[tokio::test]
async fn test_concurrent_rejections_trigger_one_reauthentication() {
    let host = MockHost::start().await;

    Mock::given(method("POST"))
        .and(path("/api2/json/access/ticket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "ticket": "PVE:monitor@pve:4EEC61E2::old",
                "CSRFPreventionToken": "4EEC61E2:abc123"
            }
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&host.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api2/json/access/ticket"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "data": {
                        "ticket": "PVE:monitor@pve:4EEC61E2::new",
                        "CSRFPreventionToken": "4EEC61E2:abc123"
                    }
                }))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&host.server)
        .await;

    // The old ticket still lists nodes but is rejected by every per-node call.
    Mock::given(method("GET"))
        .and(path_regex(r"^/api2/json/nodes/[^/]+/.+$"))
        .and(header("Cookie", "PVEAuthCookie=PVE:monitor@pve:4EEC61E2::old"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&host.server)
        .await;

    host.mount_nodes(&["node1", "node2"]).await;
    host.mount_healthy_node("node1", 0.1, GIB, 2 * GIB, 2).await;
    host.mount_healthy_node("node2", 0.3, GIB, 2 * GIB, 2).await;

    let snapshot = collector_for(&[&host]).collect().await.unwrap();

    assert_eq!(snapshot.node_count(), 2);
    assert!(snapshot.degraded_nodes().is_empty());
}

#[tokio::test]
async fn test_failed_reauthentication_is_not_repeated_by_sibling_fetches() {
    let host = MockHost::start().await;

    Mock::given(method("POST"))
        .and(path("/api2/json/access/ticket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "ticket": "PVE:monitor@pve:4EEC61E2::revoked",
                "CSRFPreventionToken": "4EEC61E2:abc123"
            }
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&host.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api2/json/access/ticket"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&host.server)
        .await;

    host.mount_nodes(&["node1"]).await;
    // Each category is rejected 150 ms after the previous one.
    for (endpoint, delay) in [("status", 0), ("qemu", 150), ("lxc", 300), ("storage", 450)] {
        host.mount_get(
            &format!("/api2/json/nodes/node1/{endpoint}"),
            ResponseTemplate::new(401).set_delay(std::time::Duration::from_millis(delay)),
        )
        .await;
    }

    let snapshot = collector_for(&[&host]).collect().await.unwrap();

    assert_eq!(snapshot.node_count(), 0);
    assert_eq!(
        snapshot.degraded_nodes()[0].failed,
        vec![
            FetchCategory::Status,
            FetchCategory::Vms,
            FetchCategory::Containers,
            FetchCategory::Storage
        ]
    );
}
