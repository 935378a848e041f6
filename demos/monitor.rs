//! Polls one or more Proxmox hosts and prints a summary after every cycle.
//!
//! Hosts come from `PROXMOX_HOSTS` (comma separated `host[:port]`), the
//! shared credentials from `PROXMOX_USERNAME`, `PROXMOX_PASSWORD` and the
//! optional `PROXMOX_REALM`. A `.env` file is honoured.
//!
//! ```text
//! RUST_LOG=info,leeca_proxmox_monitor=debug cargo run --example monitor
//! ```

use leeca_proxmox_monitor::{HostCredential, ProxmoxMonitor, Readiness};
use std::env;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let username = env::var("PROXMOX_USERNAME")?;
    let password = env::var("PROXMOX_PASSWORD")?;
    let realm = env::var("PROXMOX_REALM").ok();

    let mut credentials = Vec::new();
    for entry in env::var("PROXMOX_HOSTS")?.split(',').map(str::trim) {
        let (host, port) = match entry.rsplit_once(':') {
            Some((host, port)) => (host, port.parse()?),
            None => (entry, 8006),
        };
        let mut credential = HostCredential::new(host, &username, &password)
            .port(port)
            .accept_invalid_certs(true);
        if let Some(realm) = &realm {
            credential = credential.realm(realm);
        }
        credentials.push(credential);
    }

    let monitor = ProxmoxMonitor::builder()
        .hosts(credentials)
        .interval(Duration::from_secs(10))
        .history_path("monitor-history.db")
        .build()
        .await?;
    monitor.start().await?;

    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        match monitor.readiness() {
            Readiness::NotYetCollected => println!("waiting for first cycle..."),
            Readiness::LastCycleFailed { error, consecutive_failures, .. } => {
                println!("last {consecutive_failures} cycle(s) failed: {error}")
            }
            Readiness::Healthy { .. } => {}
        }

        if let Some(snapshot) = monitor.latest_snapshot() {
            println!(
                "{:?}: {} nodes, {} cores, {:.1}% cpu, {}/{} MiB, {} of {} workloads running",
                snapshot.cluster_status(),
                snapshot.node_count(),
                snapshot.total_cpu_cores(),
                snapshot.average_cpu() * 100.0,
                snapshot.memory_used() / (1024 * 1024),
                snapshot.total_memory() / (1024 * 1024),
                snapshot.workloads_running(),
                snapshot.workloads().len(),
            );
            for host in snapshot.hosts() {
                println!("  {} {:?} ({} nodes)", host.host, host.status, host.node_count);
            }
            for degraded in snapshot.degraded_nodes() {
                println!(
                    "  degraded {}/{}: {:?}",
                    degraded.host, degraded.node, degraded.failed
                );
            }
        }

        let last_hour = monitor.history(1).await?;
        println!("  {} history points in the last hour", last_hour.len());
    }

    monitor.shutdown().await;
    Ok(())
}
