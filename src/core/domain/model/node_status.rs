//! Domain model for node status from the `/nodes/{node}/status` endpoint.

use serde::{Deserialize, Serialize};

/// Detailed status information for a Proxmox node.
///
/// `temperature` and `power` are not part of a stock PVE response; they are
/// read when a host exposes them through an extension and ignored otherwise.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NodeStatus {
    /// CPU usage (0.0 to 1.0).
    #[serde(default)]
    pub cpu: f64,
    /// Memory usage in bytes.
    #[serde(default)]
    pub memory: MemoryInfo,
    /// System uptime in seconds.
    #[serde(default)]
    pub uptime: u64,
    /// CPU topology.
    #[serde(default)]
    pub cpuinfo: CpuInfo,
    /// IO delay (0.0 to 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<f64>,
    /// Kernel version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kversion: Option<String>,
    /// PVE manager version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pveversion: Option<String>,
    /// Temperature in degrees Celsius, if exposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Power draw in watts, if exposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
}

/// Memory usage information.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MemoryInfo {
    /// Total memory in bytes.
    #[serde(default)]
    pub total: u64,
    /// Used memory in bytes.
    #[serde(default)]
    pub used: u64,
    /// Free memory in bytes.
    #[serde(default)]
    pub free: u64,
}

/// CPU topology of a node.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CpuInfo {
    /// Logical CPUs (threads) available to the node.
    #[serde(default)]
    pub cpus: u32,
    #[serde(default)]
    pub cores: u32,
    #[serde(default)]
    pub sockets: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pve_status() {
        let status: NodeStatus = serde_json::from_value(serde_json::json!({
            "cpu": 0.031,
            "wait": 0.0012,
            "uptime": 86400,
            "kversion": "Linux 6.8.12-4-pve",
            "pveversion": "pve-manager/8.3.0",
            "loadavg": ["0.12", "0.20", "0.18"],
            "memory": { "total": 8589934592_u64, "used": 4294967296_u64, "free": 4294967296_u64 },
            "cpuinfo": { "cpus": 8, "cores": 4, "sockets": 1, "model": "Intel(R) Xeon(R)", "mhz": "2400.000" },
            "rootfs": { "total": 100, "used": 10, "avail": 90, "free": 90 }
        }))
        .unwrap();

        assert_eq!(status.cpuinfo.cpus, 8);
        assert_eq!(status.memory.used, 4294967296);
        assert_eq!(status.temperature, None);
    }

    #[test]
    fn test_parse_minimal_status() {
        let status: NodeStatus =
            serde_json::from_value(serde_json::json!({ "cpu": 0.5, "temperature": 48.5 })).unwrap();
        assert_eq!(status.memory, MemoryInfo::default());
        assert_eq!(status.cpuinfo.cpus, 0);
        assert_eq!(status.temperature, Some(48.5));
    }
}
