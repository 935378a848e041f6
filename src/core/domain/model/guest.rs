//! Domain model for guests from `/nodes/{node}/qemu` and `/nodes/{node}/lxc`.

use crate::core::domain::value_object::serde_helpers::string_or_number;
use serde::{Deserialize, Serialize};

/// A VM or container as listed on one node. Both endpoints share this shape.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GuestListItem {
    /// Guest id, unique only within one cluster.
    #[serde(with = "string_or_number")]
    pub vmid: u32,
    /// Human-readable name (templates and half-created guests may lack one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Current status (e.g., "running", "stopped").
    #[serde(default = "unknown_status")]
    pub status: String,
    /// CPU usage (0.0 to 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<f64>,
    /// Number of virtual CPUs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<f64>,
    /// Memory usage in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<u64>,
    /// Maximum memory in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxmem: Option<u64>,
    /// Uptime in seconds (if running).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

fn unknown_status() -> String {
    "unknown".to_string()
}
