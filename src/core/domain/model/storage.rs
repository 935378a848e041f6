//! Domain model for storages from the `/nodes/{node}/storage` endpoint.

use serde::{Deserialize, Serialize};

/// A storage as seen from one node.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageListItem {
    /// Storage identifier (e.g., `local`, `local-lvm`).
    pub storage: String,
    /// Storage plugin type (e.g., `dir`, `zfspool`, `lvmthin`).
    #[serde(rename = "type", default = "unknown_type")]
    pub storage_type: String,
    /// Total capacity in bytes.
    #[serde(default)]
    pub total: u64,
    /// Used space in bytes.
    #[serde(default)]
    pub used: u64,
    /// Available space in bytes.
    #[serde(default)]
    pub avail: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<u8>,
}

fn unknown_type() -> String {
    "unknown".to_string()
}
