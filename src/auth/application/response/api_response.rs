use serde::Deserialize;

/// Envelope every Proxmox API response is wrapped in.
#[derive(Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}
