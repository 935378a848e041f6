pub mod guest;
pub mod history;
pub mod host_credential;
pub mod monitor_config;
pub mod node_list_item;
pub mod node_status;
pub mod proxmox_connection;
pub mod session;
pub mod snapshot;
pub mod storage;
