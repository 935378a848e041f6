use crate::core::domain::{
    error::{ProxmoxResult, ValidationError},
    value_object::{ProxmoxHost, ProxmoxPort},
};
use url::Url;

/// Base URL of a Proxmox API endpoint, e.g. `https://pve1.lan:8006/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxUrl(Url);

impl ProxmoxUrl {
    /// Builds the base URL from a validated host and port.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Validation` if the parts do not form a valid URL.
    pub fn new(host: &ProxmoxHost, port: ProxmoxPort, secure: bool) -> ProxmoxResult<Self> {
        let scheme = if secure { "https" } else { "http" };
        let authority = if host.is_ipv6() {
            format!("[{}]", host.as_str())
        } else {
            host.as_str().to_string()
        };
        let raw = format!("{}://{}:{}/", scheme, authority, port.get());
        let url = Url::parse(&raw)
            .map_err(|e| ValidationError::Format(format!("Invalid URL format: {}", e)))?;
        Ok(Self(url))
    }

    /// Returns the base URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Builds the full URL of an API path below `/api2/json/`.
    #[must_use]
    pub fn api_path(&self, path: &str) -> String {
        format!(
            "{}/api2/json/{}",
            self.0.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
