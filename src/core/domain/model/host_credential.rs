//! Credentials for one Proxmox host, as handed over by the configuration loader.

use crate::core::domain::value_object::ProxmoxPort;
use serde::Deserialize;
use std::fmt;

fn default_port() -> u16 {
    ProxmoxPort::DEFAULT
}

fn default_secure() -> bool {
    true
}

/// Login data for one independently-authenticated Proxmox host.
///
/// Resolved once at startup and immutable for the lifetime of the monitor.
/// The username may carry its realm (`monitor@pve`); an explicit `realm`
/// takes precedence, and `pam` is used when neither names one.
#[derive(Clone, Deserialize)]
pub struct HostCredential {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub realm: Option<String>,
    /// Skip TLS certificate verification (self-signed PVE certificates).
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Use `https`; only test setups talk plain `http`.
    #[serde(default = "default_secure")]
    pub secure: bool,
}

impl HostCredential {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: username.into(),
            password: password.into(),
            realm: None,
            accept_invalid_certs: false,
            secure: default_secure(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Identity of the host inside snapshots and history (`host:port`).
    #[must_use]
    pub fn host_id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for HostCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCredential")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("realm", &self.realm)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("secure", &self.secure)
            .finish()
    }
}
