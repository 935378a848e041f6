use crate::core::domain::{
    error::ProxmoxResult,
    model::{host_credential::HostCredential, monitor_config::ValidationConfig},
    value_object::{
        ProxmoxHost, ProxmoxPassword, ProxmoxPort, ProxmoxRealm, ProxmoxUrl, ProxmoxUsername,
        validate_host, validate_password, validate_port, validate_realm, validate_username,
    },
};

/// Validated connection details for one host.
#[derive(Debug, Clone)]
pub struct ProxmoxConnection {
    host_id: String,
    username: ProxmoxUsername,
    password: ProxmoxPassword,
    realm: ProxmoxRealm,
    accept_invalid_certs: bool,
    url: ProxmoxUrl,
}

impl ProxmoxConnection {
    /// Validates a credential and derives the connection from it.
    ///
    /// # Errors
    /// Returns `ProxmoxError::Validation` if any field violates its rules.
    pub fn from_credential(
        credential: &HostCredential,
        config: &ValidationConfig,
    ) -> ProxmoxResult<Self> {
        validate_host(&credential.host)?;
        validate_port(credential.port)?;

        let (user, embedded_realm) = ProxmoxUsername::split_realm(&credential.username);
        let realm = credential
            .realm
            .as_deref()
            .or(embedded_realm)
            .unwrap_or(ProxmoxRealm::DEFAULT);

        validate_username(user, config.block_reserved_usernames)?;
        validate_realm(realm)?;
        validate_password(&credential.password, config.password_min_score)?;

        let host = ProxmoxHost::new_unchecked(credential.host.clone());
        let port = ProxmoxPort::new_unchecked(credential.port);
        let url = ProxmoxUrl::new(&host, port, credential.secure)?;

        Ok(Self {
            host_id: credential.host_id(),
            username: ProxmoxUsername::new_unchecked(user.to_string()),
            password: ProxmoxPassword::new_unchecked(credential.password.clone()),
            realm: ProxmoxRealm::new_unchecked(realm.to_string()),
            accept_invalid_certs: credential.accept_invalid_certs,
            url,
        })
    }

    /// Identity used for this host in snapshots and history rows.
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn username(&self) -> &ProxmoxUsername {
        &self.username
    }

    pub fn password(&self) -> &ProxmoxPassword {
        &self.password
    }

    pub fn realm(&self) -> &ProxmoxRealm {
        &self.realm
    }

    pub fn accepts_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    pub fn url(&self) -> &ProxmoxUrl {
        &self.url
    }
}
