use crate::core::domain::error::ValidationError;

/// A validated Proxmox API port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProxmoxPort(u16);

impl ProxmoxPort {
    /// Port the Proxmox API daemon listens on out of the box.
    pub const DEFAULT: u16 = 8006;

    /// Creates a new port without validation.
    pub(crate) fn new_unchecked(port: u16) -> Self {
        Self(port)
    }

    /// Returns the port number.
    #[must_use]
    pub fn get(&self) -> u16 {
        self.0
    }
}

impl Default for ProxmoxPort {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Validates a port number.
pub(crate) fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port == 0 {
        return Err(ValidationError::Field {
            field: "port".to_string(),
            message: "Port cannot be 0".to_string(),
        });
    }
    Ok(())
}
