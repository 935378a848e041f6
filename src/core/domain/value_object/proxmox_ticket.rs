use crate::core::domain::error::ValidationError;

/// A Proxmox authentication ticket, sent as the `PVEAuthCookie` cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxTicket(String);

impl ProxmoxTicket {
    /// Creates a new ticket without validation.
    pub(crate) fn new_unchecked(value: String) -> Self {
        Self(value)
    }

    /// Returns the ticket value as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Formats the ticket as a cookie header.
    #[must_use]
    pub fn as_cookie_header(&self) -> String {
        format!("PVEAuthCookie={}", self.0)
    }
}

/// Validates the format of a ticket string.
pub(crate) fn validate_ticket(ticket: &str) -> Result<(), ValidationError> {
    if ticket.is_empty() {
        return Err(ValidationError::Field {
            field: "ticket".to_string(),
            message: "Ticket cannot be empty".to_string(),
        });
    }
    let parts: Vec<&str> = ticket.split(':').collect();
    if parts.len() < 5 || parts[0] != "PVE" {
        return Err(ValidationError::Format(
            "Invalid ticket format: must start with 'PVE:' and have at least 5 parts".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ticket() {
        assert!(validate_ticket("PVE:monitor@pve:4EEC61E2::c2lnbmF0dXJl").is_ok());
        assert!(validate_ticket("").is_err());
        assert!(validate_ticket("PMG:monitor@pve:4EEC61E2::sig").is_err());
        assert!(validate_ticket("PVE:monitor").is_err());
    }

    #[test]
    fn test_cookie_header() {
        let ticket = ProxmoxTicket::new_unchecked("PVE:a@pam:1::s".to_string());
        assert_eq!(ticket.as_cookie_header(), "PVEAuthCookie=PVE:a@pam:1::s");
    }
}
