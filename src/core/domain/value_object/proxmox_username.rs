use crate::core::domain::error::ValidationError;

const RESERVED_USERNAMES: [&str; 6] = [
    "root",
    "admin",
    "administrator",
    "nobody",
    "guest",
    "www-data",
];

/// A validated Proxmox username, without the `@realm` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxmoxUsername(String);

impl ProxmoxUsername {
    /// Creates a new username without validation.
    pub(crate) fn new_unchecked(username: String) -> Self {
        Self(username)
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits a `user@realm` login name into its user and realm parts.
    ///
    /// The split happens at the last `@` so user ids that contain one
    /// (e.g. `john@example.com@ldap`) keep their local part intact.
    #[must_use]
    pub fn split_realm(login: &str) -> (&str, Option<&str>) {
        match login.rsplit_once('@') {
            Some((user, realm)) if !user.is_empty() && !realm.is_empty() => (user, Some(realm)),
            _ => (login, None),
        }
    }
}

/// Validates a username according to the configuration.
pub(crate) fn validate_username(
    username: &str,
    block_reserved: bool,
) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::Field {
            field: "username".to_string(),
            message: "Username cannot be empty".to_string(),
        });
    }
    if username.len() > 64 {
        return Err(ValidationError::Format(format!(
            "Username cannot exceed 64 characters (got {})",
            username.len()
        )));
    }
    let allowed =
        |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '@';
    if !username.chars().all(allowed) {
        return Err(ValidationError::Format(
            "Username contains invalid characters. Allowed: alphanumeric, -, _, ., @".to_string(),
        ));
    }
    if block_reserved && RESERVED_USERNAMES.contains(&username) {
        return Err(ValidationError::ConstraintViolation(
            "Username is reserved".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username_valid() {
        assert!(validate_username("monitor", false).is_ok());
        assert!(validate_username("john.doe", false).is_ok());
        assert!(validate_username("root", false).is_ok());
        assert!(validate_username("root", true).is_err());
    }

    #[test]
    fn test_validate_username_invalid() {
        assert!(validate_username("", false).is_err());
        assert!(validate_username(&"a".repeat(65), false).is_err());
        assert!(validate_username("user$name", false).is_err());
        assert!(validate_username("user name", false).is_err());
    }

    #[test]
    fn test_split_realm() {
        assert_eq!(ProxmoxUsername::split_realm("root@pam"), ("root", Some("pam")));
        assert_eq!(
            ProxmoxUsername::split_realm("john@example.com@ldap"),
            ("john@example.com", Some("ldap"))
        );
        assert_eq!(ProxmoxUsername::split_realm("monitor"), ("monitor", None));
        assert_eq!(ProxmoxUsername::split_realm("monitor@"), ("monitor@", None));
    }
}
