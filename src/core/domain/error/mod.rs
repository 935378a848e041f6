use thiserror::Error;

/// The main error type for monitoring operations.
///
/// This enum represents all possible errors that can occur while
/// authenticating against a host, collecting cluster state, persisting
/// history or validating configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProxmoxError {
    /// Represents network, timeout or connection failures on a single call
    ///
    /// # Fields
    /// * `0` - A description of what went wrong during the call
    #[error("Connection error: {0}")]
    Connection(String),

    /// Represents a non-success HTTP status other than `401 Unauthorized`
    ///
    /// # Fields
    /// * `status` - The HTTP status code returned by the host
    /// * `message` - The response body or a short description
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Represents credentials rejected by the host during login
    ///
    /// # Fields
    /// * `0` - A description of the authentication failure
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Represents an existing session rejected by the host on a data call
    ///
    /// # Fields
    /// * `0` - The request path that was rejected
    #[error("Session rejected by host: {0}")]
    Unauthorized(String),

    /// Represents a collection cycle that produced no usable data
    #[error("Collection error: {0}")]
    Collection(String),

    /// Represents a failure writing to or reading from the history store
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Represents validation failures with detailed context
    ///
    /// # Fields
    /// * `source` - The underlying validation error
    #[error("Validation error: {source}")]
    Validation { source: ValidationError },

    /// A host id that is not part of the configured host list
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    /// The monitor is shutting down and no longer accepts work
    #[error("Monitor is shutting down")]
    Shutdown,
}

impl ProxmoxError {
    /// Returns `true` if the host rejected the configured credentials.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, ProxmoxError::Authentication(_))
    }

    /// Returns `true` for failures that may go away on the next cycle.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProxmoxError::Connection(_) | ProxmoxError::Api { .. } | ProxmoxError::Unauthorized(_)
        )
    }
}

impl From<ValidationError> for ProxmoxError {
    fn from(error: ValidationError) -> Self {
        ProxmoxError::Validation { source: error }
    }
}

impl From<sqlx::Error> for ProxmoxError {
    fn from(error: sqlx::Error) -> Self {
        ProxmoxError::Persistence(error.to_string())
    }
}

/// Specialized error type for validation failures.
///
/// This enum provides detailed context about why a validation
/// failed, including field-specific errors and format violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Represents a validation failure for a specific field
    ///
    /// # Fields
    /// * `field` - The name of the field that failed validation
    /// * `message` - A detailed message about why validation failed
    #[error("Field '{field}' validation failed: {message}")]
    Field { field: String, message: String },

    /// Represents format/syntax validation failures
    ///
    /// # Fields
    /// * `0` - Description of the format violation
    #[error("Format error: {0}")]
    Format(String),

    /// Represents violations of domain constraints
    ///
    /// # Fields
    /// * `0` - Description of the constraint violation
    #[error("Domain constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Type alias for Results that may fail with a ProxmoxError
pub type ProxmoxResult<T> = Result<T, ProxmoxError>;
