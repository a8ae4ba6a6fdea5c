use thiserror::Error;

/// Core domain errors
///
/// Expected denial outcomes (bad key, exhausted bucket, open breaker) are not
/// errors; they are carried as decision values. These variants cover the
/// conditions that genuinely fail an operation, with store unavailability
/// being the only one expected at request time.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Upstream error: {dependency} - {message}")]
    Upstream { dependency: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn upstream(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error means the shared store could not be reached.
    ///
    /// The gate treats this as fatal (fail-closed) rather than as a denial.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}
