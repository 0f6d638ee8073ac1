use thiserror::Error;

/// Errors surfaced by cache tiers and the orchestrator
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unavailable: {dependency} - {message}")]
    Unavailable { dependency: String, message: String },

    #[error("Transient I/O error: {message}")]
    TransientIo { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Partial failure: {}", failures.join("; "))]
    PartialFailure { failures: Vec<String> },
}

impl CacheError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unavailable(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientIo {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn partial_failure(failures: Vec<String>) -> Self {
        Self::PartialFailure { failures }
    }

    /// Validation errors are the only kind the orchestrator surfaces to callers
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Whether this error should count toward a circuit breaker's failure threshold
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, Self::TransientIo { .. } | Self::Internal { .. })
    }
}
