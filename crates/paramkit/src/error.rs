//! Error types for parameter group reconciliation.
//!
//! Errors are categorized so the orchestrator can decide whether a failed
//! remote call is worth retrying. Planning stages only ever produce
//! [`Error::InvalidConfiguration`]; the remaining variants come from the
//! remote collaborator.

use thiserror::Error;

/// Categories of reconciliation errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input detected before any remote call
    InvalidConfiguration,
    /// Throttling, timeouts and other transient remote failures
    Transient,
    /// Remote service refused the parameter name, value or combination
    Rejected,
    /// Caller cancelled the operation
    Cancelled,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Errors that can occur while planning or applying parameter changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed planner input (non-positive batch size, duplicate names, ...)
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        /// What was wrong with the input
        message: String,
    },

    /// Retryable remote failure
    #[error("transient failure: {message}")]
    Transient {
        /// Error reported by the remote call
        message: String,
    },

    /// Non-retryable remote failure caused by the request contents
    #[error("rejected: {message}")]
    Rejected {
        /// Error reported by the remote call
        message: String,
    },

    /// The caller cancelled the operation
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Shorthand for [`Error::InvalidConfiguration`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Transient`].
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Rejected`].
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidConfiguration { .. } => ErrorCategory::InvalidConfiguration,
            Error::Transient { .. } => ErrorCategory::Transient,
            Error::Rejected { .. } => ErrorCategory::Rejected,
            Error::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
