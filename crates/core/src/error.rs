//! Error model shared by the domain and the port contracts.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants). Infrastructure concerns have their own error types below.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed CNJ number).
    #[error("{0}")]
    Validation(String),

    /// A domain invariant was violated (e.g. a transition out of a terminal state).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Failure reported by the external registry client.
///
/// The transient/permanent split drives the retry policy: only transient
/// failures (HTTP status >= 500, timeouts, no response) are retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExternalError {
    /// Server-side failure or no response at all.
    #[error("Failed to fetch CNJ data: {message}")]
    Transient { status: Option<u16>, message: String },

    /// Client error returned by the registry (status < 500).
    #[error("Failed to fetch CNJ data: {message}")]
    Permanent { status: u16, message: String },

    /// The registry answered with a body that could not be decoded.
    #[error("Failed to fetch CNJ data: invalid response: {0}")]
    InvalidResponse(String),

    /// The circuit breaker is open and no fallback was configured.
    #[error("Circuit is OPEN")]
    CircuitOpen,

    /// The client could not be built from its configuration.
    #[error("invalid registry client configuration: {0}")]
    Configuration(String),
}

impl ExternalError {
    /// Classify an HTTP status code returned by the registry.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status >= 500 {
            Self::Transient {
                status: Some(status),
                message,
            }
        } else {
            Self::Permanent { status, message }
        }
    }

    /// A failure where no response was received (timeout, connection refused).
    pub fn no_response(message: impl Into<String>) -> Self {
        Self::Transient {
            status: None,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } => *status,
            Self::Permanent { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Persistence failure. Never retried by the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Queue failure (send, receive or acknowledge).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue connection error: {0}")]
    Connection(String),

    #[error("queue command error: {0}")]
    Command(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
