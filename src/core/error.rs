//! Error types and HTTP status mapping.
//!
//! Absent keys and failed compare-and-swap attempts are results, not
//! errors: reads return an empty result and CAS writes return `false`.
//! The variants here are the failures a caller has to react to.

use thiserror::Error;

/// Failures surfaced by the key-value core.
#[derive(Debug, Error)]
pub enum KvError {
    /// Malformed or contradictory request parameters.
    #[error("invalid request: {message}")]
    Validation { message: String },

    /// A consistent operation was requested while no leader is available.
    #[error("Unavailable: {reason}")]
    Unavailable { reason: UnavailableReason },

    /// The replication engine could not commit a mutation.
    #[error("replication failed: {message}")]
    Replication { message: String },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Why a consistent operation could not be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// No leader is currently known.
    NoLeader,
    /// A leader did not appear within the configured wait.
    LeaderWaitTimeout,
    /// The node is shutting down.
    ShuttingDown,
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoLeader => write!(f, "NoLeader"),
            Self::LeaderWaitTimeout => write!(f, "LeaderWaitTimeout"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
        }
    }
}

impl KvError {
    /// Create a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an Unavailable error with the given reason.
    pub fn unavailable(reason: UnavailableReason) -> Self {
        Self::Unavailable { reason }
    }

    /// Create a Replication error.
    pub fn replication(message: impl Into<String>) -> Self {
        Self::Replication {
            message: message.into(),
        }
    }

    /// Create an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if retrying the same request later may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Check if this error rejected the request before any submission.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Result type using KvError.
pub type KvResult<T> = Result<T, KvError>;

/// Mapping to the HTTP surface owned by the transport layer.
pub struct HttpErrorMapping;

impl HttpErrorMapping {
    /// Map an error to an HTTP status code.
    pub fn to_status_code(error: &KvError) -> u16 {
        match error {
            KvError::Validation { .. } => 400,
            KvError::Unavailable { .. } => 503,
            KvError::Replication { .. } => 500,
            KvError::Internal { .. } => 500,
        }
    }

    /// Get the message body shown to HTTP clients.
    pub fn to_error_message(error: &KvError) -> String {
        match error {
            KvError::Validation { message } => message.clone(),
            KvError::Unavailable {
                reason: UnavailableReason::ShuttingDown,
            } => "Agent is shutting down".to_string(),
            KvError::Unavailable { .. } => "No cluster leader".to_string(),
            _ => error.to_string(),
        }
    }
}
