//! Shared error type across trustgate crates.

use thiserror::Error;

/// Stable error codes surfaced to hook output and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed policy document or config.
    Configuration,
    /// Accelerated backend missing.
    AccelerationUnavailable,
    /// Audit chain failed verification.
    AuditIntegrity,
    /// Append attempted on a sealed chain.
    ChainSealed,
    /// Session never started.
    SessionNotActive,
    /// Session already ended.
    SessionClosed,
    /// Boundary encode/decode failure.
    Serialization,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Configuration => "CONFIGURATION",
            ErrorCode::AccelerationUnavailable => "ACCELERATION_UNAVAILABLE",
            ErrorCode::AuditIntegrity => "AUDIT_INTEGRITY",
            ErrorCode::ChainSealed => "CHAIN_SEALED",
            ErrorCode::SessionNotActive => "SESSION_NOT_ACTIVE",
            ErrorCode::SessionClosed => "SESSION_CLOSED",
            ErrorCode::Serialization => "SERIALIZATION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, GovernanceError>;

/// Unified error type used by core and governance.
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("acceleration unavailable: {0}")]
    AccelerationUnavailable(String),
    #[error("audit integrity violation at sequence {sequence}: {reason}")]
    AuditIntegrity { sequence: u64, reason: String },
    #[error("audit chain for session {0} is sealed")]
    ChainSealed(String),
    #[error("session not active: {0}")]
    SessionNotActive(String),
    #[error("session closed: {0}")]
    SessionClosed(String),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl GovernanceError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            GovernanceError::Configuration(_) => ErrorCode::Configuration,
            GovernanceError::AccelerationUnavailable(_) => ErrorCode::AccelerationUnavailable,
            GovernanceError::AuditIntegrity { .. } => ErrorCode::AuditIntegrity,
            GovernanceError::ChainSealed(_) => ErrorCode::ChainSealed,
            GovernanceError::SessionNotActive(_) => ErrorCode::SessionNotActive,
            GovernanceError::SessionClosed(_) => ErrorCode::SessionClosed,
            GovernanceError::Serialization(_) => ErrorCode::Serialization,
            GovernanceError::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<serde_json::Error> for GovernanceError {
    fn from(e: serde_json::Error) -> Self {
        GovernanceError::Serialization(e.to_string())
    }
}
