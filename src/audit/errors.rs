//! Audit error types
//!
//! Audit failures are isolated from the validation path: they are logged
//! and counted by the drain worker, never returned to `evaluate` callers.

use std::io;

use thiserror::Error;

/// Result type for audit operations
pub type AuditResult<T> = Result<T, AuditError>;

/// Audit errors
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Audit serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl AuditError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            AuditError::Io(_) => "TIERGUARD_AUDIT_IO",
            AuditError::Serialize(_) => "TIERGUARD_AUDIT_SERIALIZE",
        }
    }
}
