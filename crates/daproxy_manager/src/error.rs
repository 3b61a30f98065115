//! Error types for the storage manager.

use daproxy_storage::{StoreError, UnknownVariant};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Role of a secondary target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRole {
    /// Consulted before the primary.
    Cache,
    /// Consulted after a primary failure.
    Fallback,
}

impl fmt::Display for TargetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRole::Cache => f.write_str("cache"),
            TargetRole::Fallback => f.write_str("fallback"),
        }
    }
}

/// Errors that can occur in the storage manager.
#[derive(Error, Debug)]
pub enum ManagerError {
    /// The request named a commitment mode this proxy does not serve.
    #[error("unknown commitment mode: {0}")]
    UnknownCommitmentMode(String),

    /// The request needs a backend that was not constructed.
    #[error("backend not configured: {0}")]
    UnconfiguredBackend(String),

    /// Every candidate in a secondary role failed.
    #[error("all {attempted} {role} targets failed: {cause}")]
    AllTargetsFailed {
        /// Role whose targets were tried.
        role: TargetRole,
        /// Number of targets tried.
        attempted: usize,
        /// Last failure, prefixed by the primary error for fallback reads.
        cause: String,
    },

    /// Rejected configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backend error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<UnknownVariant> for ManagerError {
    fn from(err: UnknownVariant) -> Self {
        ManagerError::UnknownCommitmentMode(err.0)
    }
}

impl ManagerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        match self {
            ManagerError::UnknownCommitmentMode(_) | ManagerError::UnconfiguredBackend(_) => true,
            ManagerError::Store(e) => e.is_client_error(),
            _ => false,
        }
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns true if the caller should route around this DA system.
    pub fn is_failover(&self) -> bool {
        matches!(self, ManagerError::Store(e) if e.is_failover())
    }

    /// HTTP status for the front door.
    pub fn http_status(&self) -> u16 {
        match self {
            ManagerError::Store(StoreError::NotFound(_)) => 404,
            _ if self.is_failover() => 503,
            _ if self.is_client_error() => 400,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ManagerError::UnknownCommitmentMode("x".into()).is_client_error());
        assert!(ManagerError::InvalidConfig("bad".into()).is_server_error());
        assert!(ManagerError::Store(StoreError::OversizedBlob { size: 2, max: 1 }).is_client_error());
        assert!(ManagerError::Store(StoreError::Backend("down".into())).is_server_error());
    }

    #[test]
    fn http_status_mapping() {
        let failover = ManagerError::Store(StoreError::Failover("no capacity".into()));
        assert!(failover.is_failover());
        assert_eq!(failover.http_status(), 503);

        let missing = ManagerError::Store(StoreError::NotFound("ab".into()));
        assert_eq!(missing.http_status(), 404);

        let mismatch = ManagerError::Store(StoreError::KeyValueMismatch {
            expected: "aa".into(),
            actual: "bb".into(),
        });
        assert_eq!(mismatch.http_status(), 400);

        let verify = ManagerError::Store(StoreError::VerificationFailed {
            status: 3,
            message: "bad sig".into(),
        });
        assert_eq!(verify.http_status(), 500);

        let exhausted = ManagerError::AllTargetsFailed {
            role: TargetRole::Fallback,
            attempted: 2,
            cause: "down".into(),
        };
        assert_eq!(exhausted.http_status(), 500);
    }

    #[test]
    fn unknown_mode_from_parse() {
        let err: ManagerError = "optimism_banana"
            .parse::<daproxy_storage::CommitmentMode>()
            .unwrap_err()
            .into();
        assert!(matches!(err, ManagerError::UnknownCommitmentMode(m) if m == "optimism_banana"));
    }

    #[test]
    fn error_display() {
        let err = ManagerError::AllTargetsFailed {
            role: TargetRole::Cache,
            attempted: 3,
            cause: "timeout".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3"));
        assert!(msg.contains("cache"));
    }
}
