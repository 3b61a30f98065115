//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Status code reserved for a failed reference-block recency check.
pub const RECENCY_STATUS_CODE: i32 = -1;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No blob is stored under the key.
    #[error("blob not found for key {0}")]
    NotFound(String),

    /// The key is already present and keys can never be overwritten.
    #[error("key already exists: {0}")]
    AlreadyExists(String),

    /// The (encoded) blob is larger than the backend accepts.
    #[error("oversized blob: {size} bytes exceeds maximum of {max} bytes")]
    OversizedBlob {
        /// Size of the rejected blob.
        size: usize,
        /// Configured maximum size.
        max: usize,
    },

    /// A precomputed key does not hash to the supplied value.
    #[error("key does not match value digest: key {expected}, digest {actual}")]
    KeyValueMismatch {
        /// Hex of the caller-supplied key.
        expected: String,
        /// Hex of the computed digest.
        actual: String,
    },

    /// Certificate or commitment verification failed.
    #[error("verification failed (status {status}): {message}")]
    VerificationFailed {
        /// Status code reported by the verifier.
        status: i32,
        /// Description of the failure.
        message: String,
    },

    /// The certificate's reference block is outside the recency window.
    #[error("recency check failed: {0}")]
    RecencyCheckFailed(String),

    /// The DA network is unavailable and the caller should route around it.
    #[error("failover: {0}")]
    Failover(String),

    /// An operation exceeded its time budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The backend rejected the payload itself.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Builds a not-found error for a raw key.
    pub fn not_found(key: &[u8]) -> Self {
        Self::NotFound(hex::encode(key))
    }

    /// Builds an already-exists error for a raw key.
    pub fn already_exists(key: &[u8]) -> Self {
        Self::AlreadyExists(hex::encode(key))
    }

    /// Maps an instructed status code to the verification error it simulates.
    pub fn from_status_code(status: i32) -> Self {
        if status == RECENCY_STATUS_CODE {
            Self::RecencyCheckFailed("reference block number outside recency window".into())
        } else {
            Self::VerificationFailed {
                status,
                message: "certificate rejected by verifier".into(),
            }
        }
    }

    /// Returns true if this error tells the caller to use another DA system.
    pub fn is_failover(&self) -> bool {
        matches!(self, StoreError::Failover(_))
    }

    /// Returns true if the error was caused by the request rather than the backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::OversizedBlob { .. }
                | StoreError::KeyValueMismatch { .. }
                | StoreError::InvalidInput(_)
                | StoreError::NotFound(_)
        )
    }

    /// Returns true if the error is a verification-family failure.
    pub fn is_verification_error(&self) -> bool {
        matches!(
            self,
            StoreError::VerificationFailed { .. }
                | StoreError::RecencyCheckFailed(_)
                | StoreError::KeyValueMismatch { .. }
        )
    }
}
