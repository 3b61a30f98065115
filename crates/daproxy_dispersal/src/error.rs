//! Error types for dispersal.

use daproxy_storage::StoreError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::codec::CodecError;

/// Result type for dispersal operations.
pub type DispersalResult<T> = Result<T, DispersalError>;

/// Protocol status reported by a disperser or relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// The blob itself is unacceptable.
    InvalidArgument,
    /// Rate limited.
    ResourceExhausted,
    /// Unknown certificate or blob.
    NotFound,
    /// The network cannot take requests right now.
    Unavailable,
    /// The server gave up waiting.
    DeadlineExceeded,
    /// Server-side failure.
    Internal,
    /// Anything else.
    Unknown,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Errors returned by a disperser client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The request never produced a protocol response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The network asked the caller to use another DA system.
    #[error("failover requested: {0}")]
    Failover(String),

    /// The disperser answered with an error status.
    #[error("disperser returned {code}: {message}")]
    Status {
        /// Protocol status.
        code: StatusCode,
        /// Server-provided message.
        message: String,
    },
}

impl ClientError {
    /// Creates a status error.
    pub fn status(code: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Returns the protocol status, if any.
    pub fn code(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        self.code() != Some(StatusCode::InvalidArgument)
    }
}

/// Errors returned by a certificate verifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// The certificate's batch is not on chain yet.
    #[error("certificate not yet included on chain: {0}")]
    NotYetIncluded(String),

    /// The reference block is outside the recency window.
    #[error("recency check failed: {0}")]
    Recency(String),

    /// The certificate or commitment is invalid.
    #[error("invalid certificate (status {status}): {message}")]
    Invalid {
        /// Verifier status code.
        status: i32,
        /// Description.
        message: String,
    },
}

/// Errors that can occur while dispersing or retrieving blobs.
#[derive(Debug, Error)]
pub enum DispersalError {
    /// Rejected configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Disperser or relay error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Certificate verification error.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// Confirmation polling ran out of time.
    #[error("certificate not confirmed within {0:?}")]
    ConfirmationTimeout(Duration),

    /// Blob encoding error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl From<VerifyError> for StoreError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Recency(msg) => StoreError::RecencyCheckFailed(msg),
            VerifyError::Invalid { status, message } => {
                StoreError::VerificationFailed { status, message }
            }
            VerifyError::NotYetIncluded(msg) => StoreError::VerificationFailed {
                status: 0,
                message: format!("not yet included: {msg}"),
            },
        }
    }
}

impl From<ClientError> for StoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Failover(msg) => StoreError::Failover(msg),
            ClientError::Status {
                code: StatusCode::Unavailable,
                message,
            } => StoreError::Failover(message),
            ClientError::Status {
                code: StatusCode::InvalidArgument,
                message,
            } => StoreError::InvalidInput(message),
            ClientError::Status {
                code: StatusCode::NotFound,
                message,
            } => StoreError::NotFound(message),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<DispersalError> for StoreError {
    fn from(err: DispersalError) -> Self {
        match err {
            DispersalError::Client(e) => e.into(),
            DispersalError::Verify(e) => e.into(),
            DispersalError::ConfirmationTimeout(d) => {
                StoreError::Timeout(format!("certificate not confirmed within {d:?}"))
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_client_errors() {
        assert!(ClientError::Transport("connection reset".into()).is_retryable());
        assert!(ClientError::Failover("overloaded".into()).is_retryable());
        assert!(ClientError::status(StatusCode::ResourceExhausted, "slow down").is_retryable());
        assert!(ClientError::status(StatusCode::Internal, "oops").is_retryable());
        assert!(!ClientError::status(StatusCode::InvalidArgument, "bad blob").is_retryable());
    }

    #[test]
    fn store_error_mapping() {
        let err: StoreError = ClientError::Failover("down".into()).into();
        assert!(err.is_failover());

        let err: StoreError = ClientError::status(StatusCode::InvalidArgument, "bad").into();
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let err: StoreError = DispersalError::ConfirmationTimeout(Duration::from_secs(1)).into();
        assert!(matches!(err, StoreError::Timeout(_)));

        let err: StoreError = VerifyError::Recency("stale".into()).into();
        assert!(matches!(err, StoreError::RecencyCheckFailed(_)));
    }

    #[test]
    fn error_display() {
        let err = ClientError::status(StatusCode::ResourceExhausted, "rate limited");
        assert_eq!(
            err.to_string(),
            "disperser returned RESOURCE_EXHAUSTED: rate limited"
        );
    }
}
