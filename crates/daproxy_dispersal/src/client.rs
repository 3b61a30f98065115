//! Network collaborator contracts.
//!
//! The wire protocol spoken to the disperser and relays, and the on-chain
//! verification logic, live behind these traits. The stores in this crate
//! only depend on the outcomes they report.

use crate::error::{ClientError, VerifyError};
use async_trait::async_trait;
use daproxy_storage::VerifyOpts;
use std::sync::Arc;

/// Submits and retrieves encoded blobs.
#[async_trait]
pub trait DisperserClient: Send + Sync {
    /// Disperses an encoded blob and returns its certificate.
    ///
    /// For V2 networks this call returns only once the blob is certified.
    async fn disperse(&self, encoded: &[u8]) -> Result<Vec<u8>, ClientError>;

    /// Retrieves the encoded blob for a certificate.
    async fn retrieve(&self, cert: &[u8]) -> Result<Vec<u8>, ClientError>;
}

/// Checks certificates against chain state.
#[async_trait]
pub trait CertVerifier: Send + Sync {
    /// Verifies a certificate on chain.
    ///
    /// Returns [`VerifyError::NotYetIncluded`] while the certificate's batch
    /// has not been confirmed.
    async fn verify_cert(&self, cert: &[u8], opts: VerifyOpts) -> Result<(), VerifyError>;

    /// Checks that a certificate commits to an encoded blob.
    fn verify_commitment(&self, cert: &[u8], encoded: &[u8]) -> Result<(), VerifyError>;
}

#[async_trait]
impl<T: DisperserClient + ?Sized> DisperserClient for Arc<T> {
    async fn disperse(&self, encoded: &[u8]) -> Result<Vec<u8>, ClientError> {
        (**self).disperse(encoded).await
    }

    async fn retrieve(&self, cert: &[u8]) -> Result<Vec<u8>, ClientError> {
        (**self).retrieve(cert).await
    }
}

#[async_trait]
impl<T: CertVerifier + ?Sized> CertVerifier for Arc<T> {
    async fn verify_cert(&self, cert: &[u8], opts: VerifyOpts) -> Result<(), VerifyError> {
        (**self).verify_cert(cert, opts).await
    }

    fn verify_commitment(&self, cert: &[u8], encoded: &[u8]) -> Result<(), VerifyError> {
        (**self).verify_commitment(cert, encoded)
    }
}
