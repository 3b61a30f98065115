//! Generated-key store backed by an [`EphemeralStore`].

use crate::backend::{BackendType, GeneratedKeyStore, VerifyOpts};
use crate::commitment::{keccak256, CertVersion, DIGEST_LEN};
use crate::ephemeral::EphemeralStore;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Length of a memstore certificate: version byte, payload digest, nonce.
pub const MEMSTORE_CERT_LEN: usize = 1 + DIGEST_LEN + 8;

const DIGEST_RANGE: std::ops::Range<usize> = 1..1 + DIGEST_LEN;

/// Status reported when a certificate cannot be decoded.
const MALFORMED_CERT_STATUS: i32 = 1;
/// Status reported when a certificate does not commit to the payload.
const COMMITMENT_MISMATCH_STATUS: i32 = 2;
/// Status reported when a certificate was issued for another version.
const WRONG_VERSION_STATUS: i32 = 3;

/// An emulated DA network for one certificate version.
///
/// Certificates are `version || keccak256(payload) || nonce`. Identical
/// payloads get distinct keys, and memstores of different versions may share
/// one [`EphemeralStore`] without their keys colliding. A memstore refuses
/// certificates carrying another version's byte.
#[derive(Debug)]
pub struct Memstore {
    store: Arc<EphemeralStore>,
    version: CertVersion,
    nonce: AtomicU64,
}

impl Memstore {
    /// Creates a memstore issuing `version` certificates.
    pub fn new(store: Arc<EphemeralStore>, version: CertVersion) -> Self {
        Self {
            store,
            version,
            nonce: AtomicU64::new(0),
        }
    }

    /// The underlying ephemeral store, for admin patching.
    pub fn ephemeral(&self) -> &Arc<EphemeralStore> {
        &self.store
    }

    /// Certificate version this memstore issues.
    pub fn version(&self) -> CertVersion {
        self.version
    }

    fn make_cert(&self, value: &[u8]) -> Vec<u8> {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let mut cert = Vec::with_capacity(MEMSTORE_CERT_LEN);
        cert.push(self.version.as_byte());
        cert.extend_from_slice(&keccak256(value));
        cert.extend_from_slice(&nonce.to_be_bytes());
        cert
    }

    fn check_cert(&self, key: &[u8]) -> StoreResult<()> {
        self.check_version(key)?;
        if let Some(err) = self.store.instructed_error(key) {
            return Err(err);
        }
        Ok(())
    }

    fn check_version(&self, key: &[u8]) -> StoreResult<()> {
        if key.len() != MEMSTORE_CERT_LEN {
            return Err(StoreError::VerificationFailed {
                status: MALFORMED_CERT_STATUS,
                message: format!(
                    "certificate is {} bytes, expected {}",
                    key.len(),
                    MEMSTORE_CERT_LEN
                ),
            });
        }
        if key[0] != self.version.as_byte() {
            return Err(StoreError::VerificationFailed {
                status: WRONG_VERSION_STATUS,
                message: format!(
                    "certificate version byte {:#04x} is not {:?}",
                    key[0], self.version
                ),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GeneratedKeyStore for Memstore {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.check_version(key)?;
        let value = self.store.fetch_entry(key).await?;
        // retrieval checks payload integrity, like a relay would
        if key[DIGEST_RANGE] != keccak256(&value) {
            return Err(StoreError::VerificationFailed {
                status: COMMITMENT_MISMATCH_STATUS,
                message: "retrieved payload does not match certificate".into(),
            });
        }
        Ok(value)
    }

    async fn put(&self, value: &[u8]) -> StoreResult<Vec<u8>> {
        let cert = self.make_cert(value);
        self.store.insert_entry(cert.clone(), value.to_vec()).await?;
        Ok(cert)
    }

    async fn verify(&self, key: &[u8], value: &[u8], _opts: VerifyOpts) -> StoreResult<()> {
        self.check_cert(key)?;
        if key[DIGEST_RANGE] != keccak256(value) {
            return Err(StoreError::VerificationFailed {
                status: COMMITMENT_MISMATCH_STATUS,
                message: "certificate does not commit to payload".into(),
            });
        }
        Ok(())
    }

    async fn verify_cert(&self, key: &[u8], _opts: VerifyOpts) -> StoreResult<()> {
        self.check_cert(key)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memstore
    }
}
