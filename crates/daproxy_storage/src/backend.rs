//! Store capability contracts.

use crate::error::StoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of storage network behind a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    /// Legacy versioned DA network.
    DaV1,
    /// Newer versioned DA network.
    DaV2,
    /// In-memory emulation of a DA network.
    Memstore,
    /// Object store (durable, content addressed).
    ObjectStore,
    /// Cache database.
    Cache,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendType::DaV1 => "da_v1",
            BackendType::DaV2 => "da_v2",
            BackendType::Memstore => "memstore",
            BackendType::ObjectStore => "object_store",
            BackendType::Cache => "cache",
        };
        f.write_str(name)
    }
}

/// Extra inputs for certificate verification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOpts {
    /// L1 block at which the rollup batch carrying the certificate was
    /// included; enables the reference block recency check when set.
    pub l1_inclusion_block: Option<u64>,
}

impl VerifyOpts {
    /// Options with the recency check enabled against `block`.
    pub fn with_inclusion_block(block: u64) -> Self {
        Self {
            l1_inclusion_block: Some(block),
        }
    }
}

/// A store whose backend computes the key on write.
///
/// # Invariants
///
/// - `put` returns a key that `get` later resolves to the same bytes
/// - keys are never reused for different values
#[async_trait]
pub trait GeneratedKeyStore: Send + Sync {
    /// Fetches the payload for `key`.
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>>;

    /// Stores `value` and returns the backend-generated key.
    async fn put(&self, value: &[u8]) -> StoreResult<Vec<u8>>;

    /// Verifies that `key` commits to `value` and is valid on the network.
    async fn verify(&self, key: &[u8], value: &[u8], opts: VerifyOpts) -> StoreResult<()>;

    /// Verifies the certificate alone, before any payload is retrieved.
    ///
    /// Backends whose retrieval path assumes a valid certificate override
    /// this; the default accepts every key.
    async fn verify_cert(&self, _key: &[u8], _opts: VerifyOpts) -> StoreResult<()> {
        Ok(())
    }

    /// Returns the backend kind.
    fn backend_type(&self) -> BackendType;
}

/// A store keyed by a caller-supplied, content-derived key.
#[async_trait]
pub trait PrecomputedKeyStore: Send + Sync {
    /// Fetches the value stored under `key`.
    ///
    /// A miss is reported as [`crate::StoreError::NotFound`].
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>>;

    /// Stores `value` under `key`.
    async fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Checks that `key` is the digest of `value`.
    async fn verify(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Returns the backend kind.
    fn backend_type(&self) -> BackendType;
}

/// Checks that `key` is the keccak-256 digest of `value`.
pub fn verify_keccak(key: &[u8], value: &[u8]) -> StoreResult<()> {
    let digest = crate::commitment::keccak256(value);
    if key != digest.as_slice() {
        return Err(crate::StoreError::KeyValueMismatch {
            expected: hex::encode(key),
            actual: hex::encode(digest),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::keccak256;
    use crate::StoreError;

    #[test]
    fn keccak_verification() {
        let key = keccak256(b"payload");
        assert!(verify_keccak(&key, b"payload").is_ok());
        assert!(matches!(
            verify_keccak(&key, b"tampered"),
            Err(StoreError::KeyValueMismatch { .. })
        ));
    }

    #[test]
    fn backend_type_display() {
        assert_eq!(BackendType::ObjectStore.to_string(), "object_store");
        assert_eq!(BackendType::DaV2.to_string(), "da_v2");
    }
}
