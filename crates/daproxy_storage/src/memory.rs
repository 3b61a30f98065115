//! In-memory precomputed-key store.

use crate::backend::{verify_keccak, BackendType, PrecomputedKeyStore};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory precomputed-key store.
///
/// This store keeps all values in memory and is suitable for:
/// - Unit and integration tests
/// - Stand-in cache or object-store targets in local deployments
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across tasks.
#[derive(Debug)]
pub struct MemoryKeyedStore {
    backend_type: BackendType,
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKeyedStore {
    /// Creates an empty store reporting `backend_type`.
    #[must_use]
    pub fn new(backend_type: BackendType) -> Self {
        Self {
            backend_type,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty store acting as an object store.
    #[must_use]
    pub fn object_store() -> Self {
        Self::new(BackendType::ObjectStore)
    }

    /// Creates an empty store acting as a cache.
    #[must_use]
    pub fn cache() -> Self {
        Self::new(BackendType::Cache)
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns true if `key` is stored.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.data.read().contains_key(key)
    }

    /// Stores a value without any checks. Useful for seeding corrupt data.
    pub fn insert_raw(&self, key: Vec<u8>, value: Vec<u8>) {
        self.data.write().insert(key, value);
    }

    /// Clears all values.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl Default for MemoryKeyedStore {
    fn default() -> Self {
        Self::object_store()
    }
}

#[async_trait]
impl PrecomputedKeyStore for MemoryKeyedStore {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.data
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn verify(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        verify_keccak(key, value)
    }

    fn backend_type(&self) -> BackendType {
        self.backend_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::keccak256;

    #[tokio::test]
    async fn memory_put_then_get() {
        let store = MemoryKeyedStore::object_store();
        let key = keccak256(b"data");
        store.put(&key, b"data").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"data");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn memory_get_missing() {
        let store = MemoryKeyedStore::cache();
        assert!(matches!(
            store.get(b"nope").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn memory_verify_uses_keccak() {
        let store = MemoryKeyedStore::default();
        let key = keccak256(b"data");
        assert!(store.verify(&key, b"data").await.is_ok());
        assert!(store.verify(&key, b"other").await.is_err());
    }

    #[test]
    fn memory_reports_backend_type() {
        assert_eq!(MemoryKeyedStore::cache().backend_type(), BackendType::Cache);
        assert_eq!(
            MemoryKeyedStore::object_store().backend_type(),
            BackendType::ObjectStore
        );
    }

    #[test]
    fn memory_clear() {
        let store = MemoryKeyedStore::default();
        store.insert_raw(vec![1], vec![2]);
        assert!(store.contains(&[1]));
        store.clear();
        assert!(store.is_empty());
    }
}
