//! File-based precomputed-key store.

use crate::backend::{verify_keccak, BackendType, PrecomputedKeyStore};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A durable object store that keeps one file per key.
///
/// Values live at `<root>/<hex(key)>`. Writes go to a temporary file that
/// is renamed into place, so readers never observe a partial value.
///
/// # Example
///
/// ```no_run
/// use daproxy_storage::{FileObjectStore, PrecomputedKeyStore, keccak256};
/// use std::path::Path;
///
/// # async fn run() -> daproxy_storage::StoreResult<()> {
/// let store = FileObjectStore::open(Path::new("blobs")).await?;
/// let key = keccak256(b"payload");
/// store.put(&key, b"payload").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    root: PathBuf,
}

impl FileObjectStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn open(root: &Path) -> StoreResult<Self> {
        tokio::fs::create_dir_all(root).await?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &[u8]) -> PathBuf {
        self.root.join(hex::encode(key))
    }
}

#[async_trait]
impl PrecomputedKeyStore for FileObjectStore {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn verify(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        verify_keccak(key, value)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::ObjectStore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::keccak256;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_put_then_get() {
        let dir = tempdir().unwrap();
        let store = FileObjectStore::open(dir.path()).await.unwrap();

        let key = keccak256(b"persistent");
        store.put(&key, b"persistent").await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"persistent");
        assert!(dir.path().join(hex::encode(key)).exists());
    }

    #[tokio::test]
    async fn file_survives_reopen() {
        let dir = tempdir().unwrap();
        let key = keccak256(b"durable");
        {
            let store = FileObjectStore::open(dir.path()).await.unwrap();
            store.put(&key, b"durable").await.unwrap();
        }
        let store = FileObjectStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), b"durable");
    }

    #[tokio::test]
    async fn file_missing_key() {
        let dir = tempdir().unwrap();
        let store = FileObjectStore::open(&dir.path().join("nested")).await.unwrap();
        assert!(matches!(
            store.get(&[0u8; 32]).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
