//! Fault-injecting precomputed-key store for tests.

use crate::backend::{BackendType, PrecomputedKeyStore};
use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryKeyedStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// A [`MemoryKeyedStore`] whose reads and writes can be made to fail.
///
/// Counters record every call so tests can assert on routing order.
#[derive(Debug)]
pub struct FaultyStore {
    inner: MemoryKeyedStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    corrupt_reads: AtomicBool,
    write_delay: RwLock<Duration>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl FaultyStore {
    /// Creates a healthy store reporting `backend_type`.
    pub fn new(backend_type: BackendType) -> Self {
        Self {
            inner: MemoryKeyedStore::new(backend_type),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            corrupt_reads: AtomicBool::new(false),
            write_delay: RwLock::new(Duration::ZERO),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Makes every read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes reads return bytes that fail verification.
    pub fn set_corrupt_reads(&self, corrupt: bool) {
        self.corrupt_reads.store(corrupt, Ordering::SeqCst);
    }

    /// Delays every write.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.write() = delay;
    }

    /// Number of `get` calls seen.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `put` calls seen.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// The wrapped store.
    pub fn inner(&self) -> &MemoryKeyedStore {
        &self.inner
    }
}

#[async_trait]
impl PrecomputedKeyStore for FaultyStore {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected read failure".into()));
        }
        let mut value = self.inner.get(key).await?;
        if self.corrupt_reads.load(Ordering::SeqCst) {
            value.push(0xff);
        }
        Ok(value)
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.write_delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".into()));
        }
        self.inner.put(key, value).await
    }

    async fn verify(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.inner.verify(key, value).await
    }

    fn backend_type(&self) -> BackendType {
        self.inner.backend_type()
    }
}
