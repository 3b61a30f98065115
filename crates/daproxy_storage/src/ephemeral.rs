//! In-memory, expiring, fault-injectable blob store.
//!
//! [`EphemeralStore`] stands in for a DA network in tests. It reproduces the
//! shape of the network's failure modes (failover signals, verification
//! rejections, latency) without any I/O.
//!
//! # Key lifecycle
//!
//! A key is `Absent`, `Inserted(normal)` or `Inserted(instructed)`. Inserts
//! only ever move a key out of `Absent`; only expiry pruning moves it back.
//! A present key can never be overwritten, whichever map holds it.

use crate::error::{StoreError, StoreResult};
use crate::serde_millis;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How often the pruning task scans for expired entries.
pub const PRUNE_INTERVAL: Duration = Duration::from_millis(100);

/// Default maximum blob size (16 MiB).
pub const DEFAULT_MAX_BLOB_SIZE: usize = 16 * 1024 * 1024;

/// Simulated verification outcome for newly inserted keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructedStatus {
    /// When set, new inserts are recorded with `status_code`.
    pub activated: bool,
    /// Status returned on reads; `-1` simulates a recency check failure.
    pub status_code: i32,
}

impl InstructedStatus {
    /// An activated instruction with the given status.
    pub fn active(status_code: i32) -> Self {
        Self {
            activated: true,
            status_code,
        }
    }
}

/// Behaviour knobs of an [`EphemeralStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemeralConfig {
    /// Largest accepted value.
    pub max_blob_size_bytes: usize,
    /// Age after which entries are pruned; zero disables expiry.
    #[serde(with = "serde_millis")]
    pub blob_expiration: Duration,
    /// Artificial delay before each insert.
    #[serde(with = "serde_millis")]
    pub put_latency: Duration,
    /// Artificial delay before each fetch.
    #[serde(with = "serde_millis")]
    pub get_latency: Duration,
    /// Reject every insert with a failover error.
    pub simulate_failover: bool,
    /// Instructed verification status for new inserts.
    pub instructed_status: InstructedStatus,
}

impl Default for EphemeralConfig {
    fn default() -> Self {
        Self {
            max_blob_size_bytes: DEFAULT_MAX_BLOB_SIZE,
            blob_expiration: Duration::ZERO,
            put_latency: Duration::ZERO,
            get_latency: Duration::ZERO,
            simulate_failover: false,
            instructed_status: InstructedStatus::default(),
        }
    }
}

impl EphemeralConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum blob size.
    #[must_use]
    pub fn with_max_blob_size(mut self, bytes: usize) -> Self {
        self.max_blob_size_bytes = bytes;
        self
    }

    /// Sets the blob expiration.
    #[must_use]
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.blob_expiration = expiration;
        self
    }

    /// Sets the put and get latencies.
    #[must_use]
    pub fn with_latency(mut self, put: Duration, get: Duration) -> Self {
        self.put_latency = put;
        self.get_latency = get;
        self
    }
}

/// Partial update of an [`EphemeralConfig`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemeralConfigPatch {
    /// New maximum blob size.
    pub max_blob_size_bytes: Option<usize>,
    /// New expiration.
    #[serde(with = "serde_millis::option")]
    pub blob_expiration: Option<Duration>,
    /// New put latency.
    #[serde(with = "serde_millis::option")]
    pub put_latency: Option<Duration>,
    /// New get latency.
    #[serde(with = "serde_millis::option")]
    pub get_latency: Option<Duration>,
    /// New failover flag.
    pub simulate_failover: Option<bool>,
    /// New instructed status.
    pub instructed_status: Option<InstructedStatus>,
}

impl EphemeralConfigPatch {
    /// Applies the patch in place.
    pub fn apply(&self, config: &mut EphemeralConfig) {
        if let Some(v) = self.max_blob_size_bytes {
            config.max_blob_size_bytes = v;
        }
        if let Some(v) = self.blob_expiration {
            config.blob_expiration = v;
        }
        if let Some(v) = self.put_latency {
            config.put_latency = v;
        }
        if let Some(v) = self.get_latency {
            config.get_latency = v;
        }
        if let Some(v) = self.simulate_failover {
            config.simulate_failover = v;
        }
        if let Some(v) = self.instructed_status {
            config.instructed_status = v;
        }
    }
}

/// Data and bookkeeping maps, guarded together so inserts check-then-set atomically.
#[derive(Debug, Default)]
struct Entries {
    data: HashMap<Vec<u8>, Vec<u8>>,
    instructed: HashMap<Vec<u8>, i32>,
    inserted_at: HashMap<Vec<u8>, Instant>,
}

impl Entries {
    fn contains(&self, key: &[u8]) -> bool {
        self.data.contains_key(key) || self.instructed.contains_key(key)
    }
}

/// An in-memory key/value store with expiry and fault injection.
///
/// # Thread Safety
///
/// All maps live behind one `RwLock`; it is never held across an `.await`.
///
/// # Example
///
/// ```rust
/// use daproxy_storage::{EphemeralConfig, EphemeralStore};
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let store = EphemeralStore::new(EphemeralConfig::default());
///     store.insert_entry(b"k".to_vec(), b"v".to_vec()).await.unwrap();
///     assert_eq!(store.fetch_entry(b"k").await.unwrap(), b"v");
///     assert!(store.insert_entry(b"k".to_vec(), b"w".to_vec()).await.is_err());
/// });
/// ```
#[derive(Debug, Default)]
pub struct EphemeralStore {
    config: RwLock<EphemeralConfig>,
    entries: RwLock<Entries>,
}

impl EphemeralStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(config: EphemeralConfig) -> Self {
        Self {
            config: RwLock::new(config),
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Returns a snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> EphemeralConfig {
        self.config.read().clone()
    }

    /// Applies a patch and returns the resulting configuration.
    pub fn patch_config(&self, patch: &EphemeralConfigPatch) -> EphemeralConfig {
        let mut config = self.config.write();
        patch.apply(&mut config);
        info!(config = ?*config, "ephemeral store configuration updated");
        config.clone()
    }

    /// Inserts `value` under `key`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Failover`] if failover simulation is on (nothing is stored)
    /// - [`StoreError::OversizedBlob`] if `value` is larger than the maximum
    /// - [`StoreError::AlreadyExists`] if `key` is present in either map
    pub async fn insert_entry(&self, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()> {
        let config = self.config();

        if config.simulate_failover {
            return Err(StoreError::Failover(
                "ephemeral store is simulating a DA outage".into(),
            ));
        }

        if value.len() > config.max_blob_size_bytes {
            return Err(StoreError::OversizedBlob {
                size: value.len(),
                max: config.max_blob_size_bytes,
            });
        }

        if !config.put_latency.is_zero() {
            tokio::time::sleep(config.put_latency).await;
        }

        let mut entries = self.entries.write();
        if entries.contains(&key) {
            return Err(StoreError::already_exists(&key));
        }

        if !config.blob_expiration.is_zero() {
            entries.inserted_at.insert(key.clone(), Instant::now());
        }

        if config.instructed_status.activated {
            entries
                .instructed
                .insert(key, config.instructed_status.status_code);
        } else {
            entries.data.insert(key, value);
        }
        Ok(())
    }

    /// Fetches the value stored under `key`.
    ///
    /// # Errors
    ///
    /// - the instructed verification error if `key` was inserted in instructed mode
    /// - [`StoreError::NotFound`] if `key` is absent
    pub async fn fetch_entry(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        let latency = self.config.read().get_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let entries = self.entries.read();
        if let Some(status) = entries.instructed.get(key) {
            return Err(StoreError::from_status_code(*status));
        }
        entries
            .data
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))
    }

    /// Returns the instructed error for `key`, without latency or payload access.
    pub fn instructed_error(&self, key: &[u8]) -> Option<StoreError> {
        self.entries
            .read()
            .instructed
            .get(key)
            .map(|status| StoreError::from_status_code(*status))
    }

    /// Returns true if `key` is present in either map.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.entries.read().contains(key)
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let entries = self.entries.read();
        entries.data.len() + entries.instructed.len()
    }

    /// Returns true if no key is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry older than the configured expiration.
    ///
    /// Returns the number of removed keys. Entries inserted while expiration
    /// was disabled have no insertion record and are never pruned.
    pub fn prune_expired(&self) -> usize {
        let expiration = self.config.read().blob_expiration;
        if expiration.is_zero() {
            return 0;
        }

        let now = Instant::now();
        let mut entries = self.entries.write();
        let expired: Vec<Vec<u8>> = entries
            .inserted_at
            .iter()
            .filter(|(_, at)| now.duration_since(**at) > expiration)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.data.remove(key);
            entries.instructed.remove(key);
            entries.inserted_at.remove(key);
        }
        expired.len()
    }

    /// Spawns the background pruning task.
    ///
    /// The task wakes every [`PRUNE_INTERVAL`] and stops when `cancel` fires.
    pub fn spawn_pruner(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("ephemeral store pruner stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let removed = store.prune_expired();
                        if removed > 0 {
                            debug!(removed, "pruned expired ephemeral entries");
                        }
                    }
                }
            }
        })
    }
}
