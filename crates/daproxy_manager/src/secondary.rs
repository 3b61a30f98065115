//! Secondary redundancy router.
//!
//! Secondary targets are precomputed-key stores holding copies of blobs whose
//! primary lives on a generated-key backend. Copies are keyed by
//! `keccak256(commitment)`. Each target plays exactly one role:
//!
//! - **cache**: read before the primary, for latency
//! - **fallback**: read after a primary failure, for availability
//!
//! Writes go to every target and succeed if any target accepts them. Reads
//! walk one role's targets in configured order and return the first copy
//! that passes the caller's verification.

use crate::error::{ManagerError, ManagerResult, TargetRole};
use async_trait::async_trait;
use daproxy_storage::{keccak256, verify_keccak, PrecomputedKeyStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Checks a secondary copy before it is trusted.
#[async_trait]
pub trait PayloadVerifier: Send + Sync {
    /// Verifies that `data` is the blob committed to by `commitment`.
    async fn verify(&self, commitment: &[u8], data: &[u8]) -> StoreResult<()>;
}

/// Verifies that the commitment is the keccak digest of the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeccakVerifier;

#[async_trait]
impl PayloadVerifier for KeccakVerifier {
    async fn verify(&self, commitment: &[u8], data: &[u8]) -> StoreResult<()> {
        verify_keccak(commitment, data)
    }
}

/// A completed primary write awaiting replication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutNotification {
    /// Commitment returned by the primary.
    pub commitment: Vec<u8>,
    /// Blob payload.
    pub value: Vec<u8>,
}

/// A named precomputed-key store.
#[derive(Clone)]
pub struct SecondaryTarget {
    name: String,
    store: Arc<dyn PrecomputedKeyStore>,
}

impl SecondaryTarget {
    /// Creates a target.
    pub fn new(name: impl Into<String>, store: Arc<dyn PrecomputedKeyStore>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    /// Target name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SecondaryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecondaryTarget")
            .field("name", &self.name)
            .field("backend", &self.store.backend_type())
            .finish()
    }
}

/// Per-target counters.
#[derive(Debug, Default)]
struct TargetCounters {
    write_successes: AtomicU64,
    write_failures: AtomicU64,
    read_hits: AtomicU64,
    read_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
enum Event {
    WriteOk,
    WriteErr,
    ReadHit,
    ReadErr,
}

/// Snapshot of one target's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStats {
    /// Target name.
    pub name: String,
    /// Target role.
    pub role: TargetRole,
    /// Successful writes.
    pub write_successes: u64,
    /// Failed writes.
    pub write_failures: u64,
    /// Reads that returned a verified copy.
    pub read_hits: u64,
    /// Reads that failed or did not verify.
    pub read_failures: u64,
}

/// Owns the cache and fallback targets.
///
/// # Invariants
///
/// - a target name appears in at most one role, at most once
/// - the target lists are fixed after construction
#[derive(Debug, Default)]
pub struct SecondaryRouter {
    caches: Vec<SecondaryTarget>,
    fallbacks: Vec<SecondaryTarget>,
    counters: HashMap<String, TargetCounters>,
}

impl SecondaryRouter {
    /// Creates a router.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidConfig`] if a name is repeated within or
    /// across the lists.
    pub fn new(
        caches: Vec<SecondaryTarget>,
        fallbacks: Vec<SecondaryTarget>,
    ) -> ManagerResult<Self> {
        let mut seen = HashSet::new();
        for target in caches.iter().chain(&fallbacks) {
            if !seen.insert(target.name.as_str()) {
                return Err(ManagerError::InvalidConfig(format!(
                    "secondary target {} is configured more than once",
                    target.name
                )));
            }
        }

        let counters = caches
            .iter()
            .chain(&fallbacks)
            .map(|t| (t.name.clone(), TargetCounters::default()))
            .collect();

        Ok(Self {
            caches,
            fallbacks,
            counters,
        })
    }

    /// A router with no targets.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if cache targets are configured.
    pub fn caching_enabled(&self) -> bool {
        !self.caches.is_empty()
    }

    /// True if fallback targets are configured.
    pub fn fallback_enabled(&self) -> bool {
        !self.fallbacks.is_empty()
    }

    /// True if any target is configured.
    pub fn enabled(&self) -> bool {
        self.caching_enabled() || self.fallback_enabled()
    }

    /// Targets for `role`, in configured order.
    pub fn targets(&self, role: TargetRole) -> &[SecondaryTarget] {
        match role {
            TargetRole::Cache => &self.caches,
            TargetRole::Fallback => &self.fallbacks,
        }
    }

    /// Writes `value` to every target under `keccak256(commitment)`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::AllTargetsFailed`] only if every target
    /// failed; partial failures are logged.
    pub async fn handle_redundant_writes(&self, commitment: &[u8], value: &[u8]) -> ManagerResult<()> {
        let key = keccak256(commitment);
        let mut attempted = 0;
        let mut failed = 0;
        let mut last_error = None;

        for target in self.caches.iter().chain(&self.fallbacks) {
            attempted += 1;
            match target.store.put(&key, value).await {
                Ok(()) => {
                    self.record(&target.name, Event::WriteOk);
                    debug!(target = %target.name, "secondary write succeeded");
                }
                Err(e) => {
                    failed += 1;
                    self.record(&target.name, Event::WriteErr);
                    warn!(target = %target.name, error = %e, "secondary write failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if failed == attempted => Err(ManagerError::AllTargetsFailed {
                // writes span both roles
                role: if self.caching_enabled() {
                    TargetRole::Cache
                } else {
                    TargetRole::Fallback
                },
                attempted,
                cause: e.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Reads a verified copy from the `role` targets.
    ///
    /// Read failures and verification failures both move on to the next
    /// target.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::AllTargetsFailed`] if no target produced a
    /// verified copy.
    pub async fn multi_source_read(
        &self,
        commitment: &[u8],
        role: TargetRole,
        verifier: &dyn PayloadVerifier,
    ) -> ManagerResult<Vec<u8>> {
        let key = keccak256(commitment);
        let targets = self.targets(role);
        let mut last_error = String::from("no targets configured");

        for target in targets {
            let data = match target.store.get(&key).await {
                Ok(data) => data,
                Err(e) => {
                    self.record(&target.name, Event::ReadErr);
                    warn!(target = %target.name, %role, error = %e, "secondary read failed");
                    last_error = e.to_string();
                    continue;
                }
            };

            if let Err(e) = verifier.verify(commitment, &data).await {
                self.record(&target.name, Event::ReadErr);
                warn!(target = %target.name, %role, error = %e, "secondary copy failed verification");
                last_error = e.to_string();
                continue;
            }

            self.record(&target.name, Event::ReadHit);
            debug!(target = %target.name, %role, "served read from secondary target");
            return Ok(data);
        }

        Err(ManagerError::AllTargetsFailed {
            role,
            attempted: targets.len(),
            cause: last_error,
        })
    }

    /// Counter snapshots, caches first.
    pub fn stats(&self) -> Vec<TargetStats> {
        let caches = self.caches.iter().map(|t| (t, TargetRole::Cache));
        let fallbacks = self.fallbacks.iter().map(|t| (t, TargetRole::Fallback));
        caches
            .chain(fallbacks)
            .filter_map(|(target, role)| {
                let c = self.counters.get(&target.name)?;
                Some(TargetStats {
                    name: target.name.clone(),
                    role,
                    write_successes: c.write_successes.load(Ordering::Relaxed),
                    write_failures: c.write_failures.load(Ordering::Relaxed),
                    read_hits: c.read_hits.load(Ordering::Relaxed),
                    read_failures: c.read_failures.load(Ordering::Relaxed),
                })
            })
            .collect()
    }

    fn record(&self, name: &str, event: Event) {
        let Some(c) = self.counters.get(name) else {
            return;
        };
        let counter = match event {
            Event::WriteOk => &c.write_successes,
            Event::WriteErr => &c.write_failures,
            Event::ReadHit => &c.read_hits,
            Event::ReadErr => &c.read_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daproxy_storage::{BackendType, FaultyStore, MemoryKeyedStore};

    fn faulty(backend: BackendType) -> Arc<FaultyStore> {
        Arc::new(FaultyStore::new(backend))
    }

    fn target(name: &str, store: &Arc<FaultyStore>) -> SecondaryTarget {
        SecondaryTarget::new(name, store.clone() as Arc<dyn PrecomputedKeyStore>)
    }

    #[test]
    fn duplicate_names_rejected() {
        let store = faulty(BackendType::Cache);
        let result = SecondaryRouter::new(vec![target("a", &store)], vec![target("a", &store)]);
        assert!(matches!(result, Err(ManagerError::InvalidConfig(_))));
    }

    #[test]
    fn roles_enabled() {
        let store = faulty(BackendType::Cache);
        let router = SecondaryRouter::new(vec![target("c", &store)], vec![]).unwrap();
        assert!(router.caching_enabled());
        assert!(!router.fallback_enabled());
        assert!(!SecondaryRouter::empty().enabled());
    }

    #[tokio::test]
    async fn partial_write_failure_is_success() {
        let cache = faulty(BackendType::Cache);
        let s3 = faulty(BackendType::ObjectStore);
        s3.set_fail_writes(true);
        let router =
            SecondaryRouter::new(vec![target("redis", &cache)], vec![target("s3", &s3)]).unwrap();

        router.handle_redundant_writes(b"cert", b"blob").await.unwrap();
        assert!(cache.inner().contains(&keccak256(b"cert")));

        let stats = router.stats();
        assert_eq!(stats[0].write_successes, 1);
        assert_eq!(stats[1].write_failures, 1);
    }

    #[tokio::test]
    async fn all_writes_failing_is_error() {
        let a = faulty(BackendType::ObjectStore);
        let b = faulty(BackendType::ObjectStore);
        a.set_fail_writes(true);
        b.set_fail_writes(true);
        let router = SecondaryRouter::new(vec![], vec![target("a", &a), target("b", &b)]).unwrap();

        let result = router.handle_redundant_writes(b"cert", b"blob").await;
        assert!(matches!(
            result,
            Err(ManagerError::AllTargetsFailed { attempted: 2, .. })
        ));
    }

    #[tokio::test]
    async fn read_skips_unverified_copy() {
        let a = faulty(BackendType::ObjectStore);
        let b = faulty(BackendType::ObjectStore);
        let commitment = b"payload";
        let key = keccak256(commitment);
        a.inner().insert_raw(key.to_vec(), b"forged".to_vec());
        b.inner().insert_raw(key.to_vec(), b"payload".to_vec());
        let router = SecondaryRouter::new(vec![], vec![target("a", &a), target("b", &b)]).unwrap();

        let verifier = ExpectDigest(keccak256(b"payload").to_vec());
        let data = router
            .multi_source_read(commitment, TargetRole::Fallback, &verifier)
            .await
            .unwrap();
        assert_eq!(data, b"payload");
        assert_eq!(a.reads(), 1);
        assert_eq!(b.reads(), 1);
    }

    #[tokio::test]
    async fn read_exhaustion_reports_all_targets_failed() {
        let empty = Arc::new(MemoryKeyedStore::object_store());
        let router = SecondaryRouter::new(
            vec![SecondaryTarget::new("c", empty as Arc<dyn PrecomputedKeyStore>)],
            vec![],
        )
        .unwrap();

        let result = router
            .multi_source_read(b"cert", TargetRole::Cache, &KeccakVerifier)
            .await;
        assert!(matches!(
            result,
            Err(ManagerError::AllTargetsFailed { role: TargetRole::Cache, attempted: 1, .. })
        ));
    }

    struct ExpectDigest(Vec<u8>);

    #[async_trait]
    impl PayloadVerifier for ExpectDigest {
        async fn verify(&self, _commitment: &[u8], data: &[u8]) -> StoreResult<()> {
            verify_keccak(&self.0, data)
        }
    }
}
