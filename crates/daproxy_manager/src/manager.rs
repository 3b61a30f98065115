//! Storage manager.

use crate::error::{ManagerError, ManagerResult, TargetRole};
use crate::secondary::{PayloadVerifier, PutNotification, SecondaryRouter};
use async_trait::async_trait;
use daproxy_storage::{
    Commitment, CommitmentMeta, CommitmentMode, DaBackend, GeneratedKeyStore,
    PrecomputedKeyStore, StoreResult, VerifyOpts,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Primary backends handed to a [`Manager`].
#[derive(Clone, Default)]
pub struct PrimaryStores {
    /// Object store serving keccak commitments.
    pub keccak: Option<Arc<dyn PrecomputedKeyStore>>,
    /// Legacy network store.
    pub v1: Option<Arc<dyn GeneratedKeyStore>>,
    /// V2 network store.
    pub v2: Option<Arc<dyn GeneratedKeyStore>>,
}

impl PrimaryStores {
    /// No stores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the keccak object store.
    pub fn with_keccak(mut self, store: Arc<dyn PrecomputedKeyStore>) -> Self {
        self.keccak = Some(store);
        self
    }

    /// Sets the store for `backend`.
    pub fn with_generated(mut self, backend: DaBackend, store: Arc<dyn GeneratedKeyStore>) -> Self {
        match backend {
            DaBackend::V1 => self.v1 = Some(store),
            DaBackend::V2 => self.v2 = Some(store),
        }
        self
    }

    fn generated(&self, backend: DaBackend) -> Option<&Arc<dyn GeneratedKeyStore>> {
        match backend {
            DaBackend::V1 => self.v1.as_ref(),
            DaBackend::V2 => self.v2.as_ref(),
        }
    }
}

impl std::fmt::Debug for PrimaryStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrimaryStores")
            .field("keccak", &self.keccak.as_ref().map(|s| s.backend_type()))
            .field("v1", &self.v1.as_ref().map(|s| s.backend_type()))
            .field("v2", &self.v2.as_ref().map(|s| s.backend_type()))
            .finish()
    }
}

/// Verifies secondary copies with the primary store's own checks.
struct CertCheck<'a> {
    store: &'a dyn GeneratedKeyStore,
    opts: VerifyOpts,
}

#[async_trait]
impl PayloadVerifier for CertCheck<'_> {
    async fn verify(&self, commitment: &[u8], data: &[u8]) -> StoreResult<()> {
        self.store.verify(commitment, data, self.opts).await
    }
}

/// Routes blob reads and writes to primary and secondary backends.
///
/// # Routing
///
/// - keccak commitments go to the object store, with no replication
/// - generated commitments are written to the active dispersal backend and
///   read from the backend matching the certificate's own version
/// - reads consult cache targets, then the primary, then fallback targets
///
/// # Thread Safety
///
/// The active dispersal backend is an atomic and may be switched while
/// requests are in flight. Every other field is fixed at construction.
pub struct Manager {
    stores: PrimaryStores,
    dispersal_backend: AtomicU8,
    secondary: Arc<SecondaryRouter>,
    queue: Option<async_channel::Sender<PutNotification>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Manager {
    /// Creates a manager.
    ///
    /// With `async_put_workers > 0` replication runs on that many background
    /// tasks, which requires a tokio runtime; otherwise it runs inline.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::UnconfiguredBackend`] if no store backs `dispersal_backend`
    /// - [`ManagerError::InvalidConfig`] if workers are requested outside a runtime
    pub fn new(
        stores: PrimaryStores,
        secondary: SecondaryRouter,
        dispersal_backend: DaBackend,
        async_put_workers: usize,
    ) -> ManagerResult<Self> {
        if stores.generated(dispersal_backend).is_none() {
            return Err(ManagerError::UnconfiguredBackend(format!(
                "dispersal backend {dispersal_backend} has no store"
            )));
        }

        let secondary = Arc::new(secondary);
        let mut queue = None;
        let mut workers = Vec::new();

        if async_put_workers > 0 && secondary.enabled() {
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(ManagerError::InvalidConfig(
                    "async put workers require a tokio runtime".into(),
                ));
            }
            let (tx, rx) = async_channel::unbounded::<PutNotification>();
            for worker in 0..async_put_workers {
                workers.push(spawn_worker(worker, rx.clone(), Arc::clone(&secondary)));
            }
            queue = Some(tx);
        }

        info!(
            %dispersal_backend,
            v1 = stores.v1.is_some(),
            v2 = stores.v2.is_some(),
            keccak = stores.keccak.is_some(),
            caches = secondary.targets(TargetRole::Cache).len(),
            fallbacks = secondary.targets(TargetRole::Fallback).len(),
            workers = workers.len(),
            "storage manager started"
        );

        Ok(Self {
            stores,
            dispersal_backend: AtomicU8::new(dispersal_backend.to_u8()),
            secondary,
            queue,
            workers: Mutex::new(workers),
            cancel: CancellationToken::new(),
        })
    }

    /// Backend receiving new generated-key writes.
    pub fn dispersal_backend(&self) -> DaBackend {
        let raw = self.dispersal_backend.load(Ordering::Acquire);
        DaBackend::from_u8(raw).unwrap_or(DaBackend::V2)
    }

    /// Switches the backend receiving new generated-key writes.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::UnconfiguredBackend`] if no store backs `backend`.
    pub fn set_dispersal_backend(&self, backend: DaBackend) -> ManagerResult<()> {
        if self.stores.generated(backend).is_none() {
            return Err(ManagerError::UnconfiguredBackend(format!(
                "cannot disperse to {backend}: no store"
            )));
        }
        let previous = self.dispersal_backend.swap(backend.to_u8(), Ordering::AcqRel);
        info!(from = ?DaBackend::from_u8(previous), to = %backend, "dispersal backend switched");
        Ok(())
    }

    /// The secondary router.
    pub fn secondary(&self) -> &SecondaryRouter {
        &self.secondary
    }

    /// Token cancelled when the manager shuts down or is dropped.
    ///
    /// Background tasks tied to the manager's lifetime, such as ephemeral
    /// store pruners, should watch a child of this token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Stores `value` and returns its commitment.
    ///
    /// For keccak mode `key` must be the keccak digest of `value`; other
    /// modes ignore `key` and return the certificate issued by the active
    /// dispersal backend.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::UnconfiguredBackend`] if the mode's backend is missing
    /// - [`ManagerError::Store`] for backend failures, including
    ///   `KeyValueMismatch` and `OversizedBlob`
    pub async fn put(
        &self,
        mode: CommitmentMode,
        key: &[u8],
        value: &[u8],
    ) -> ManagerResult<Commitment> {
        match mode {
            CommitmentMode::OptimismKeccak => {
                let store = self.keccak_store()?;
                store.verify(key, value).await?;
                store.put(key, value).await?;
                debug!(size = value.len(), "stored keccak commitment");
                Ok(Commitment::Keccak(key.to_vec()))
            }
            CommitmentMode::OptimismGeneric | CommitmentMode::Standard => {
                let backend = self.dispersal_backend();
                let store = self.generated_store(backend)?;
                let cert = store.put(value).await?;
                debug!(%mode, %backend, size = value.len(), "dispersed blob");

                if self.secondary.enabled() {
                    self.replicate(&cert, value).await;
                }

                Ok(Commitment::Certificate {
                    version: backend.cert_version(),
                    cert,
                })
            }
        }
    }

    /// Fetches the blob for `key`.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::UnconfiguredBackend`] if the commitment's version has no store
    /// - [`ManagerError::AllTargetsFailed`] if the primary and every fallback failed
    /// - [`ManagerError::Store`] for primary failures when no fallback is configured
    pub async fn get(&self, key: &[u8], meta: CommitmentMeta) -> ManagerResult<Vec<u8>> {
        self.get_with_opts(key, meta, VerifyOpts::default()).await
    }

    /// Fetches the blob for `key` with certificate verification options.
    ///
    /// # Errors
    ///
    /// See [`Manager::get`].
    pub async fn get_with_opts(
        &self,
        key: &[u8],
        meta: CommitmentMeta,
        opts: VerifyOpts,
    ) -> ManagerResult<Vec<u8>> {
        if meta.mode == CommitmentMode::OptimismKeccak {
            let store = self.keccak_store()?;
            let value = store.get(key).await?;
            store.verify(key, &value).await?;
            return Ok(value);
        }

        let backend = meta.version.backend();
        let store = self.generated_store(backend)?;
        let check = CertCheck {
            store: store.as_ref(),
            opts,
        };

        if self.secondary.caching_enabled() {
            match self
                .secondary
                .multi_source_read(key, TargetRole::Cache, &check)
                .await
            {
                Ok(value) => return Ok(value),
                Err(e) => warn!(error = %e, "cache read failed, reading from primary"),
            }
        }

        let primary = read_primary(store.as_ref(), backend, key, opts).await;
        let primary_err = match primary {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !self.secondary.fallback_enabled() {
            return Err(primary_err.into());
        }

        warn!(%backend, error = %primary_err, "primary read failed, trying fallback targets");
        self.secondary
            .multi_source_read(key, TargetRole::Fallback, &check)
            .await
            .map_err(|e| match e {
                ManagerError::AllTargetsFailed {
                    role,
                    attempted,
                    cause,
                } => ManagerError::AllTargetsFailed {
                    role,
                    attempted,
                    cause: format!("primary failed: {primary_err}; last fallback error: {cause}"),
                },
                other => other,
            })
    }

    /// Closes the replication queue and waits for workers to drain it.
    ///
    /// Also cancels [`Manager::cancellation_token`]. Later puts replicate
    /// nothing; their primary writes still succeed.
    pub async fn shutdown(&self) {
        if let Some(queue) = &self.queue {
            queue.close();
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "replication worker panicked");
            }
        }
        self.cancel.cancel();
        info!("storage manager stopped");
    }

    async fn replicate(&self, commitment: &[u8], value: &[u8]) {
        match &self.queue {
            Some(queue) => {
                let notification = PutNotification {
                    commitment: commitment.to_vec(),
                    value: value.to_vec(),
                };
                if let Err(e) = queue.try_send(notification) {
                    warn!(error = %e, "replication queue closed, secondary copy skipped");
                }
            }
            None => {
                if let Err(e) = self.secondary.handle_redundant_writes(commitment, value).await {
                    warn!(error = %e, "redundant writes failed");
                }
            }
        }
    }

    fn keccak_store(&self) -> ManagerResult<&Arc<dyn PrecomputedKeyStore>> {
        self.stores
            .keccak
            .as_ref()
            .ok_or_else(|| ManagerError::UnconfiguredBackend("keccak object store".into()))
    }

    fn generated_store(&self, backend: DaBackend) -> ManagerResult<&Arc<dyn GeneratedKeyStore>> {
        self.stores
            .generated(backend)
            .ok_or_else(|| ManagerError::UnconfiguredBackend(format!("{backend} store")))
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("stores", &self.stores)
            .field("dispersal_backend", &self.dispersal_backend())
            .field("secondary", &self.secondary)
            .field("async", &self.queue.is_some())
            .finish()
    }
}

/// Reads from a versioned primary.
///
/// V1 retrieval is safe on any key, so the payload is fetched and then
/// checked. V2 retrieval assumes a valid certificate, so the certificate is
/// checked first.
async fn read_primary(
    store: &dyn GeneratedKeyStore,
    backend: DaBackend,
    key: &[u8],
    opts: VerifyOpts,
) -> StoreResult<Vec<u8>> {
    match backend {
        DaBackend::V1 => {
            let value = store.get(key).await?;
            store.verify(key, &value, opts).await?;
            Ok(value)
        }
        DaBackend::V2 => {
            store.verify_cert(key, opts).await?;
            store.get(key).await
        }
    }
}

fn spawn_worker(
    id: usize,
    queue: async_channel::Receiver<PutNotification>,
    router: Arc<SecondaryRouter>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(worker = id, "replication worker started");
        while let Ok(notification) = queue.recv().await {
            if let Err(e) = router
                .handle_redundant_writes(&notification.commitment, &notification.value)
                .await
            {
                warn!(worker = id, error = %e, "redundant writes failed");
            }
        }
        debug!(worker = id, "replication worker stopped");
    })
}
