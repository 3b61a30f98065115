//! Manager assembly from configuration.

use crate::config::ManagerConfig;
use crate::error::{ManagerError, ManagerResult};
use crate::manager::{Manager, PrimaryStores};
use crate::secondary::{SecondaryRouter, SecondaryTarget};
use daproxy_dispersal::{CertVerifier, DaStoreV2, DisperserClient, LegacyDaStore};
use daproxy_storage::{
    DaBackend, EphemeralStore, GeneratedKeyStore, MemoryKeyedStore, Memstore,
    PrecomputedKeyStore,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds a [`Manager`] from a [`ManagerConfig`] and a set of stores.
///
/// # Example
///
/// ```rust
/// use daproxy_manager::{ManagerBuilder, ManagerConfig};
/// use daproxy_storage::{CommitmentMeta, CommitmentMode};
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// rt.block_on(async {
///     let (manager, _ephemeral) = ManagerBuilder::new(ManagerConfig::default())
///         .with_memstores()
///         .build_with_ephemeral()
///         .unwrap();
///
///     let commitment = manager
///         .put(CommitmentMode::Standard, &[], b"hello")
///         .await
///         .unwrap();
///     let meta = commitment.meta(CommitmentMode::Standard);
///     assert_eq!(manager.get(commitment.as_bytes(), meta).await.unwrap(), b"hello");
/// });
/// ```
pub struct ManagerBuilder {
    config: ManagerConfig,
    keccak: Option<Arc<dyn PrecomputedKeyStore>>,
    generated: HashMap<DaBackend, Arc<dyn GeneratedKeyStore>>,
    targets: HashMap<String, Arc<dyn PrecomputedKeyStore>>,
    ephemeral: Option<Arc<EphemeralStore>>,
}

impl ManagerBuilder {
    /// Starts a builder.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            keccak: None,
            generated: HashMap::new(),
            targets: HashMap::new(),
            ephemeral: None,
        }
    }

    /// Sets the keccak object store.
    pub fn with_keccak_store(mut self, store: Arc<dyn PrecomputedKeyStore>) -> Self {
        self.keccak = Some(store);
        self
    }

    /// Sets the store for a versioned backend.
    pub fn with_generated_store(
        mut self,
        backend: DaBackend,
        store: Arc<dyn GeneratedKeyStore>,
    ) -> Self {
        self.generated.insert(backend, store);
        self
    }

    /// Builds the store for `backend` from network clients.
    ///
    /// The store takes its blob size limit and dispersal attempts from
    /// [`ManagerConfig::da_store_config`].
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidConfig`] if the retry settings are invalid.
    pub fn with_da_client<C, V>(self, backend: DaBackend, client: C, verifier: V) -> ManagerResult<Self>
    where
        C: DisperserClient + 'static,
        V: CertVerifier + 'static,
    {
        let config = self.config.da_store_config();
        let store: Arc<dyn GeneratedKeyStore> = match backend {
            DaBackend::V1 => Arc::new(LegacyDaStore::new(config, client, verifier).map_err(invalid)?),
            DaBackend::V2 => Arc::new(DaStoreV2::new(config, client, verifier).map_err(invalid)?),
        };
        Ok(self.with_generated_store(backend, store))
    }

    /// Registers a secondary target by name.
    pub fn with_target(mut self, name: impl Into<String>, store: Arc<dyn PrecomputedKeyStore>) -> Self {
        self.targets.insert(name.into(), store);
        self
    }

    /// Backs every enabled backend without a store by a memstore.
    ///
    /// All memstores share one [`EphemeralStore`] built from the ephemeral
    /// configuration, capped at the manager's `max_blob_size_bytes`. A
    /// missing keccak store is filled with an in-memory object store.
    pub fn with_memstores(mut self) -> Self {
        let mut ephemeral_config = self.config.ephemeral.clone();
        ephemeral_config.max_blob_size_bytes = ephemeral_config
            .max_blob_size_bytes
            .min(self.config.max_blob_size_bytes);
        let ephemeral = Arc::new(EphemeralStore::new(ephemeral_config));
        for backend in self.config.backends_to_enable.clone() {
            self.generated.entry(backend).or_insert_with(|| {
                let store: Arc<dyn GeneratedKeyStore> =
                    Arc::new(Memstore::new(Arc::clone(&ephemeral), backend.cert_version()));
                store
            });
        }
        if self.keccak.is_none() {
            self.keccak = Some(Arc::new(MemoryKeyedStore::object_store()));
        }
        self.ephemeral = Some(ephemeral);
        self
    }

    /// Builds the manager.
    ///
    /// # Errors
    ///
    /// - [`ManagerError::InvalidConfig`] if the configuration is invalid or
    ///   names an unregistered target
    /// - [`ManagerError::UnconfiguredBackend`] if an enabled backend has no store
    pub fn build(self) -> ManagerResult<Manager> {
        self.build_with_ephemeral().map(|(manager, _)| manager)
    }

    /// Builds the manager and returns the shared ephemeral store, if any.
    ///
    /// Inside a tokio runtime the ephemeral store's pruner is started and
    /// stops with the manager.
    ///
    /// # Errors
    ///
    /// See [`ManagerBuilder::build`].
    pub fn build_with_ephemeral(
        mut self,
    ) -> ManagerResult<(Manager, Option<Arc<EphemeralStore>>)> {
        self.config.validate()?;

        let mut stores = PrimaryStores::new();
        if let Some(keccak) = self.keccak.take() {
            stores = stores.with_keccak(keccak);
        }
        for backend in &self.config.backends_to_enable {
            let store = self.generated.remove(backend).ok_or_else(|| {
                ManagerError::UnconfiguredBackend(format!("{backend} is enabled but has no store"))
            })?;
            stores = stores.with_generated(*backend, store);
        }
        for backend in self.generated.keys() {
            debug!(%backend, "ignoring store for backend that is not enabled");
        }

        let caches = self.resolve_targets(&self.config.cache_targets)?;
        let fallbacks = self.resolve_targets(&self.config.fallback_targets)?;
        let router = SecondaryRouter::new(caches, fallbacks)?;

        let manager = Manager::new(
            stores,
            router,
            self.config.dispersal_backend,
            self.config.async_put_workers,
        )?;

        if let Some(ephemeral) = &self.ephemeral {
            if tokio::runtime::Handle::try_current().is_ok() {
                ephemeral.spawn_pruner(manager.cancellation_token());
            }
        }
        Ok((manager, self.ephemeral))
    }

    fn resolve_targets(&self, names: &[String]) -> ManagerResult<Vec<SecondaryTarget>> {
        names
            .iter()
            .map(|name| {
                self.targets
                    .get(name)
                    .map(|store| SecondaryTarget::new(name.clone(), Arc::clone(store)))
                    .ok_or_else(|| {
                        ManagerError::InvalidConfig(format!("unknown secondary target {name}"))
                    })
            })
            .collect()
    }
}

fn invalid(err: daproxy_dispersal::DispersalError) -> ManagerError {
    ManagerError::InvalidConfig(err.to_string())
}

impl std::fmt::Debug for ManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerBuilder")
            .field("config", &self.config)
            .field("generated", &self.generated.keys().collect::<Vec<_>>())
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daproxy_dispersal::{ClientError, ScriptedDisperser, ScriptedVerifier, StatusCode};
    use daproxy_storage::{CommitmentMode, FaultyStore, StoreError};

    #[test]
    fn missing_enabled_store_rejected() {
        let config = ManagerConfig::new().with_backends(vec![DaBackend::V1, DaBackend::V2]);
        let result = ManagerBuilder::new(config).build();
        assert!(matches!(result, Err(ManagerError::UnconfiguredBackend(_))));
    }

    #[test]
    fn unknown_target_rejected() {
        let config = ManagerConfig::new().with_cache_targets(vec!["redis".into()]);
        let result = ManagerBuilder::new(config).with_memstores().build();
        assert!(matches!(result, Err(ManagerError::InvalidConfig(msg)) if msg.contains("redis")));
    }

    #[test]
    fn invalid_config_rejected_before_assembly() {
        let config = ManagerConfig::new().with_put_tries(0);
        let result = ManagerBuilder::new(config).with_memstores().build();
        assert!(matches!(result, Err(ManagerError::InvalidConfig(_))));
    }

    #[test]
    fn memstores_fill_enabled_backends() {
        let config = ManagerConfig::new()
            .with_backends(vec![DaBackend::V1, DaBackend::V2])
            .with_fallback_targets(vec!["s3".into()]);
        let (manager, ephemeral) = ManagerBuilder::new(config)
            .with_target("s3", Arc::new(FaultyStore::new(daproxy_storage::BackendType::ObjectStore)))
            .with_memstores()
            .build_with_ephemeral()
            .unwrap();

        assert!(ephemeral.is_some());
        assert!(manager.set_dispersal_backend(DaBackend::V1).is_ok());
        assert!(manager.secondary().fallback_enabled());
    }

    #[tokio::test]
    async fn memstores_enforce_manager_blob_limit() {
        let mut config = ManagerConfig::new();
        config.max_blob_size_bytes = 16;
        let manager = ManagerBuilder::new(config).with_memstores().build().unwrap();

        let result = manager.put(CommitmentMode::Standard, &[], &[7u8; 1000]).await;
        assert!(matches!(
            result,
            Err(ManagerError::Store(StoreError::OversizedBlob { .. }))
        ));
        assert!(manager.put(CommitmentMode::Standard, &[], b"fits").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn da_client_stores_use_manager_limits() {
        let mut config = ManagerConfig::new().with_put_tries(2);
        config.max_blob_size_bytes = 64;
        let disperser = Arc::new(ScriptedDisperser::new());
        let manager = ManagerBuilder::new(config)
            .with_da_client(DaBackend::V2, Arc::clone(&disperser), ScriptedVerifier::new())
            .unwrap()
            .with_keccak_store(Arc::new(daproxy_storage::MemoryKeyedStore::object_store()))
            .build()
            .unwrap();

        let oversized = manager.put(CommitmentMode::Standard, &[], &[1u8; 1000]).await;
        assert!(matches!(
            oversized,
            Err(ManagerError::Store(StoreError::OversizedBlob { .. }))
        ));
        assert_eq!(disperser.disperse_calls(), 0);

        disperser.set_persistent_failure(Some(ClientError::status(
            StatusCode::Internal,
            "disperser down",
        )));
        assert!(manager.put(CommitmentMode::Standard, &[], b"ok").await.is_err());
        assert_eq!(disperser.disperse_calls(), 2);
    }

    #[test]
    fn da_client_rejects_zero_tries() {
        let config = ManagerConfig::new().with_put_tries(0);
        let result = ManagerBuilder::new(config).with_da_client(
            DaBackend::V2,
            ScriptedDisperser::new(),
            ScriptedVerifier::new(),
        );
        assert!(matches!(result, Err(ManagerError::InvalidConfig(_))));
    }
}
