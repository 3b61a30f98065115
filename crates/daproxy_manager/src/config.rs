//! Manager configuration.

use crate::error::{ManagerError, ManagerResult};
use daproxy_dispersal::{DaStoreConfig, RetryConfig};
use daproxy_storage::{DaBackend, EphemeralConfig, DEFAULT_MAX_BLOB_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for the storage manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Versioned backends to construct.
    pub backends_to_enable: Vec<DaBackend>,
    /// Backend receiving new generated-key writes at startup.
    pub dispersal_backend: DaBackend,
    /// Secondary targets read before the primary.
    pub cache_targets: Vec<String>,
    /// Secondary targets read after a primary failure.
    pub fallback_targets: Vec<String>,
    /// Background replication workers; zero replicates inline.
    pub async_put_workers: usize,
    /// Dispersal attempts; negative retries forever.
    pub put_tries: i32,
    /// Largest accepted encoded blob.
    pub max_blob_size_bytes: usize,
    /// Behaviour of the ephemeral store behind memstores.
    pub ephemeral: EphemeralConfig,
}

impl ManagerConfig {
    /// Creates a configuration with a single V2 backend.
    pub fn new() -> Self {
        Self {
            backends_to_enable: vec![DaBackend::V2],
            dispersal_backend: DaBackend::V2,
            cache_targets: Vec::new(),
            fallback_targets: Vec::new(),
            async_put_workers: 0,
            put_tries: 3,
            max_blob_size_bytes: DEFAULT_MAX_BLOB_SIZE,
            ephemeral: EphemeralConfig::default(),
        }
    }

    /// Sets the enabled backends.
    pub fn with_backends(mut self, backends: Vec<DaBackend>) -> Self {
        self.backends_to_enable = backends;
        self
    }

    /// Sets the initial dispersal backend.
    pub fn with_dispersal_backend(mut self, backend: DaBackend) -> Self {
        self.dispersal_backend = backend;
        self
    }

    /// Sets the cache targets.
    pub fn with_cache_targets(mut self, targets: Vec<String>) -> Self {
        self.cache_targets = targets;
        self
    }

    /// Sets the fallback targets.
    pub fn with_fallback_targets(mut self, targets: Vec<String>) -> Self {
        self.fallback_targets = targets;
        self
    }

    /// Sets the number of replication workers.
    pub fn with_async_put_workers(mut self, workers: usize) -> Self {
        self.async_put_workers = workers;
        self
    }

    /// Sets the dispersal attempts.
    pub fn with_put_tries(mut self, put_tries: i32) -> Self {
        self.put_tries = put_tries;
        self
    }

    /// Sets the ephemeral store behaviour.
    pub fn with_ephemeral(mut self, ephemeral: EphemeralConfig) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidConfig`] if no backend is enabled, the
    /// dispersal backend is not enabled, `put_tries` is zero, or a target
    /// name is repeated within or across the cache and fallback lists.
    pub fn validate(&self) -> ManagerResult<()> {
        if self.backends_to_enable.is_empty() {
            return Err(ManagerError::InvalidConfig(
                "at least one backend must be enabled".into(),
            ));
        }
        if !self.backends_to_enable.contains(&self.dispersal_backend) {
            return Err(ManagerError::InvalidConfig(format!(
                "dispersal backend {} is not among enabled backends {:?}",
                self.dispersal_backend, self.backends_to_enable
            )));
        }
        if self.put_tries == 0 {
            return Err(ManagerError::InvalidConfig(
                "put_tries must be non-zero".into(),
            ));
        }

        check_unique("cache_targets", &self.cache_targets)?;
        check_unique("fallback_targets", &self.fallback_targets)?;
        let caches: HashSet<&str> = self.cache_targets.iter().map(String::as_str).collect();
        if let Some(shared) = self
            .fallback_targets
            .iter()
            .find(|name| caches.contains(name.as_str()))
        {
            return Err(ManagerError::InvalidConfig(format!(
                "target {shared} is both a cache and a fallback target"
            )));
        }
        Ok(())
    }

    /// Store configuration for versioned DA backends.
    pub fn da_store_config(&self) -> DaStoreConfig {
        DaStoreConfig::new()
            .with_max_blob_size(self.max_blob_size_bytes)
            .with_retry(RetryConfig::new(self.put_tries))
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn check_unique(list: &str, names: &[String]) -> ManagerResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ManagerError::InvalidConfig(format!(
                "duplicate target {name} in {list}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(ManagerConfig::default().validate().is_ok());
    }

    #[test]
    fn dispersal_backend_must_be_enabled() {
        let config = ManagerConfig::new()
            .with_backends(vec![DaBackend::V1])
            .with_dispersal_backend(DaBackend::V2);
        assert!(config.validate().is_err());

        let config = ManagerConfig::new().with_backends(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_put_tries_rejected() {
        assert!(ManagerConfig::new().with_put_tries(0).validate().is_err());
        assert!(ManagerConfig::new().with_put_tries(-1).validate().is_ok());
    }

    #[test]
    fn overlapping_targets_rejected() {
        let config = ManagerConfig::new()
            .with_cache_targets(names(&["redis"]))
            .with_fallback_targets(names(&["s3", "redis"]));
        assert!(matches!(
            config.validate(),
            Err(ManagerError::InvalidConfig(msg)) if msg.contains("redis")
        ));
    }

    #[test]
    fn duplicate_targets_rejected() {
        let config = ManagerConfig::new().with_fallback_targets(names(&["s3", "s3"]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_from_json() {
        let json = r#"{
            "backends_to_enable": ["v1", "v2"],
            "dispersal_backend": "v1",
            "fallback_targets": ["s3"],
            "async_put_workers": 4,
            "ephemeral": { "blob_expiration": 60000 }
        }"#;
        let config: ManagerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.dispersal_backend, DaBackend::V1);
        assert_eq!(config.async_put_workers, 4);
        assert_eq!(config.put_tries, 3);
        assert_eq!(
            config.ephemeral.blob_expiration,
            std::time::Duration::from_secs(60)
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.da_store_config().retry.put_tries, 3);
    }

    proptest! {
        #[test]
        fn shared_name_always_rejected(
            caches in prop::collection::hash_set("[a-z]{1,6}", 0..5),
            fallbacks in prop::collection::hash_set("[a-z]{1,6}", 0..5),
            shared in "[a-z]{1,6}",
        ) {
            let mut cache_targets: Vec<String> = caches.into_iter().collect();
            let mut fallback_targets: Vec<String> =
                fallbacks.into_iter().filter(|n| !cache_targets.contains(n)).collect();
            cache_targets.retain(|n| n != &shared);
            fallback_targets.retain(|n| n != &shared);

            let disjoint = ManagerConfig::new()
                .with_cache_targets(cache_targets.clone())
                .with_fallback_targets(fallback_targets.clone());
            prop_assert!(disjoint.validate().is_ok());

            cache_targets.push(shared.clone());
            fallback_targets.push(shared);
            let overlapping = ManagerConfig::new()
                .with_cache_targets(cache_targets)
                .with_fallback_targets(fallback_targets);
            prop_assert!(overlapping.validate().is_err());
        }
    }
}
