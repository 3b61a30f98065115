//! Versioned DA network stores.

use crate::client::{CertVerifier, DisperserClient};
use crate::codec::{decode, encode, encode_bounded};
use crate::config::DaStoreConfig;
use crate::error::{DispersalError, DispersalResult, VerifyError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use daproxy_storage::{BackendType, GeneratedKeyStore, StoreError, StoreResult, VerifyOpts};
use tracing::{debug, info};

/// Parts shared by both store versions.
#[derive(Debug)]
struct DaClient<C, V> {
    client: C,
    verifier: V,
    policy: RetryPolicy,
    config: DaStoreConfig,
}

impl<C: DisperserClient, V: CertVerifier> DaClient<C, V> {
    fn new(config: DaStoreConfig, client: C, verifier: V) -> DispersalResult<Self> {
        let policy = RetryPolicy::new(config.retry.clone())?;
        Ok(Self {
            client,
            verifier,
            policy,
            config,
        })
    }

    async fn retrieve(&self, cert: &[u8]) -> StoreResult<Vec<u8>> {
        let encoded = self.client.retrieve(cert).await?;
        self.verifier.verify_commitment(cert, &encoded)?;
        decode(&encoded).map_err(|e| StoreError::from(DispersalError::from(e)))
    }

    async fn verify(&self, cert: &[u8], value: &[u8], opts: VerifyOpts) -> StoreResult<()> {
        self.verifier.verify_commitment(cert, &encode(value))?;
        self.verifier.verify_cert(cert, opts).await?;
        Ok(())
    }
}

/// Store for the legacy (V1) network.
///
/// A dispersal returns before its certificate is on chain, so each put
/// polls the verifier until the certificate confirms. Confirmation is part
/// of the attempt: a failed or timed out confirmation is retried like a
/// failed dispersal.
#[derive(Debug)]
pub struct LegacyDaStore<C, V> {
    inner: DaClient<C, V>,
}

impl<C: DisperserClient, V: CertVerifier> LegacyDaStore<C, V> {
    /// Creates a store.
    ///
    /// # Errors
    ///
    /// Returns [`DispersalError::InvalidConfig`] for a zero `put_tries`.
    pub fn new(config: DaStoreConfig, client: C, verifier: V) -> DispersalResult<Self> {
        Ok(Self {
            inner: DaClient::new(config, client, verifier)?,
        })
    }

    /// The disperser client.
    pub fn client(&self) -> &C {
        &self.inner.client
    }

    /// The certificate verifier.
    pub fn verifier(&self) -> &V {
        &self.inner.verifier
    }

    async fn disperse_and_confirm(&self, encoded: &[u8], attempt: u32) -> DispersalResult<Vec<u8>> {
        debug!(attempt, size = encoded.len(), "dispersing blob to v1 network");
        let cert = self.inner.client.disperse(encoded).await?;

        let timeout = self.inner.config.confirmation.status_query_timeout;
        tokio::time::timeout(timeout, self.poll_confirmation(&cert))
            .await
            .map_err(|_| DispersalError::ConfirmationTimeout(timeout))??;
        Ok(cert)
    }

    async fn poll_confirmation(&self, cert: &[u8]) -> DispersalResult<()> {
        let interval = self.inner.config.confirmation.poll_interval;
        loop {
            match self.inner.verifier.verify_cert(cert, VerifyOpts::default()).await {
                Ok(()) => return Ok(()),
                Err(VerifyError::NotYetIncluded(reason)) => {
                    debug!(%reason, "certificate not yet confirmed");
                }
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(interval).await;
        }
    }
}

#[async_trait]
impl<C: DisperserClient, V: CertVerifier> GeneratedKeyStore for LegacyDaStore<C, V> {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.inner.retrieve(key).await
    }

    async fn put(&self, value: &[u8]) -> StoreResult<Vec<u8>> {
        let encoded = encode_bounded(value, self.inner.config.max_blob_size_bytes)?;
        let encoded = encoded.as_slice();
        let cert = self
            .inner
            .policy
            .run(move |attempt| self.disperse_and_confirm(encoded, attempt))
            .await?;
        info!(cert_len = cert.len(), "blob dispersed and confirmed on v1 network");
        Ok(cert)
    }

    async fn verify(&self, key: &[u8], value: &[u8], opts: VerifyOpts) -> StoreResult<()> {
        self.inner.verify(key, value, opts).await
    }

    fn backend_type(&self) -> BackendType {
        BackendType::DaV1
    }
}

/// Store for the V2 network.
///
/// Dispersal blocks until the blob is certified, so puts do not poll.
/// Retrieval assumes a valid certificate; callers run
/// [`GeneratedKeyStore::verify_cert`] before [`GeneratedKeyStore::get`].
#[derive(Debug)]
pub struct DaStoreV2<C, V> {
    inner: DaClient<C, V>,
}

impl<C: DisperserClient, V: CertVerifier> DaStoreV2<C, V> {
    /// Creates a store.
    ///
    /// # Errors
    ///
    /// Returns [`DispersalError::InvalidConfig`] for a zero `put_tries`.
    pub fn new(config: DaStoreConfig, client: C, verifier: V) -> DispersalResult<Self> {
        Ok(Self {
            inner: DaClient::new(config, client, verifier)?,
        })
    }

    /// The disperser client.
    pub fn client(&self) -> &C {
        &self.inner.client
    }

    /// The certificate verifier.
    pub fn verifier(&self) -> &V {
        &self.inner.verifier
    }
}

#[async_trait]
impl<C: DisperserClient, V: CertVerifier> GeneratedKeyStore for DaStoreV2<C, V> {
    async fn get(&self, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.inner.retrieve(key).await
    }

    async fn put(&self, value: &[u8]) -> StoreResult<Vec<u8>> {
        let encoded = encode_bounded(value, self.inner.config.max_blob_size_bytes)?;
        let encoded = encoded.as_slice();
        let client = &self.inner.client;
        let cert = self
            .inner
            .policy
            .run(move |attempt| async move {
                debug!(attempt, size = encoded.len(), "dispersing blob to v2 network");
                Ok(client.disperse(encoded).await?)
            })
            .await?;
        info!(cert_len = cert.len(), "blob certified on v2 network");
        Ok(cert)
    }

    async fn verify(&self, key: &[u8], value: &[u8], opts: VerifyOpts) -> StoreResult<()> {
        self.inner.verify(key, value, opts).await
    }

    async fn verify_cert(&self, key: &[u8], opts: VerifyOpts) -> StoreResult<()> {
        self.inner.verifier.verify_cert(key, opts).await?;
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::DaV2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::mock::{ScriptedDisperser, ScriptedVerifier};

    fn config() -> DaStoreConfig {
        DaStoreConfig::new().with_retry(RetryConfig::no_retry())
    }

    #[tokio::test]
    async fn v2_put_get_verify() {
        let store =
            DaStoreV2::new(config(), ScriptedDisperser::new(), ScriptedVerifier::new()).unwrap();
        let cert = store.put(b"rollup batch").await.unwrap();

        store.verify_cert(&cert, VerifyOpts::default()).await.unwrap();
        let value = store.get(&cert).await.unwrap();
        assert_eq!(value, b"rollup batch");
        store.verify(&cert, &value, VerifyOpts::default()).await.unwrap();
        assert_eq!(store.verifier().polls(), 2);
    }

    #[tokio::test]
    async fn retrieval_rejects_tampered_blob() {
        let store =
            DaStoreV2::new(config(), ScriptedDisperser::new(), ScriptedVerifier::new()).unwrap();
        let cert = store.put(b"original").await.unwrap();
        store.client().corrupt(&cert, encode(b"forged"));

        assert!(matches!(
            store.get(&cert).await,
            Err(StoreError::VerificationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_cert_is_not_found() {
        let store =
            LegacyDaStore::new(config(), ScriptedDisperser::new(), ScriptedVerifier::new())
                .unwrap();
        assert!(matches!(
            store.get(&[0u8; 40]).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn backend_types() {
        let v1 = LegacyDaStore::new(config(), ScriptedDisperser::new(), ScriptedVerifier::new())
            .unwrap();
        let v2 =
            DaStoreV2::new(config(), ScriptedDisperser::new(), ScriptedVerifier::new()).unwrap();
        assert_eq!(v1.backend_type(), BackendType::DaV1);
        assert_eq!(v2.backend_type(), BackendType::DaV2);
    }
}
