//! Scripted network doubles for testing.

use crate::client::{CertVerifier, DisperserClient};
use crate::error::{ClientError, StatusCode, VerifyError};
use async_trait::async_trait;
use daproxy_storage::{keccak256, VerifyOpts, DIGEST_LEN};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// An in-memory disperser whose failures can be scripted.
///
/// Scripted errors are consumed one per `disperse` call. Once the script is
/// empty the persistent failure, if set, is returned; otherwise the blob is
/// accepted and a certificate `keccak256(encoded) || nonce` is issued.
#[derive(Debug, Default)]
pub struct ScriptedDisperser {
    script: Mutex<VecDeque<ClientError>>,
    persistent_failure: Mutex<Option<ClientError>>,
    blobs: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    nonce: AtomicU64,
    disperse_calls: AtomicU32,
    retrieve_calls: AtomicU32,
}

impl ScriptedDisperser {
    /// Creates a healthy disperser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an error for the next unscripted `disperse` call.
    pub fn push_failure(&self, err: ClientError) {
        self.script.lock().push_back(err);
    }

    /// Fails every `disperse` call once the script runs out.
    pub fn set_persistent_failure(&self, err: Option<ClientError>) {
        *self.persistent_failure.lock() = err;
    }

    /// Number of `disperse` calls seen.
    pub fn disperse_calls(&self) -> u32 {
        self.disperse_calls.load(Ordering::SeqCst)
    }

    /// Number of `retrieve` calls seen.
    pub fn retrieve_calls(&self) -> u32 {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    /// Replaces the stored blob for `cert`.
    pub fn corrupt(&self, cert: &[u8], encoded: Vec<u8>) {
        self.blobs.write().insert(cert.to_vec(), encoded);
    }
}

#[async_trait]
impl DisperserClient for ScriptedDisperser {
    async fn disperse(&self, encoded: &[u8]) -> Result<Vec<u8>, ClientError> {
        self.disperse_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.script.lock().pop_front() {
            return Err(err);
        }
        if let Some(err) = self.persistent_failure.lock().clone() {
            return Err(err);
        }

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut cert = keccak256(encoded).to_vec();
        cert.extend_from_slice(&nonce.to_be_bytes());
        self.blobs.write().insert(cert.clone(), encoded.to_vec());
        Ok(cert)
    }

    async fn retrieve(&self, cert: &[u8]) -> Result<Vec<u8>, ClientError> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .read()
            .get(cert)
            .cloned()
            .ok_or_else(|| ClientError::status(StatusCode::NotFound, "unknown certificate"))
    }
}

/// A verifier that reports "not yet included" a set number of times.
#[derive(Debug, Default)]
pub struct ScriptedVerifier {
    pending_polls: AtomicU32,
    cert_error: Mutex<Option<VerifyError>>,
    polls: AtomicU32,
}

impl ScriptedVerifier {
    /// Creates a verifier that confirms immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports [`VerifyError::NotYetIncluded`] for the next `polls` calls.
    pub fn set_pending_polls(&self, polls: u32) {
        self.pending_polls.store(polls, Ordering::SeqCst);
    }

    /// Fails every confirmed certificate with `err`.
    pub fn set_cert_error(&self, err: Option<VerifyError>) {
        *self.cert_error.lock() = err;
    }

    /// Number of `verify_cert` calls seen.
    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertVerifier for ScriptedVerifier {
    async fn verify_cert(&self, _cert: &[u8], _opts: VerifyOpts) -> Result<(), VerifyError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let pending = self
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(VerifyError::NotYetIncluded("batch not confirmed".into()));
        }
        match self.cert_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn verify_commitment(&self, cert: &[u8], encoded: &[u8]) -> Result<(), VerifyError> {
        if cert.len() < DIGEST_LEN || cert[..DIGEST_LEN] != keccak256(encoded) {
            return Err(VerifyError::Invalid {
                status: 2,
                message: "blob does not match certificate commitment".into(),
            });
        }
        Ok(())
    }
}
