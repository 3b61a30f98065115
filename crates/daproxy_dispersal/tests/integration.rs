//! Integration tests for dispersal retry and confirmation.

use daproxy_dispersal::{
    encoded_len, ClientError, ConfirmationConfig, DaStoreConfig, DaStoreV2, DispersalError,
    LegacyDaStore, RetryConfig, ScriptedDisperser, ScriptedVerifier, StatusCode, VerifyError,
};
use daproxy_storage::{GeneratedKeyStore, StoreError, VerifyOpts};
use std::time::Duration;

fn retry(put_tries: i32) -> RetryConfig {
    RetryConfig::new(put_tries)
        .with_jitter(false)
        .with_resource_exhausted_backoff(Duration::from_secs(5))
}

fn config(put_tries: i32) -> DaStoreConfig {
    DaStoreConfig::new()
        .with_retry(retry(put_tries))
        .with_confirmation(ConfirmationConfig::new(
            Duration::from_secs(12),
            Duration::from_secs(60),
        ))
}

fn legacy(put_tries: i32) -> LegacyDaStore<ScriptedDisperser, ScriptedVerifier> {
    LegacyDaStore::new(
        config(put_tries),
        ScriptedDisperser::new(),
        ScriptedVerifier::new(),
    )
    .unwrap()
}

fn v2(put_tries: i32) -> DaStoreV2<ScriptedDisperser, ScriptedVerifier> {
    DaStoreV2::new(
        config(put_tries),
        ScriptedDisperser::new(),
        ScriptedVerifier::new(),
    )
    .unwrap()
}

// ============================================================================
// Retry bound
// ============================================================================

#[tokio::test(start_paused = true)]
async fn bounded_tries_stop_after_n_attempts() {
    let store = v2(4);
    store
        .client()
        .set_persistent_failure(Some(ClientError::Transport("connection refused".into())));

    let result = store.put(b"payload").await;
    assert!(matches!(result, Err(StoreError::Backend(_))));
    assert_eq!(store.client().disperse_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn negative_tries_retry_until_cancelled() {
    let store = v2(-1);
    store
        .client()
        .set_persistent_failure(Some(ClientError::status(StatusCode::Internal, "boom")));

    let result = tokio::time::timeout(Duration::from_secs(60), store.put(b"payload")).await;
    assert!(result.is_err(), "unlimited retries should outlive the timeout");
    assert!(store.client().disperse_calls() > 5);
}

#[test]
fn zero_tries_rejected_at_construction() {
    let result = LegacyDaStore::new(
        config(0),
        ScriptedDisperser::new(),
        ScriptedVerifier::new(),
    );
    assert!(matches!(result, Err(DispersalError::InvalidConfig(_))));

    let result = DaStoreV2::new(config(0), ScriptedDisperser::new(), ScriptedVerifier::new());
    assert!(matches!(result, Err(DispersalError::InvalidConfig(_))));
}

// ============================================================================
// Retry decisions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn invalid_argument_is_not_retried() {
    let store = v2(5);
    store
        .client()
        .push_failure(ClientError::status(StatusCode::InvalidArgument, "blob too sparse"));

    let result = store.put(b"payload").await;
    assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    assert_eq!(store.client().disperse_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn resource_exhausted_waits_fixed_backoff() {
    let store = v2(3);
    store
        .client()
        .push_failure(ClientError::status(StatusCode::ResourceExhausted, "rate limited"));
    store
        .client()
        .push_failure(ClientError::status(StatusCode::ResourceExhausted, "rate limited"));

    let start = tokio::time::Instant::now();
    let cert = store.put(b"payload").await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert_eq!(store.client().disperse_calls(), 3);
    assert_eq!(store.get(&cert).await.unwrap(), b"payload");
}

#[tokio::test]
async fn oversized_blob_fails_before_dispersal() {
    let max = encoded_len(62);
    let store = DaStoreV2::new(
        config(5).with_max_blob_size(max),
        ScriptedDisperser::new(),
        ScriptedVerifier::new(),
    )
    .unwrap();

    assert!(store.put(&[7u8; 62]).await.is_ok());
    let result = store.put(&[7u8; 63]).await;
    assert!(matches!(result, Err(StoreError::OversizedBlob { .. })));
    assert_eq!(store.client().disperse_calls(), 1);
}

// ============================================================================
// Confirmation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn legacy_put_polls_until_confirmed() {
    let store = legacy(1);
    store.verifier().set_pending_polls(3);

    let cert = store.put(b"batch").await.unwrap();
    assert_eq!(store.verifier().polls(), 4);

    let value = store.get(&cert).await.unwrap();
    assert_eq!(value, b"batch");
    store
        .verify(&cert, &value, VerifyOpts::with_inclusion_block(100))
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn legacy_verification_error_fails_attempt() {
    let store = legacy(2);
    store.verifier().set_cert_error(Some(VerifyError::Invalid {
        status: 4,
        message: "quorum not met".into(),
    }));

    let result = store.put(b"batch").await;
    assert!(matches!(
        result,
        Err(StoreError::VerificationFailed { status: 4, .. })
    ));
    assert_eq!(store.client().disperse_calls(), 2);
    assert_eq!(store.verifier().polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn legacy_confirmation_times_out() {
    let store = legacy(1);
    store.verifier().set_pending_polls(u32::MAX);

    let result = store.put(b"batch").await;
    assert!(matches!(result, Err(StoreError::Timeout(_))));
    // one poll every 12s inside a 60s budget
    assert!(store.verifier().polls() >= 5);
}

#[tokio::test(start_paused = true)]
async fn legacy_put_cancelled_by_drop() {
    let store = legacy(1);
    store.verifier().set_pending_polls(u32::MAX);

    let result = tokio::time::timeout(Duration::from_secs(30), store.put(b"batch")).await;
    assert!(result.is_err());
    let polls = store.verifier().polls();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(store.verifier().polls(), polls);
}

#[tokio::test]
async fn v2_put_does_not_poll() {
    let store = v2(1);
    store.verifier().set_pending_polls(5);

    let cert = store.put(b"batch").await.unwrap();
    assert_eq!(store.verifier().polls(), 0);

    // retrieval is gated on certificate verification by callers
    assert!(matches!(
        store.verify_cert(&cert, VerifyOpts::default()).await,
        Err(StoreError::VerificationFailed { .. })
    ));
}

#[tokio::test]
async fn recency_failure_maps_to_store_error() {
    let store = v2(1);
    let cert = store.put(b"batch").await.unwrap();
    store
        .verifier()
        .set_cert_error(Some(VerifyError::Recency("reference block too old".into())));

    assert!(matches!(
        store.verify_cert(&cert, VerifyOpts::with_inclusion_block(10_000)).await,
        Err(StoreError::RecencyCheckFailed(_))
    ));
}
