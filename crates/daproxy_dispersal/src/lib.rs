//! # DA Proxy Dispersal
//!
//! Generated-key stores backed by a versioned DA network.
//!
//! This crate provides:
//! - A field-element blob codec applied before dispersal
//! - Disperser and verifier contracts for the network collaborators
//! - A put retry policy with exponential and rate-limit backoff
//! - [`LegacyDaStore`] (V1) with on-chain confirmation polling
//! - [`DaStoreV2`] with verify-before-retrieve semantics
//! - Scripted disperser and verifier doubles for tests
//!
//! ## Key Invariants
//!
//! - The size limit applies to the encoded blob and is checked before any attempt
//! - Invalid input is never retried
//! - `put_tries == 0` is rejected when a store is built
//! - Only the last attempt's error reaches the caller

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod codec;
mod config;
mod error;
mod mock;
mod retry;
mod store;

pub use client::{CertVerifier, DisperserClient};
pub use codec::{decode, encode, encode_bounded, encoded_len, CodecError, CODEC_VERSION};
pub use config::{ConfirmationConfig, DaStoreConfig, RetryConfig};
pub use error::{ClientError, DispersalError, DispersalResult, StatusCode, VerifyError};
pub use mock::{ScriptedDisperser, ScriptedVerifier};
pub use retry::{RetryDecision, RetryPolicy};
pub use store::{DaStoreV2, LegacyDaStore};
