//! # DA Proxy Storage
//!
//! Blob store contracts and local implementations for the DA proxy.
//!
//! Stores are **opaque byte stores** addressed in one of two ways:
//!
//! - [`GeneratedKeyStore`] - the backend computes the key (a certificate) on write
//! - [`PrecomputedKeyStore`] - the caller supplies a content-derived key
//!
//! ## Available Stores
//!
//! - [`EphemeralStore`] - Expiring, fault-injectable map emulating a DA network
//! - [`Memstore`] - [`GeneratedKeyStore`] on top of an [`EphemeralStore`]
//! - [`MemoryKeyedStore`] - In-memory object-store / cache stand-in
//! - [`FileObjectStore`] - Durable object store, one file per key
//! - [`FaultyStore`] - Test double with injectable read/write failures
//!
//! ## Example
//!
//! ```rust
//! use daproxy_storage::{keccak256, MemoryKeyedStore, PrecomputedKeyStore};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let store = MemoryKeyedStore::object_store();
//!     let key = keccak256(b"hello world");
//!     store.put(&key, b"hello world").await.unwrap();
//!     assert_eq!(store.get(&key).await.unwrap(), b"hello world");
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod commitment;
mod ephemeral;
mod error;
mod faulty;
mod file;
mod memory;
mod memstore;
pub mod serde_millis;

pub use backend::{verify_keccak, BackendType, GeneratedKeyStore, PrecomputedKeyStore, VerifyOpts};
pub use commitment::{
    keccak256, CertVersion, Commitment, CommitmentMeta, CommitmentMode, DaBackend,
    UnknownVariant, DIGEST_LEN,
};
pub use ephemeral::{
    EphemeralConfig, EphemeralConfigPatch, EphemeralStore, InstructedStatus,
    DEFAULT_MAX_BLOB_SIZE, PRUNE_INTERVAL,
};
pub use error::{StoreError, StoreResult, RECENCY_STATUS_CODE};
pub use faulty::FaultyStore;
pub use file::FileObjectStore;
pub use memory::MemoryKeyedStore;
pub use memstore::{Memstore, MEMSTORE_CERT_LEN};
