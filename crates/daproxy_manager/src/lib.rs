//! # DA Proxy Storage Manager
//!
//! Routing and redundancy core of the DA proxy.
//!
//! This crate provides:
//! - [`Manager`]: routes puts and gets by commitment mode and certificate version
//! - [`SecondaryRouter`]: cache and fallback targets with best-effort replication
//! - [`ManagerConfig`] with validation, and [`ManagerBuilder`] for assembly
//! - [`Admin`]: runtime control of the dispersal backend and ephemeral store
//!
//! ## Key Invariants
//!
//! - A certificate is served by the backend of its own version, never by
//!   whichever backend currently receives writes
//! - Within one read: cache, then primary, then fallback
//! - Secondary copies are trusted only after the primary's verification
//! - Replication failures are logged, never returned to the writer
//! - Cache and fallback target lists are disjoint

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Request paths must not panic
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod admin;
mod builder;
mod config;
mod error;
mod manager;
mod secondary;

pub use admin::{Admin, AdminCommand, AdminResponse};
pub use builder::ManagerBuilder;
pub use config::ManagerConfig;
pub use error::{ManagerError, ManagerResult, TargetRole};
pub use manager::{Manager, PrimaryStores};
pub use secondary::{
    KeccakVerifier, PayloadVerifier, PutNotification, SecondaryRouter, SecondaryTarget,
    TargetStats,
};
