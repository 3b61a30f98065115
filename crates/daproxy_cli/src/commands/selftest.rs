//! Selftest command implementation.
//!
//! Builds a manager over memstores, writes the payload in every commitment
//! mode the configuration enables, and reads each commitment back.

use daproxy_manager::{Manager, ManagerBuilder, ManagerConfig, TargetStats};
use daproxy_storage::{
    keccak256, CommitmentMode, DaBackend, FileObjectStore, MemoryKeyedStore,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Outcome of one put/get round trip.
#[derive(Debug, Serialize)]
pub struct RoundTrip {
    /// Commitment mode exercised.
    pub mode: CommitmentMode,
    /// Backend that handled the write, absent for keccak.
    pub backend: Option<DaBackend>,
    /// Hex-encoded commitment bytes.
    pub commitment: String,
    /// Whether the read returned the written payload.
    pub matched: bool,
}

/// Full selftest report.
#[derive(Debug, Serialize)]
pub struct SelftestReport {
    /// Round trips in execution order.
    pub round_trips: Vec<RoundTrip>,
    /// Secondary target counters after the run.
    pub targets: Vec<TargetStats>,
}

impl SelftestReport {
    /// Returns true if every round trip read back its payload.
    pub fn passed(&self) -> bool {
        self.round_trips.iter().all(|trip| trip.matched)
    }
}

/// Runs the selftest command.
pub fn run(
    config: ManagerConfig,
    object_store_dir: Option<&Path>,
    payload: &[u8],
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(execute(config, object_store_dir, payload))?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text_output(&report),
    }

    if report.passed() {
        Ok(())
    } else {
        Err("selftest read back a different payload".into())
    }
}

/// Builds the manager and performs every round trip.
pub async fn execute(
    config: ManagerConfig,
    object_store_dir: Option<&Path>,
    payload: &[u8],
) -> Result<SelftestReport, Box<dyn std::error::Error>> {
    config.validate()?;
    let backends = config.backends_to_enable.clone();

    let mut builder = ManagerBuilder::new(config.clone());
    if let Some(dir) = object_store_dir {
        let store = FileObjectStore::open(dir).await?;
        info!(root = %store.root().display(), "using file object store");
        builder = builder.with_keccak_store(Arc::new(store));
    }
    for name in &config.cache_targets {
        builder = builder.with_target(name.clone(), Arc::new(MemoryKeyedStore::cache()));
    }
    for name in &config.fallback_targets {
        builder = builder.with_target(name.clone(), Arc::new(MemoryKeyedStore::object_store()));
    }
    let manager = builder.with_memstores().build()?;

    let mut round_trips = Vec::new();
    round_trips.push(keccak_round_trip(&manager, payload).await?);
    for backend in backends {
        manager.set_dispersal_backend(backend)?;
        for mode in [CommitmentMode::OptimismGeneric, CommitmentMode::Standard] {
            round_trips.push(generated_round_trip(&manager, mode, backend, payload).await?);
        }
    }

    manager.shutdown().await;
    Ok(SelftestReport {
        targets: manager.secondary().stats(),
        round_trips,
    })
}

async fn keccak_round_trip(
    manager: &Manager,
    payload: &[u8],
) -> Result<RoundTrip, Box<dyn std::error::Error>> {
    let key = keccak256(payload);
    let mode = CommitmentMode::OptimismKeccak;
    let commitment = manager.put(mode, &key, payload).await?;
    let read = manager.get(commitment.as_bytes(), commitment.meta(mode)).await?;
    Ok(RoundTrip {
        mode,
        backend: None,
        commitment: hex::encode(commitment.as_bytes()),
        matched: read == payload,
    })
}

async fn generated_round_trip(
    manager: &Manager,
    mode: CommitmentMode,
    backend: DaBackend,
    payload: &[u8],
) -> Result<RoundTrip, Box<dyn std::error::Error>> {
    let commitment = manager.put(mode, &[], payload).await?;
    let read = manager.get(commitment.as_bytes(), commitment.meta(mode)).await?;
    info!(%mode, %backend, "round trip complete");
    Ok(RoundTrip {
        mode,
        backend: Some(backend),
        commitment: hex::encode(commitment.to_versioned_bytes()),
        matched: read == payload,
    })
}

fn print_text_output(report: &SelftestReport) {
    println!("Round trips");
    println!("-----------");
    for trip in &report.round_trips {
        let backend = trip
            .backend
            .map_or_else(|| "-".to_string(), |b| b.to_string());
        let status = if trip.matched { "ok" } else { "MISMATCH" };
        println!("{:<18} {:<4} {:<8} 0x{}", trip.mode.as_str(), backend, status, trip.commitment);
    }

    if !report.targets.is_empty() {
        println!();
        println!("Secondary targets");
        println!("-----------------");
        for target in &report.targets {
            println!(
                "{} ({}): writes {}/{} reads {}/{}",
                target.name,
                target.role,
                target.write_successes,
                target.write_successes + target.write_failures,
                target.read_hits,
                target.read_hits + target.read_failures,
            );
        }
    }

    println!();
    if report.passed() {
        println!("Selftest passed");
    } else {
        println!("Selftest FAILED");
    }
}
