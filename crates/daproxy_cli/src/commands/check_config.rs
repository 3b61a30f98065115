//! Check-config command implementation.

use super::load_config;
use daproxy_manager::ManagerConfig;
use daproxy_storage::DaBackend;
use serde::Serialize;
use std::path::Path;

/// Summary of a validated configuration.
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    /// Configuration path.
    pub path: String,
    /// Enabled versioned backends.
    pub backends: Vec<DaBackend>,
    /// Initial dispersal backend.
    pub dispersal_backend: DaBackend,
    /// Cache target names.
    pub cache_targets: Vec<String>,
    /// Fallback target names.
    pub fallback_targets: Vec<String>,
    /// "async" or "sync".
    pub replication: String,
    /// Dispersal attempts, or "unlimited".
    pub put_tries: String,
    /// Largest accepted encoded blob.
    pub max_blob_size_bytes: usize,
}

impl ConfigSummary {
    fn new(path: &Path, config: &ManagerConfig) -> Self {
        let replication = if config.async_put_workers > 0 {
            format!("async ({} workers)", config.async_put_workers)
        } else {
            "sync".to_string()
        };
        let put_tries = if config.put_tries < 0 {
            "unlimited".to_string()
        } else {
            config.put_tries.to_string()
        };
        Self {
            path: path.display().to_string(),
            backends: config.backends_to_enable.clone(),
            dispersal_backend: config.dispersal_backend,
            cache_targets: config.cache_targets.clone(),
            fallback_targets: config.fallback_targets.clone(),
            replication,
            put_tries,
            max_blob_size_bytes: config.max_blob_size_bytes,
        }
    }
}

/// Runs the check-config command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(Some(path))?;
    config.validate()?;
    let summary = ConfigSummary::new(path, &config);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print_text_output(&summary),
    }
    Ok(())
}

fn print_text_output(summary: &ConfigSummary) {
    println!("Configuration: {} (valid)", summary.path);
    println!();
    let backends: Vec<String> = summary.backends.iter().map(ToString::to_string).collect();
    println!("Backends:          {}", backends.join(", "));
    println!("Dispersal backend: {}", summary.dispersal_backend);
    println!("Put tries:         {}", summary.put_tries);
    println!("Max blob size:     {} bytes", summary.max_blob_size_bytes);
    println!("Replication:       {}", summary.replication);
    println!("Cache targets:     {}", list_or_none(&summary.cache_targets));
    println!("Fallback targets:  {}", list_or_none(&summary.fallback_targets));
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn summary_describes_replication() {
        let config = ManagerConfig::new()
            .with_async_put_workers(3)
            .with_put_tries(-1);
        let summary = ConfigSummary::new(Path::new("proxy.json"), &config);
        assert_eq!(summary.replication, "async (3 workers)");
        assert_eq!(summary.put_tries, "unlimited");
    }

    #[test]
    fn overlapping_targets_fail_check() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"cache_targets": ["redis"], "fallback_targets": ["redis"]}}"#
        )
        .unwrap();

        assert!(run(file.path(), "text").is_err());
    }
}
