//! CLI command implementations.

pub mod check_config;
pub mod selftest;

use daproxy_manager::ManagerConfig;
use std::path::Path;

/// Reads a JSON configuration, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<ManagerConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(ManagerConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let config = serde_json::from_str(&raw)
        .map_err(|e| format!("cannot parse {}: {e}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use daproxy_storage::DaBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_without_path() {
        assert_eq!(load_config(None).unwrap(), ManagerConfig::default());
    }

    #[test]
    fn reads_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"backends_to_enable": ["v1"], "dispersal_backend": "v1"}}"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.dispersal_backend, DaBackend::V1);
    }

    #[test]
    fn malformed_json_names_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("cannot parse"));
    }
}
