use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::MetaError;

/// Name of the in-memory backend.
pub const TEMP_BACKEND: &str = "temp";

/// Configuration for a metadata service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    /// Registered backend to construct.
    pub backend: String,
    /// Cluster block size in bytes.
    pub block_size: u64,
    /// Block layer spec applied when a file does not choose one.
    pub default_block_spec: String,
    /// Fixed identity for the client handle; a fresh UUID is used when unset.
    pub identity: Option<String>,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            backend: TEMP_BACKEND.to_string(),
            block_size: 8 * 1024,
            default_block_spec: String::from("crc,base"),
            identity: None,
        }
    }
}

impl MetaConfig {
    /// Loads a configuration from a `.toml` or `.json` file.
    pub fn from_file(path: &Path) -> Result<Self, MetaError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MetaError::Config(format!("{}: {}", path.display(), e)))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => toml::from_str(&contents).map_err(|e| MetaError::Config(e.to_string())),
            "json" => serde_json::from_str(&contents).map_err(|e| MetaError::Config(e.to_string())),
            _ => Err(MetaError::Config(format!(
                "unsupported config file extension: {}",
                ext
            ))),
        }
    }
}
