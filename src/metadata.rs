//! Provenance of prepared datasets.
//!
//! Exported datasets record SHA-256 checksums of every input file and a hash
//! of the pipeline configuration, so a dataset can be traced back to the exact
//! inputs that produced it.

use crate::config::PipelineConfig;
use crate::data::list_files;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, warn};

/// Size and checksum of one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFileMetadata {
    pub path: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the file contents.
    pub checksum: String,
}

/// Where a dataset came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProvenance {
    pub crate_version: String,
    pub created_at: DateTime<Utc>,
    pub config_hash: String,
    pub data_files: Vec<DataFileMetadata>,
}

impl DatasetProvenance {
    /// Capture provenance for a config and the files read under `source`.
    pub fn capture(config: &PipelineConfig, source: Option<&Path>) -> Result<Self> {
        let data_files = match source {
            Some(path) => track_source(path)?,
            None => Vec::new(),
        };
        Ok(Self {
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            config_hash: compute_config_hash(config),
            data_files,
        })
    }
}

/// SHA-256 of a file's contents.
pub fn compute_file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let data = std::fs::read(path.as_ref())?;
    Ok(compute_hash(&data))
}

/// SHA-256 of arbitrary bytes.
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash of the JSON serialization of a config.
pub fn compute_config_hash<T: Serialize>(config: &T) -> String {
    match serde_json::to_vec(config) {
        Ok(bytes) => compute_hash(&bytes),
        Err(e) => {
            warn!("Failed to serialize config for hashing: {}", e);
            String::new()
        }
    }
}

pub fn track_data_file(path: impl AsRef<Path>) -> Result<DataFileMetadata> {
    let path = path.as_ref();
    let size = std::fs::metadata(path)?.len();
    let checksum = compute_file_checksum(path)?;
    debug!("{}: {} bytes, sha256 {}", path.display(), size, checksum);

    Ok(DataFileMetadata {
        path: path.display().to_string(),
        size,
        checksum,
    })
}

/// Track a single file, or every `*.csv` file of a directory in sorted order.
pub fn track_source(path: impl AsRef<Path>) -> Result<Vec<DataFileMetadata>> {
    let path = path.as_ref();
    if path.is_dir() {
        list_files(path, "*.csv")?.iter().map(track_data_file).collect()
    } else {
        Ok(vec![track_data_file(path)?])
    }
}
