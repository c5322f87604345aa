use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};

/// Sidecar record describing one stored library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub compiler_command: String,
    pub binary_path: PathBuf,
    pub binary_size: u64,
    pub build_time_ms: u128,
    pub source_len: usize,
}

impl ArtifactMetadata {
    pub fn new(
        key: String,
        compiler_command: impl Into<String>,
        binary_path: PathBuf,
        binary_size: u64,
        build_time_ms: u128,
        source_len: usize,
    ) -> Self {
        Self {
            key,
            created_at: Utc::now(),
            crate_version: crate::version::VERSION.to_string(),
            compiler_command: compiler_command.into(),
            binary_path,
            binary_size,
            build_time_ms,
            source_len,
        }
    }

    pub fn write_to_yaml(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("failed to serialise artifact metadata")?;
        let mut file = File::create(path).context("failed to open artifact metadata file")?;
        file.write_all(yaml.as_bytes())
            .context("failed to write artifact metadata")
    }

    pub fn read_from_yaml(path: &Path) -> Result<Self> {
        let file = File::open(path).context("failed to open artifact metadata")?;
        serde_yaml::from_reader(file).context("failed to deserialise artifact metadata")
    }

    pub fn binary_size(path: &Path) -> Result<u64> {
        let file = File::open(path)
            .with_context(|| format!("failed to open stored library {}", path.display()))?;
        // SAFETY: the file stays open for the lifetime of the map, which is dropped before returning.
        let map = unsafe { Mmap::map(&file).context("failed to memory-map stored library")? };
        Ok(map.len() as u64)
    }
}
