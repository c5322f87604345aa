use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use doping_template::RenderedSource;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::cache::metadata::ArtifactMetadata;
use crate::cache::path::{binaries_dir, ensure_structure, metadata_dir, store_root};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactKey(pub Arc<String>);

impl ArtifactKey {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Debug)]
pub struct ArtifactEntry {
    pub key: ArtifactKey,
    pub metadata: ArtifactMetadata,
    pub binary_path: PathBuf,
}

/// On-disk libraries shared between executions, keyed by content fingerprint.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    binaries_dir: PathBuf,
    metadata_dir: PathBuf,
}

impl ArtifactStore {
    pub fn open(custom_root: Option<&Path>) -> Result<Self> {
        let root = store_root(custom_root)?;
        ensure_structure(&root)?;
        let binaries = binaries_dir(&root);
        let metadata = metadata_dir(&root);

        debug!("artifact store initialised" = %root.display());

        Ok(Self {
            root,
            binaries_dir: binaries,
            metadata_dir: metadata,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn binary_path(&self, key: &ArtifactKey) -> PathBuf {
        self.binaries_dir.join(format!(
            "{}.{}",
            key.as_str(),
            std::env::consts::DLL_EXTENSION
        ))
    }

    pub fn metadata_path(&self, key: &ArtifactKey) -> PathBuf {
        self.metadata_dir.join(format!("{}.yaml", key.as_str()))
    }

    pub fn fingerprint(&self, rendered: &RenderedSource, compiler_command: &str) -> ArtifactKey {
        let mut hasher = Sha1::new();
        hasher.update(rendered.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(compiler_command.as_bytes());
        hasher.update([0u8]);
        hasher.update(crate::version::VERSION.as_bytes());

        let key = format!("{:x}", hasher.finalize());
        ArtifactKey(Arc::new(key))
    }

    pub fn lookup(&self, key: &ArtifactKey) -> Result<Option<ArtifactEntry>> {
        let metadata_path = self.metadata_path(key);
        if !metadata_path.exists() {
            return Ok(None);
        }

        let metadata = ArtifactMetadata::read_from_yaml(&metadata_path)?;
        let binary_path = metadata.binary_path.clone();

        if !binary_path.exists() {
            debug!("stored library missing" = %binary_path.display());
            return Ok(None);
        }

        Ok(Some(ArtifactEntry {
            key: key.clone(),
            metadata,
            binary_path,
        }))
    }

    /// Copies `library` into the store and records its metadata.
    ///
    /// The copy goes through a temporary name and a rename so a concurrent
    /// reader never maps a half-written library.
    pub fn store(
        &self,
        key: &ArtifactKey,
        library: &Path,
        compiler_command: &str,
        build_time_ms: u128,
        source_len: usize,
    ) -> Result<ArtifactEntry> {
        let binary_path = self.binary_path(key);
        let staging = binary_path.with_extension("tmp");
        fs::copy(library, &staging).with_context(|| {
            format!(
                "failed to copy {} into the artifact store",
                library.display()
            )
        })?;
        fs::rename(&staging, &binary_path)
            .with_context(|| format!("failed to publish {}", binary_path.display()))?;

        let binary_size = ArtifactMetadata::binary_size(&binary_path)?;
        let metadata = ArtifactMetadata::new(
            key.as_str().to_string(),
            compiler_command,
            binary_path.clone(),
            binary_size,
            build_time_ms,
            source_len,
        );
        metadata.write_to_yaml(&self.metadata_path(key))?;

        debug!(key = key.as_str(), size = binary_size, "stored library");

        Ok(ArtifactEntry {
            key: key.clone(),
            metadata,
            binary_path,
        })
    }
}
