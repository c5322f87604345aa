use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;

/// Directory name used under the home directory when no root is configured.
pub const DEFAULT_DIR_NAME: &str = ".doping_cache";

pub fn store_root(custom: Option<&Path>) -> Result<PathBuf> {
    if let Some(custom) = custom {
        return Ok(custom.to_path_buf());
    }

    let base_dirs = BaseDirs::new().context("failed to determine user directories")?;
    Ok(base_dirs.home_dir().join(DEFAULT_DIR_NAME))
}

pub fn binaries_dir(root: &Path) -> PathBuf {
    root.join("binaries")
}

pub fn metadata_dir(root: &Path) -> PathBuf {
    root.join("metadata")
}

pub fn ensure_structure(root: &Path) -> Result<()> {
    let binaries = binaries_dir(root);
    let metadata = metadata_dir(root);
    std::fs::create_dir_all(binaries).context("failed to create binaries store directory")?;
    std::fs::create_dir_all(metadata).context("failed to create metadata store directory")?;
    Ok(())
}
