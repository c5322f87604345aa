//! Cross-process store of compiled loop libraries.

pub mod manager;
pub mod metadata;
pub mod path;

pub use manager::{ArtifactEntry, ArtifactKey, ArtifactStore};
pub use metadata::ArtifactMetadata;
