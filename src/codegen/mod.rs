//! Turning rendered loop sources into callable native code.

pub mod abi;
pub mod loader;
pub mod toolchain;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use doping_template::RenderedSource;
use tracing::{debug, info, warn};

pub use abi::{ABI_VERSION, ArgPack, ArgTag, ArgValue, Arguments, C_HEADER, ENTRY_SYMBOL};
pub use loader::{EntryPoint, LibraryHandle, LibraryLoader, NativeLoader};
pub use toolchain::{CompileOutput, compile_shared};

use crate::cache::ArtifactStore;
use crate::config::RuntimeConfig;
use crate::error::SpecializationError;

/// Process-wide counter for intermediate file names.
static NEXT_STEM: AtomicU64 = AtomicU64::new(0);

fn next_stem() -> String {
    format!("spec_{}", NEXT_STEM.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactOrigin {
    Compiled,
    Store,
}

/// A loaded library together with its resolved entry point.
///
/// The entry point is only valid while the library handle is alive, which is
/// why both live and die together here.
#[derive(Debug)]
pub struct CompiledArtifact {
    entry: EntryPoint,
    library: Box<dyn LibraryHandle>,
    origin: ArtifactOrigin,
}

impl CompiledArtifact {
    pub fn new(
        library: Box<dyn LibraryHandle>,
        origin: ArtifactOrigin,
    ) -> Result<Self, SpecializationError> {
        let entry = library.resolve(ENTRY_SYMBOL)?;
        Ok(Self {
            entry,
            library,
            origin,
        })
    }

    pub fn call(&self, current_iteration: i64, args: &mut ArgPack) -> i32 {
        // SAFETY: `entry` was resolved from `library`, which `self` keeps loaded.
        // The body behind it is caller-supplied code compiled against the
        // argument ABI header.
        unsafe { (self.entry)(current_iteration, args) }
    }

    pub fn library_path(&self) -> &Path {
        self.library.path()
    }

    pub fn origin(&self) -> ArtifactOrigin {
        self.origin
    }
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    compiler_invocations: AtomicU64,
    links: AtomicU64,
    store_hits: AtomicU64,
}

impl PipelineStats {
    fn record_compile(&self) {
        self.compiler_invocations.fetch_add(1, Ordering::Relaxed);
    }

    fn record_link(&self) {
        self.links.fetch_add(1, Ordering::Relaxed);
    }

    fn record_store_hit(&self) {
        self.store_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn compiler_invocations(&self) -> u64 {
        self.compiler_invocations.load(Ordering::Relaxed)
    }

    pub fn links(&self) -> u64 {
        self.links.load(Ordering::Relaxed)
    }

    pub fn store_hits(&self) -> u64 {
        self.store_hits.load(Ordering::Relaxed)
    }
}

/// Writes, compiles and loads rendered sources.
#[derive(Debug)]
pub struct CompilationPipeline {
    loader: Box<dyn LibraryLoader>,
    work_dir: Option<PathBuf>,
    save_intermediates: bool,
    store: Option<ArtifactStore>,
    stats: PipelineStats,
}

impl Default for CompilationPipeline {
    fn default() -> Self {
        Self::new(Box::new(NativeLoader))
    }
}

impl CompilationPipeline {
    pub fn new(loader: Box<dyn LibraryLoader>) -> Self {
        Self {
            loader,
            work_dir: None,
            save_intermediates: false,
            store: None,
            stats: PipelineStats::default(),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        let store = config
            .artifact_cache
            .as_deref()
            .and_then(|root| match ArtifactStore::open(Some(root)) {
                Ok(store) => Some(store),
                Err(err) => {
                    warn!(root = %root.display(), "artifact store disabled: {err:#}");
                    None
                }
            });

        let mut pipeline = Self::default()
            .with_save_intermediates(config.save_intermediates)
            .with_store(store);
        pipeline.work_dir = config.work_dir.clone();
        pipeline
    }

    pub fn with_loader(mut self, loader: Box<dyn LibraryLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_save_intermediates(mut self, save: bool) -> Self {
        self.save_intermediates = save;
        self
    }

    pub fn with_store(mut self, store: Option<ArtifactStore>) -> Self {
        self.store = store;
        self
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    pub fn saves_intermediates(&self) -> bool {
        self.save_intermediates
    }

    /// Loads `library` and resolves the entry point.
    pub fn link(
        &self,
        library: &Path,
        origin: ArtifactOrigin,
    ) -> Result<CompiledArtifact, SpecializationError> {
        let handle = self.loader.load(library)?;
        let artifact = CompiledArtifact::new(handle, origin)?;
        self.stats.record_link();
        Ok(artifact)
    }

    pub fn compile_and_link(
        &self,
        rendered: &RenderedSource,
        compiler_command: &str,
    ) -> Result<CompiledArtifact, SpecializationError> {
        let store_key = self
            .store
            .as_ref()
            .map(|store| (store, store.fingerprint(rendered, compiler_command)));

        if let Some((store, key)) = &store_key {
            match store.lookup(key) {
                Ok(Some(entry)) => match self.link(&entry.binary_path, ArtifactOrigin::Store) {
                    Ok(artifact) => {
                        self.stats.record_store_hit();
                        debug!(key = key.as_str(), "reusing stored library");
                        return Ok(artifact);
                    }
                    Err(err) => warn!(key = key.as_str(), "stored library unusable: {err}"),
                },
                Ok(None) => {}
                Err(err) => warn!(key = key.as_str(), "artifact store lookup failed: {err:#}"),
            }
        }

        let started = Instant::now();
        let workspace = self.create_workspace()?;
        let stem = next_stem();
        let source = workspace
            .path()
            .join(format!("{stem}.{}", toolchain::source_extension(compiler_command)));
        let library = workspace
            .path()
            .join(format!("{stem}.{}", std::env::consts::DLL_EXTENSION));

        let header = workspace.path().join(abi::HEADER_FILE_NAME);
        fs::write(&header, C_HEADER)
            .map_err(|err| SpecializationError::file_io("write", &header, err))?;
        fs::write(&source, rendered.as_str())
            .map_err(|err| SpecializationError::file_io("write", &source, err))?;

        self.stats.record_compile();
        let compiled = toolchain::compile_shared(compiler_command, &source, &library);

        if self.save_intermediates {
            let log = workspace.path().join(format!("{stem}.log"));
            let text = match &compiled {
                Ok(output) => output.output.as_str(),
                Err(SpecializationError::Compile { output, .. }) => output.as_str(),
                Err(_) => "",
            };
            if let Err(err) = fs::write(&log, text) {
                warn!(path = %log.display(), "failed to write compiler log: {err}");
            }
        }

        let compiled = match compiled {
            Ok(compiled) => compiled,
            Err(err) => {
                self.finish_workspace(workspace);
                return Err(err);
            }
        };
        debug!(
            library = %compiled.library.display(),
            elapsed_ms = compiled.duration.as_millis() as u64,
            "compiled specialized library"
        );

        let linked = self.link(&library, ArtifactOrigin::Compiled);

        if let (Ok(_), Some((store, key))) = (&linked, &store_key) {
            let build_time_ms = started.elapsed().as_millis();
            if let Err(err) = store.store(key, &library, compiler_command, build_time_ms, rendered.len())
            {
                warn!(key = key.as_str(), "failed to store library: {err:#}");
            }
        }

        self.finish_workspace(workspace);
        linked
    }

    /// Keeps or removes a compilation directory. Removal problems are not
    /// fatal: the library is already mapped.
    fn finish_workspace(&self, workspace: tempfile::TempDir) {
        if self.save_intermediates {
            let kept = workspace.into_path();
            info!(path = %kept.display(), "kept intermediate files");
        } else {
            let path = workspace.path().to_path_buf();
            if let Err(err) = workspace.close() {
                warn!(path = %path.display(), "failed to remove intermediate files: {err}");
            }
        }
    }

    fn create_workspace(&self) -> Result<tempfile::TempDir, SpecializationError> {
        let parent = self.work_dir.clone().unwrap_or_else(std::env::temp_dir);
        if let Err(err) = fs::create_dir_all(&parent) {
            return Err(SpecializationError::file_io("create", &parent, err));
        }
        tempfile::Builder::new()
            .prefix("doping-")
            .tempdir_in(&parent)
            .map_err(|err| SpecializationError::file_io("create a working directory in", &parent, err))
    }
}
