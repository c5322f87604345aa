use std::ffi::c_int;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::abi::ArgPack;
use crate::error::SpecializationError;

/// Signature of the `function` symbol every specialized library exports.
pub type EntryPoint = unsafe extern "C" fn(i64, *mut ArgPack) -> c_int;

/// Capability to bring a shared library into the process.
pub trait LibraryLoader: fmt::Debug {
    fn load(&self, path: &Path) -> Result<Box<dyn LibraryHandle>, SpecializationError>;
}

/// A loaded library. Dropping the handle unloads it.
pub trait LibraryHandle: fmt::Debug {
    fn resolve(&self, symbol: &str) -> Result<EntryPoint, SpecializationError>;

    fn path(&self) -> &Path;
}

/// Loads libraries with the platform loader (`dlopen` / `LoadLibrary`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl LibraryLoader for NativeLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn LibraryHandle>, SpecializationError> {
        // SAFETY: running library initialisers is inherent to specialization; the
        // library was produced from a template the caller supplied.
        let library = unsafe { libloading::Library::new(path) }
            .map_err(|err| SpecializationError::link(path, err.to_string()))?;

        debug!(path = %path.display(), "loaded specialized library");

        Ok(Box::new(NativeLibrary {
            path: path.to_path_buf(),
            library,
        }))
    }
}

pub struct NativeLibrary {
    path: PathBuf,
    library: libloading::Library,
}

impl LibraryHandle for NativeLibrary {
    fn resolve(&self, symbol: &str) -> Result<EntryPoint, SpecializationError> {
        // SAFETY: the entry point signature is fixed by the argument ABI header
        // that generated sources include.
        let entry = unsafe { self.library.get::<EntryPoint>(symbol.as_bytes()) }.map_err(|err| {
            SpecializationError::link(
                &self.path,
                format!("symbol `{symbol}` not found: {err}"),
            )
        })?;
        Ok(*entry)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "unloading specialized library");
    }
}
