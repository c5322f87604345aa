#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use doping::codegen::{EntryPoint, LibraryHandle, LibraryLoader};
use doping::SpecializationError;

pub fn temp_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("failed to create temp dir")
}

/// Whether a system C compiler can be used.
pub fn cc_available() -> bool {
    duct::cmd!("cc", "--version")
        .stdout_null()
        .stderr_null()
        .unchecked()
        .run()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// A compiler stand-in that creates an empty file at its `-o` target.
#[cfg(unix)]
pub fn fake_compiler(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-cc");
    std::fs::write(&path, "#!/bin/sh\nfor last; do :; done\n: > \"$last\"\n")
        .expect("failed to write fake compiler");
    let mut permissions = std::fs::metadata(&path)
        .expect("fake compiler metadata")
        .permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(&path, permissions).expect("failed to mark fake compiler executable");
    path
}

/// Hands out a fixed entry point for whatever path it is asked to load.
#[derive(Debug, Clone)]
pub struct FakeLoader {
    entry: Option<EntryPoint>,
    loads: Rc<Cell<usize>>,
}

impl FakeLoader {
    pub fn new(entry: EntryPoint) -> Self {
        Self {
            entry: Some(entry),
            loads: Rc::default(),
        }
    }

    /// Loads succeed but the entry symbol is missing.
    pub fn without_entry() -> Self {
        Self {
            entry: None,
            loads: Rc::default(),
        }
    }

    pub fn load_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.loads)
    }
}

impl LibraryLoader for FakeLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn LibraryHandle>, SpecializationError> {
        self.loads.set(self.loads.get() + 1);
        Ok(Box::new(FakeLibrary {
            path: path.to_path_buf(),
            entry: self.entry,
        }))
    }
}

#[derive(Debug)]
struct FakeLibrary {
    path: PathBuf,
    entry: Option<EntryPoint>,
}

impl LibraryHandle for FakeLibrary {
    fn resolve(&self, symbol: &str) -> Result<EntryPoint, SpecializationError> {
        self.entry
            .ok_or_else(|| SpecializationError::link(&self.path, format!("no symbol `{symbol}`")))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// An in-memory writer whose contents stay readable after it is handed out.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    /// Returns everything written so far and empties the buffer.
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.borrow_mut());
        String::from_utf8(bytes).expect("benchmark output is UTF-8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
