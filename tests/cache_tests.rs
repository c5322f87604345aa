mod common;

use std::ffi::c_int;
use std::fs;

use anyhow::Result;
use doping::RenderedSource;
use doping::cache::{ArtifactMetadata, ArtifactStore};
use doping::codegen::{ArgPack, CompilationPipeline};
use doping::codegen::abi::ArgValue;

use common::{FakeLoader, temp_dir};

unsafe extern "C" fn answer(_it: i64, _pack: *mut ArgPack) -> c_int {
    42
}

#[test]
fn store_roundtrip_keeps_library_and_metadata() -> Result<()> {
    let dir = temp_dir("doping-store-test");
    let store = ArtifactStore::open(Some(dir.path()))?;

    let rendered = RenderedSource::new("int n = 4;");
    let key = store.fingerprint(&rendered, "cc -O2");
    assert!(store.lookup(&key)?.is_none());

    let library = dir.path().join("built.so");
    fs::write(&library, b"fake-library")?;
    store.store(&key, &library, "cc -O2", 3, rendered.len())?;

    let entry = store.lookup(&key)?.expect("expected stored entry to roundtrip");
    assert_eq!(entry.binary_path, store.binary_path(&key));
    assert_eq!(fs::read(&entry.binary_path)?, b"fake-library");
    assert_eq!(entry.metadata.binary_size, 12);
    assert_eq!(entry.metadata.compiler_command, "cc -O2");
    assert_eq!(entry.metadata.source_len, rendered.len());

    let reread = ArtifactMetadata::read_from_yaml(&store.metadata_path(&key))?;
    assert_eq!(reread.key, key.as_str());
    Ok(())
}

#[test]
fn fingerprint_tracks_source_and_command() -> Result<()> {
    let dir = temp_dir("doping-store-test");
    let store = ArtifactStore::open(Some(dir.path()))?;

    let first = RenderedSource::new("int n = 4;");
    let second = RenderedSource::new("int n = 5;");

    assert_eq!(store.fingerprint(&first, "cc"), store.fingerprint(&first, "cc"));
    assert_ne!(store.fingerprint(&first, "cc"), store.fingerprint(&second, "cc"));
    assert_ne!(store.fingerprint(&first, "cc"), store.fingerprint(&first, "cc -O3"));
    Ok(())
}

#[test]
fn entry_with_missing_library_is_a_miss() -> Result<()> {
    let dir = temp_dir("doping-store-test");
    let store = ArtifactStore::open(Some(dir.path()))?;
    let rendered = RenderedSource::new("int n;");
    let key = store.fingerprint(&rendered, "cc");

    let library = dir.path().join("built.so");
    fs::write(&library, b"x")?;
    let entry = store.store(&key, &library, "cc", 1, rendered.len())?;
    fs::remove_file(entry.binary_path)?;

    assert!(store.lookup(&key)?.is_none());
    Ok(())
}

#[cfg(unix)]
#[test]
fn stored_library_skips_the_compiler() -> Result<()> {
    let dir = temp_dir("doping-store-test");
    let compiler = common::fake_compiler(dir.path()).to_string_lossy().into_owned();
    let store_root = dir.path().join("store");
    let rendered = RenderedSource::new("int n = 1;");

    let first = CompilationPipeline::new(Box::new(FakeLoader::new(answer)))
        .with_work_dir(dir.path().join("work"))
        .with_store(Some(ArtifactStore::open(Some(&store_root))?));
    let artifact = first.compile_and_link(&rendered, &compiler)?;
    assert_eq!(artifact.origin(), doping::codegen::ArtifactOrigin::Compiled);
    assert_eq!(first.stats().compiler_invocations(), 1);

    // A later process with the same store reuses the library.
    let second = CompilationPipeline::new(Box::new(FakeLoader::new(answer)))
        .with_work_dir(dir.path().join("work"))
        .with_store(Some(ArtifactStore::open(Some(&store_root))?));
    let artifact = second.compile_and_link(&rendered, &compiler)?;
    assert_eq!(artifact.origin(), doping::codegen::ArtifactOrigin::Store);
    assert_eq!(second.stats().compiler_invocations(), 0);
    assert_eq!(second.stats().store_hits(), 1);

    let mut values = [ArgValue::int(0)];
    let mut pack = ArgPack {
        version: doping::codegen::ABI_VERSION,
        len: 1,
        values: values.as_mut_ptr(),
    };
    assert_eq!(artifact.call(0, &mut pack), 42);
    Ok(())
}
