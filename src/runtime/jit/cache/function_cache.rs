use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Instant;

use ahash::RandomState;

use super::CacheMetadata;
use crate::runtime::jit::specialization::{DynamicFunction, SpecializationKey};

#[derive(Debug)]
pub struct CachedEntry<T> {
    pub value: T,
    pub metadata: CacheMetadata,
}

/// Specializations built so far, one per key, kept for the owner's lifetime.
///
/// Nothing is ever evicted and a failed build leaves no entry behind, so the
/// next request for the same key tries again.
#[derive(Debug)]
pub struct SpecializationCache<T = DynamicFunction> {
    entries: HashMap<SpecializationKey, CachedEntry<T>, RandomState>,
    hits: u64,
    misses: u64,
    failures: u64,
}

impl<T> Default for SpecializationCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::default(),
            hits: 0,
            misses: 0,
            failures: 0,
        }
    }
}

impl<T> SpecializationCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `key`, building it with `create` on a miss.
    pub fn get_or_create<E, F>(&mut self, key: SpecializationKey, create: F) -> Result<&T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                let entry = entry.into_mut();
                entry.metadata.record_access();
                Ok(&entry.value)
            }
            Entry::Vacant(slot) => {
                self.misses += 1;
                let started = Instant::now();
                match create() {
                    Ok(value) => {
                        let entry = slot.insert(CachedEntry {
                            value,
                            metadata: CacheMetadata::new(started.elapsed()),
                        });
                        Ok(&entry.value)
                    }
                    Err(err) => {
                        self.failures += 1;
                        Err(err)
                    }
                }
            }
        }
    }

    pub fn contains(&self, key: &SpecializationKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &SpecializationKey) -> Option<&T> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn metadata(&self, key: &SpecializationKey) -> Option<&CacheMetadata> {
        self.entries.get(key).map(|entry| &entry.metadata)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SpecializationKey> {
        self.entries.keys()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            failures: self.failures,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Misses whose build failed.
    pub failures: u64,
}
