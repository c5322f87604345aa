// In-process specialization cache
pub mod function_cache;
pub mod metadata;

pub use function_cache::{CacheStats, CachedEntry, SpecializationCache};
pub use metadata::CacheMetadata;
