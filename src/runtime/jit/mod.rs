// Runtime loop specialization
pub mod cache;
pub mod engine;
pub mod specialization;

pub use cache::{CacheStats, SpecializationCache};
pub use engine::{EngineSnapshot, EngineStats, SpecializationContext};
pub use specialization::{DynamicFunction, LoopDescriptor, SpecializationKey};
