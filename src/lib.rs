//! Runtime loop specialization.
//!
//! A hot loop hands [`SpecializationContext::specialize`] a template of its
//! own body, the runtime values worth baking in, and the arguments the body
//! needs. The first call for a given set of values renders the template,
//! compiles it into a shared library with the system compiler, loads it and
//! runs it in place of the remaining baseline iterations. Later calls with the
//! same values reuse the loaded library. Any failure leaves the baseline loop
//! running.

pub mod cache;
pub mod capi;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod error;
pub mod runtime;
pub mod utils;
pub mod version;

pub use doping_template::{ParameterMap, RenderError, RenderedSource, Template, render};

pub use codegen::{ArgPack, Arguments, CompilationPipeline, CompiledArtifact, LibraryLoader};
pub use config::{RuntimeConfig, SpecializationPolicy};
pub use error::{ErrorKind, SpecializationError};
pub use runtime::jit::{
    DynamicFunction, LoopDescriptor, SpecializationCache, SpecializationContext,
    SpecializationKey,
};
