//! Loop descriptors and the specialized functions built from them.

pub mod function;
pub mod key;

pub use function::DynamicFunction;
pub use key::SpecializationKey;

use crate::config::DEFAULT_COMPILER;

/// Describes one loop site on every call into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopDescriptor<'a> {
    pub name: Option<&'a str>,
    pub source: &'a str,
    /// Serialized `NAME:value` pairs.
    pub parameters: &'a str,
    pub compiler_command: &'a str,
    pub iteration_start: i64,
    /// Upper bound of the iteration space.
    pub iteration_space: i64,
}

impl<'a> LoopDescriptor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            name: None,
            source,
            parameters: "",
            compiler_command: DEFAULT_COMPILER,
            iteration_start: 0,
            iteration_space: 0,
        }
    }

    pub fn named(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn with_parameters(mut self, parameters: &'a str) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_compiler(mut self, command: &'a str) -> Self {
        self.compiler_command = command;
        self
    }

    pub fn with_iteration_space(mut self, start: i64, end: i64) -> Self {
        self.iteration_start = start;
        self.iteration_space = end;
        self
    }

    /// Fraction of the iteration space covered at `current_iteration`.
    ///
    /// An empty or inverted iteration space reports no progress.
    pub fn progress(&self, current_iteration: i64) -> f64 {
        let length = self.iteration_space.saturating_sub(self.iteration_start);
        if length <= 0 {
            return 0.0;
        }
        current_iteration as f64 / length as f64
    }

    pub fn display_name(&self) -> &str {
        self.name.unwrap_or("<anonymous>")
    }
}
