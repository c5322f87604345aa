use doping_template::{ParameterMap, RenderedSource, Template};
use tracing::{debug, trace};

use crate::codegen::{ArgPack, Arguments, CompilationPipeline, CompiledArtifact};
use crate::error::SpecializationError;

/// One rendered loop body and, once linked, the library that implements it.
///
/// Rendering happens on construction; [`DynamicFunction::compile_and_link`]
/// must succeed before [`DynamicFunction::run`] can be used.
#[derive(Debug)]
pub struct DynamicFunction {
    parameters: ParameterMap,
    rendered: RenderedSource,
    artifact: Option<CompiledArtifact>,
}

impl DynamicFunction {
    pub fn new(template: &str, parameters: &str) -> Result<Self, SpecializationError> {
        let parameters = ParameterMap::parse(parameters)?;
        Self::with_parameters(template, parameters)
    }

    pub fn with_parameters(
        template: &str,
        parameters: ParameterMap,
    ) -> Result<Self, SpecializationError> {
        let rendered = Template::parse(template)?.render(&parameters)?;
        trace!(source = rendered.as_str(), "rendered template");
        Ok(Self {
            parameters,
            rendered,
            artifact: None,
        })
    }

    pub fn rendered(&self) -> &RenderedSource {
        &self.rendered
    }

    pub fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    pub fn is_linked(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn artifact(&self) -> Option<&CompiledArtifact> {
        self.artifact.as_ref()
    }

    pub fn compile_and_link(
        &mut self,
        pipeline: &CompilationPipeline,
        compiler_command: &str,
    ) -> Result<(), SpecializationError> {
        if self.artifact.is_some() {
            return Ok(());
        }
        let artifact = pipeline.compile_and_link(&self.rendered, compiler_command)?;
        self.artifact = Some(artifact);
        Ok(())
    }

    pub fn run(
        &self,
        current_iteration: i64,
        arguments: &mut Arguments<'_>,
    ) -> Result<i32, SpecializationError> {
        let mut pack = arguments.as_pack();
        self.run_packed(current_iteration, &mut pack)
    }

    pub fn run_packed(
        &self,
        current_iteration: i64,
        pack: &mut ArgPack,
    ) -> Result<i32, SpecializationError> {
        let artifact = self
            .artifact
            .as_ref()
            .ok_or(SpecializationError::NotLinked)?;
        Ok(artifact.call(current_iteration, pack))
    }
}

impl Drop for DynamicFunction {
    fn drop(&mut self) {
        if let Some(artifact) = &self.artifact {
            debug!(library = %artifact.library_path().display(), "releasing specialized function");
        }
    }
}
