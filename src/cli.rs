use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use doping_template::{ParameterMap, RenderedSource, Template};
use tracing::{debug, info};

use crate::codegen::{ArgPack, ArtifactOrigin, C_HEADER, CompilationPipeline, CompiledArtifact};
use crate::config::{DEFAULT_COMPILER, LogSettings, RuntimeConfig, Verbosity};
use crate::utils::errors::{ToDiagnostic, emit_diagnostics};
use crate::utils::logger;
use crate::utils::profiler::{PhaseTiming, Profiler};
use crate::version::VERSION;

pub const RENDER_FAILED: &str = "template rendering failed";
pub const INVALID_PARAMETERS: &str = "invalid parameters";

#[derive(Parser, Debug)]
#[command(
    name = "doping",
    version = VERSION,
    about = "Render, compile and run doping loop templates"
)]
pub struct DopingCli {
    #[arg(long, global = true)]
    /// Display phase timing information.
    time: bool,

    #[arg(short, long, global = true, action = ArgAction::Count)]
    /// Raise log verbosity (repeat for more detail).
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

impl DopingCli {
    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Prints the template rendered against the given parameters.
    Render {
        path: PathBuf,
        #[arg(short, long, default_value = "")]
        params: String,
    },
    /// Renders, compiles and links the template, then reports the library.
    Build {
        path: PathBuf,
        #[arg(short, long, default_value = "")]
        params: String,
        #[arg(long, default_value = DEFAULT_COMPILER)]
        cc: String,
        #[arg(long)]
        /// Keep the generated source, library and compiler log.
        keep: bool,
    },
    /// Builds the template and calls its entry point once with no arguments.
    Run {
        path: PathBuf,
        #[arg(short, long, default_value = "")]
        params: String,
        #[arg(long, default_value = DEFAULT_COMPILER)]
        cc: String,
        #[arg(long, default_value_t = 0)]
        iteration: i64,
    },
    /// Prints the C header describing the argument pack.
    Header,
}

pub fn run() -> Result<()> {
    let cli = DopingCli::parse();
    let mut log = LogSettings::from_env();
    if cli.verbose > 0 {
        log.verbosity = Verbosity(cli.verbose);
    }
    logger::init_logging(&log)?;
    let mut config = RuntimeConfig::from_env()?;
    config.log = log;

    let mut profiler = Profiler::new();
    match &cli.command {
        Command::Render { path, params } => {
            let rendered = render_file(&mut profiler, path, params)?;
            print!("{rendered}");
        }
        Command::Build {
            path,
            params,
            cc,
            keep,
        } => {
            let rendered = render_file(&mut profiler, path, params)?;
            let pipeline = CompilationPipeline::from_config(&config)
                .with_save_intermediates(*keep || config.save_intermediates);
            let artifact = build(&mut profiler, &pipeline, &rendered, cc)?;
            println!("{}", link_summary(&pipeline, &artifact));
        }
        Command::Run {
            path,
            params,
            cc,
            iteration,
        } => {
            let rendered = render_file(&mut profiler, path, params)?;
            let pipeline = CompilationPipeline::from_config(&config);
            let artifact = build(&mut profiler, &pipeline, &rendered, cc)?;
            let mut args = ArgPack::empty();
            let status = profiler.record_phase("Execute", || artifact.call(*iteration, &mut args));
            println!("{} {status}", "status".green().bold());
        }
        Command::Header => print!("{C_HEADER}"),
    }

    if cli.time {
        print_timings(profiler.phases());
    }

    Ok(())
}

fn render_file(profiler: &mut Profiler, path: &Path, params: &str) -> Result<RenderedSource> {
    let source = read_source(path)?;
    let source_id = path.display().to_string();

    let parameters = match ParameterMap::parse(params) {
        Ok(parameters) => parameters,
        Err(err) => {
            emit_diagnostics(&[err.to_diagnostic("<parameters>")], params);
            bail!(INVALID_PARAMETERS);
        }
    };
    debug!(parameters = %parameters, "parsed parameters");

    let rendered = profiler.record_phase("Render", || {
        Template::parse(source.as_str()).and_then(|template| template.render(&parameters))
    });
    match rendered {
        Ok(rendered) => Ok(rendered),
        Err(err) => {
            emit_diagnostics(&[err.to_diagnostic(&source_id)], &source);
            bail!(RENDER_FAILED);
        }
    }
}

fn build(
    profiler: &mut Profiler,
    pipeline: &CompilationPipeline,
    rendered: &RenderedSource,
    compiler_command: &str,
) -> Result<CompiledArtifact> {
    let artifact = profiler
        .record_phase("Compile + link", || {
            pipeline.compile_and_link(rendered, compiler_command)
        })
        .context("failed to build specialized library")?;
    info!(
        library = %artifact.library_path().display(),
        origin = ?artifact.origin(),
        "built specialized library"
    );
    Ok(artifact)
}

/// Names the library only when it is still on disk after the build.
fn link_summary(pipeline: &CompilationPipeline, artifact: &CompiledArtifact) -> String {
    let survives =
        pipeline.saves_intermediates() || artifact.origin() == ArtifactOrigin::Store;
    if survives {
        format!("{} {}", "linked".green().bold(), artifact.library_path().display())
    } else {
        format!(
            "{} (library loaded, build directory removed; pass --keep to retain it)",
            "linked".green().bold()
        )
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn print_timings(phases: &[PhaseTiming]) {
    println!("{}", "[Timing]".bold());
    let mut total = Duration::ZERO;
    for PhaseTiming { name, duration } in phases {
        println!("{:>16}: {:>6.2} ms", name, duration.as_secs_f64() * 1000.0);
        total += *duration;
    }
    println!("{:>16}: {:>6.2} ms", "Total", total.as_secs_f64() * 1000.0);
}
