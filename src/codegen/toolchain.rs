use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::error::SpecializationError;

/// Flags appended after the user's compiler command.
pub const SHARED_FLAGS: [&str; 2] = ["-fPIC", "-shared"];

#[derive(Debug)]
pub struct CompileOutput {
    pub library: PathBuf,
    /// Combined stdout and stderr of the compiler.
    pub output: String,
    pub duration: Duration,
}

/// Splits a compiler command into program and leading arguments.
pub fn split_command(command: &str) -> Option<(&str, Vec<&str>)> {
    let mut parts = command.split_ascii_whitespace();
    let program = parts.next()?;
    Some((program, parts.collect()))
}

/// Source extension the compiler expects: `.cpp` for C++ drivers, `.c` otherwise.
pub fn source_extension(command: &str) -> &'static str {
    let program = split_command(command)
        .map(|(program, _)| program)
        .unwrap_or_default();
    let name = Path::new(program)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(program);
    if name.contains("++") { "cpp" } else { "c" }
}

/// Runs `<command> -fPIC -shared <source> -o <library>`.
pub fn compile_shared(
    command: &str,
    source: &Path,
    library: &Path,
) -> Result<CompileOutput, SpecializationError> {
    let Some((program, leading)) = split_command(command) else {
        return Err(SpecializationError::Compile {
            command: command.to_string(),
            status: None,
            output: "empty compiler command".to_string(),
        });
    };

    let mut args: Vec<&OsStr> = leading.iter().map(|arg| OsStr::new(*arg)).collect();
    args.extend(SHARED_FLAGS.iter().map(|flag| OsStr::new(*flag)));
    args.push(source.as_os_str());
    args.push(OsStr::new("-o"));
    args.push(library.as_os_str());

    debug!(program, ?args, "invoking compiler");

    let started = Instant::now();
    let result = duct::cmd(program, args)
        .stdin_null()
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .run()
        .map_err(|err| SpecializationError::Compile {
            command: command.to_string(),
            status: None,
            output: err.to_string(),
        })?;
    let duration = started.elapsed();

    let output = String::from_utf8_lossy(&result.stdout).into_owned();
    trace!(%output, "compiler output");

    if !result.status.success() {
        return Err(SpecializationError::Compile {
            command: command.to_string(),
            status: result.status.code(),
            output,
        });
    }

    if !library.exists() {
        return Err(SpecializationError::Compile {
            command: command.to_string(),
            status: None,
            output,
        });
    }

    Ok(CompileOutput {
        library: library.to_path_buf(),
        output,
        duration,
    })
}
