use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use doping_template::{ParameterError, RenderError};
use thiserror::Error;

/// Everything that can stop a loop from being specialized.
///
/// None of these are fatal for the caller: the policy engine logs them and
/// lets the baseline loop continue.
#[derive(Debug, Error)]
pub enum SpecializationError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("invalid loop parameters: {0}")]
    InvalidParameters(#[from] ParameterError),
    #[error("failed to {action} {}: {source}", path.display())]
    FileIo {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("compiler command `{command}` {}:\n{output}", describe_status(status))]
    Compile {
        command: String,
        status: Option<i32>,
        output: String,
    },
    #[error("failed to link {}: {message}", path.display())]
    Link { path: PathBuf, message: String },
    #[error("specialized function has not been compiled and linked")]
    NotLinked,
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exited with status {code}"),
        None => "did not produce a library".to_string(),
    }
}

impl SpecializationError {
    pub fn file_io(action: &'static str, path: &Path, source: io::Error) -> Self {
        SpecializationError::FileIo {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn link(path: &Path, message: impl Into<String>) -> Self {
        SpecializationError::Link {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SpecializationError::Render(RenderError::TagParse { .. }) => ErrorKind::TagParse,
            SpecializationError::Render(RenderError::MissingContextKey { .. }) => {
                ErrorKind::MissingContextKey
            }
            SpecializationError::InvalidParameters(_) => ErrorKind::InvalidParameters,
            SpecializationError::FileIo { .. } => ErrorKind::FileIo,
            SpecializationError::Compile { .. } => ErrorKind::Compile,
            SpecializationError::Link { .. } => ErrorKind::Link,
            SpecializationError::NotLinked => ErrorKind::NotLinked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TagParse,
    MissingContextKey,
    InvalidParameters,
    FileIo,
    Compile,
    Link,
    NotLinked,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::TagParse => "TagParseError",
            ErrorKind::MissingContextKey => "MissingContextKey",
            ErrorKind::InvalidParameters => "ParameterParseError",
            ErrorKind::FileIo => "FileIOError",
            ErrorKind::Compile => "CompileError",
            ErrorKind::Link => "LinkError",
            ErrorKind::NotLinked => "NotLinkedError",
        };
        f.write_str(name)
    }
}
