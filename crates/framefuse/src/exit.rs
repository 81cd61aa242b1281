use std::fmt;
use std::io;

use framefuse_frame::FrameError;
use framefuse_pipeline::PipelineError;
use framefuse_source::SourceError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const SOURCE_ERROR: i32 = 3;
pub const NOT_FOUND: i32 = 4;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const UNSUPPORTED: i32 = 69;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn source_error(context: &str, err: SourceError) -> CliError {
    match err {
        SourceError::ConnectionFailed { ref source, .. }
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        SourceError::NoLinkAvailable { .. } => {
            CliError::new(NOT_FOUND, format!("{context}: {err}"))
        }
        SourceError::NotImplemented { .. } => {
            CliError::new(UNSUPPORTED, format!("{context}: {err}"))
        }
        SourceError::Io(source) => io_error(context, source),
        other => CliError::new(SOURCE_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn pipeline_error(context: &str, err: PipelineError) -> CliError {
    match err {
        PipelineError::Source(err) => source_error(context, err),
        PipelineError::Frame(err) => frame_error(context, err),
        PipelineError::DuplicateChannel(_) | PipelineError::UnknownChannel(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        PipelineError::NotImplemented => CliError::new(UNSUPPORTED, format!("{context}: {err}")),
        PipelineError::Combine(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
