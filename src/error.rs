use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Client-caused rejection of a conversion request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing file name or file data.")]
    MissingFields,

    #[error("Please choose a file with the .{expected} extension.")]
    WrongExtension { expected: &'static str },

    #[error("File data is not valid Base64.")]
    InvalidEncoding,

    #[error("Uploaded file content is empty.")]
    EmptyPayload,

    #[error("File exceeds {limit_mb}MB and cannot be processed.")]
    TooLarge { limit_mb: usize },

    #[error("File content is not a valid .{expected} container.")]
    ContainerMismatch { expected: &'static str },
}

/// Main error type for a conversion request
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Transcoder binary (ffmpeg) not found")]
    ToolUnavailable,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to start transcoder: {0}")]
    Spawn(std::io::Error),

    #[error("Transcoder exited with {status}: {stderr}")]
    ConversionFailed { status: ExitStatus, stderr: String },

    #[error("Transcoder did not finish within {0:?}")]
    ConversionTimedOut(Duration),

    #[error("Transcoder produced an empty output file")]
    EmptyOutput,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// True for failures of the external tool itself, as opposed to local I/O.
    pub fn is_transcoder_failure(&self) -> bool {
        matches!(
            self,
            ConvertError::Spawn(_)
                | ConvertError::ConversionFailed { .. }
                | ConvertError::ConversionTimedOut(_)
                | ConvertError::EmptyOutput
        )
    }
}

/// Startup errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ServerError>;
