//! Error types for capture operations.

use thiserror::Error;

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors that can occur while capturing frames or audio.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The stream ended normally (file fully read, device closed cleanly).
    #[error("end of stream")]
    Eof,

    /// The capture device disappeared mid-stream. Retryable: the caller
    /// may reopen the source.
    #[error("capture device lost: {0}")]
    DeviceLost(String),

    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("invalid source configuration: {0}")]
    InvalidConfig(String),

    #[error("transcriber command failed: {0}")]
    TranscriberFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    /// True for errors a supervisor may recover from by reopening.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::DeviceLost(_))
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, SourceError::Eof)
    }
}
