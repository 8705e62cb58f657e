//! Error types for detection.

use thiserror::Error;

/// Result type for detector operations.
pub type DetectResult<T> = Result<T, DetectError>;

/// Errors that can occur selecting or running a detector backend.
#[derive(Debug, Error)]
pub enum DetectError {
    /// No registered backend satisfies the capability request, and the
    /// generic CPU fallback is missing too. Fatal for the pipeline.
    #[error("no backend satisfies the request")]
    NoBackend,

    /// Frame rejected at the boundary (wrong layout, zero-sized, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backend itself failed during inference.
    #[error("backend '{backend}' failed: {message}")]
    BackendFailed { backend: String, message: String },

    /// Detect was called after `close()`.
    #[error("detector is closed")]
    Closed,
}

impl DetectError {
    pub fn backend_failed(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendFailed {
            backend: backend.into(),
            message: message.into(),
        }
    }
}
