//! Error types for conversion.

use std::path::PathBuf;

use thiserror::Error;

use crate::rules::Classification;

/// Result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors from scanning, rewriting or converting models.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The external converter failed; the classification carries the
    /// matched rule, root cause and remediation.
    #[error("conversion failed ({}): {}", .0.tag.as_str(), .0.root_cause)]
    Conversion(Classification),

    #[error("converter command not found: {0}")]
    ConverterNotFound(String),

    #[error("converter timed out after {0} seconds")]
    Timeout(u64),

    /// An input spec carries a non-positive dimension.
    #[error("dynamic shape rejected: {0}")]
    DynamicShape(String),

    #[error("not a valid TFLite flatbuffer: {0}")]
    InvalidFlatbuffer(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    /// The matched rule classification, if this is a conversion failure.
    pub fn classification(&self) -> Option<&Classification> {
        match self {
            ConvertError::Conversion(c) => Some(c),
            _ => None,
        }
    }
}
