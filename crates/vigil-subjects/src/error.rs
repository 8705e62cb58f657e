//! Error types for the subject registry.

use thiserror::Error;

/// Result type for subject operations.
pub type SubjectsResult<T> = Result<T, SubjectsError>;

/// Errors from registration, identification or the store.
#[derive(Debug, Error)]
pub enum SubjectsError {
    /// No face was found in the provided image.
    #[error("no face detected in image")]
    NoFace,

    #[error("unknown subject: {0}")]
    UnknownSubject(String),

    /// The store file carries a schema version this build cannot read.
    #[error("unsupported store schema version {0}")]
    UnsupportedSchema(u32),

    #[error("embedding has wrong dimension: {0}")]
    BadEmbedding(usize),

    #[error("store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("face detection failed: {0}")]
    Detection(#[from] vigil_detect::DetectError),
}
