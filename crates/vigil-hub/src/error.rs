//! Error types for hub operations.

use thiserror::Error;

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Errors from the hub client, orchestrator or monitor.
#[derive(Debug, Error)]
pub enum HubError {
    /// Network failure, rate limit or 5xx. Retried with backoff.
    #[error("transient hub error: {0}")]
    Transient(String),

    /// 4xx-class rejection. Never retried.
    #[error("hub rejected the request: {0}")]
    Validation(String),

    /// An input spec carries a non-positive dimension; rejected before
    /// submission.
    #[error("dynamic shape rejected: {0}")]
    DynamicShape(String),

    #[error("unknown job: {0}")]
    UnknownJob(String),

    /// A deadline elapsed. The remote resource may still be live.
    #[error("deadline exceeded: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("artifact not available for job {0}")]
    ArtifactUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HubError {
    /// True for errors the orchestrator absorbs via backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HubError::Transient(_))
    }

    /// Map an HTTP status code to the retryable/fatal split.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || status >= 500 {
            HubError::Transient(format!("HTTP {status}: {body}"))
        } else {
            HubError::Validation(format!("HTTP {status}: {body}"))
        }
    }
}

impl From<reqwest::Error> for HubError {
    fn from(e: reqwest::Error) -> Self {
        // Connection-level failures are transient by definition.
        HubError::Transient(e.to_string())
    }
}
