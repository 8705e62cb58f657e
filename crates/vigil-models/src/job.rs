//! Cloud optimization jobs and their state machine.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Server-assigned job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of remote work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Compile,
    Profile,
    Link,
    Quantize,
    Inference,
}

impl JobKind {
    /// Default per-kind deadline before the monitor forces a timeout.
    pub fn default_deadline(&self) -> Duration {
        match self {
            JobKind::Compile => Duration::from_secs(20 * 60),
            JobKind::Profile => Duration::from_secs(15 * 60),
            JobKind::Link => Duration::from_secs(10 * 60),
            JobKind::Quantize => Duration::from_secs(15 * 60),
            JobKind::Inference => Duration::from_secs(10 * 60),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Compile => "compile",
            JobKind::Profile => "profile",
            JobKind::Link => "link",
            JobKind::Quantize => "quantize",
            JobKind::Inference => "inference",
        }
    }
}

/// Job state. Terminal states are latched: once entered, a job never
/// leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
    Rejected,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed
                | JobState::Failed
                | JobState::Timeout
                | JobState::Cancelled
                | JobState::Rejected
        )
    }

    /// Estimated percent complete when the server does not report one.
    pub fn progress_estimate(&self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Queued => 10,
            JobState::Running => 50,
            _ => 100,
        }
    }

    /// Normalize a raw server status string.
    ///
    /// Matching is case-insensitive and treats `_` and space alike.
    /// Returns `None` for strings the table does not know; callers keep
    /// the previous state and log a warning.
    pub fn parse_server_status(raw: &str) -> Option<Self> {
        let norm = raw.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match norm.as_str() {
            "COMPLETED" | "SUCCESS" | "SUCCEEDED" | "FINISHED" | "RESULTS_READY"
            | "COMPLETED_SUCCESSFULLY" | "DONE" => Some(JobState::Completed),
            "FAILED" | "ERROR" | "FAILURE" => Some(JobState::Failed),
            "TIMEOUT" | "TIMED_OUT" => Some(JobState::Timeout),
            "CANCELLED" | "CANCELED" => Some(JobState::Cancelled),
            "REJECTED" => Some(JobState::Rejected),
            "RUNNING" | "IN_PROGRESS" | "COMPILING" | "PROFILING" | "LINKING" | "QUANTIZING"
            | "OPTIMIZING_MODEL" => Some(JobState::Running),
            "QUEUED" | "WAITING" | "CREATED" => Some(JobState::Queued),
            "PENDING" | "SUBMITTED" => Some(JobState::Pending),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Timeout => "timeout",
            JobState::Cancelled => "cancelled",
            JobState::Rejected => "rejected",
        }
    }
}

/// Structured failure attached to a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobError {
    /// User-visible reason, extracted from the first non-empty ranked
    /// field of the server payload.
    pub message: String,
    /// Raw server payload, preserved for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

/// A unit of remote work on the optimization service.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CloudJob {
    pub id: JobId,
    pub kind: JobKind,
    /// Remote id of the model the job operates on.
    pub model_ref: String,
    /// Descriptor of the target device, as reported by the service.
    pub device: String,
    pub submitted_at: DateTime<Utc>,
    /// Seconds after submission at which the monitor forces a timeout.
    pub deadline_secs: u64,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<JobError>,
    /// Percent complete, server-reported or estimated.
    pub progress: u8,
}

impl CloudJob {
    pub fn new(id: JobId, kind: JobKind, model_ref: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            model_ref: model_ref.into(),
            device: device.into(),
            submitted_at: Utc::now(),
            deadline_secs: kind.default_deadline().as_secs(),
            state: JobState::Pending,
            last_error: None,
            progress: 0,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_secs = deadline.as_secs();
        self
    }

    /// Apply a state transition, latching terminal states.
    ///
    /// Returns `true` when the state actually changed.
    pub fn transition(&mut self, next: JobState) -> bool {
        if self.state.is_terminal() {
            if next != self.state {
                warn!(
                    job_id = %self.id,
                    from = self.state.as_str(),
                    to = next.as_str(),
                    "ignoring transition out of terminal state"
                );
            }
            return false;
        }
        if next == self.state {
            return false;
        }
        self.state = next;
        self.progress = self.progress.max(next.progress_estimate());
        true
    }

    /// Record a failure reason without changing state.
    pub fn set_error(&mut self, message: impl Into<String>, raw: Option<serde_json::Value>) {
        self.last_error = Some(JobError {
            message: message.into(),
            raw,
        });
    }

    /// Deadline as a `Duration` from submission.
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}
