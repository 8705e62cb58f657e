//! Alert events emitted by the trigger stage.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::risk::AlertLevel;
use crate::subject::SubjectId;

/// What caused an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct AlertCause {
    /// Visual fall-risk detection fired.
    #[serde(default)]
    pub fall: bool,
    /// A help keyword was heard near the event.
    #[serde(default)]
    pub audio_help: bool,
}

impl AlertCause {
    pub fn fall() -> Self {
        Self {
            fall: true,
            audio_help: false,
        }
    }

    pub fn audio_help() -> Self {
        Self {
            fall: false,
            audio_help: true,
        }
    }

    pub fn both() -> Self {
        Self {
            fall: true,
            audio_help: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.fall && !self.audio_help
    }
}

/// A deduplicated alert for one subject.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AlertEvent {
    /// Monotonic timestamp of the triggering sample or audio event.
    pub ts_ns: u64,
    pub subject_id: SubjectId,
    pub cause: AlertCause,
    /// Fixed confidence table: visual+audio 0.95, visual 0.75, audio 0.60.
    pub confidence: f32,
    pub level: AlertLevel,
    pub message: String,
}

impl AlertEvent {
    /// Human-readable message for a cause combination.
    pub fn message_for(cause: AlertCause) -> String {
        match (cause.fall, cause.audio_help) {
            (true, true) => "EMERGENCY: fall detected and help requested".to_string(),
            (true, false) => "ALERT: potential fall detected".to_string(),
            (false, true) => "ALERT: help request heard".to_string(),
            (false, false) => "no alert".to_string(),
        }
    }
}

/// Durable NDJSON representation of an alert (one object per line).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AlertRecord {
    /// Wall-clock time the alert was written.
    pub ts: DateTime<Utc>,
    pub subject_id: SubjectId,
    pub level: AlertLevel,
    pub cause: AlertCause,
    pub message: String,
}

impl AlertRecord {
    pub fn from_event(event: &AlertEvent) -> Self {
        Self {
            ts: Utc::now(),
            subject_id: event.subject_id.clone(),
            level: event.level,
            cause: event.cause,
            message: event.message.clone(),
        }
    }
}
