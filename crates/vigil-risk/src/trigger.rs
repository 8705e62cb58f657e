//! Alert debouncing, promotion and the bounded alert ring.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info};

use vigil_models::{AlertCause, AlertEvent, AlertLevel, AudioEvent, RiskAssessment, SubjectId};

/// Trigger configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TriggerConfig {
    /// Per-subject cooldown between fresh alerts, in milliseconds.
    pub cooldown_ms: u64,
    /// Fall-risk score at which the visual fall cause fires.
    pub fall_score_threshold: f32,
    /// Bounded in-memory alert history.
    pub ring_capacity: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 3_000,
            fall_score_threshold: 0.7,
            ring_capacity: 100,
        }
    }
}

/// Fixed confidence table for cause combinations.
fn confidence_for(cause: AlertCause) -> f32 {
    match (cause.fall, cause.audio_help) {
        (true, true) => 0.95,
        (true, false) => 0.75,
        (false, true) => 0.60,
        (false, false) => 0.0,
    }
}

/// What the trigger decided for one assessment.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// A fresh alert: forwarded to the sink, cooldown starts.
    Alert(AlertEvent),
    /// A more severe condition inside the cooldown window: the active
    /// alert's level is raised without resetting the cooldown. Not
    /// forwarded as a new alert.
    Promoted(AlertEvent),
    /// A would-be alert suppressed by the cooldown.
    Suppressed,
    /// Nothing alert-worthy.
    Quiet,
}

#[derive(Debug, Clone, Copy)]
struct ActiveAlert {
    ts_ns: u64,
    level: AlertLevel,
}

/// Debounces alerts per subject.
pub struct AlertTrigger {
    config: TriggerConfig,
    active: HashMap<SubjectId, ActiveAlert>,
    ring: VecDeque<AlertEvent>,
}

impl AlertTrigger {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            active: HashMap::new(),
            ring: VecDeque::new(),
        }
    }

    /// Decide whether an assessment (plus any fused audio event) alerts.
    pub fn evaluate(
        &mut self,
        assessment: &RiskAssessment,
        audio: Option<&AudioEvent>,
    ) -> TriggerOutcome {
        let cause = AlertCause {
            fall: assessment.fall_risk_score >= self.config.fall_score_threshold,
            audio_help: audio.is_some(),
        };
        if cause.is_empty() {
            return TriggerOutcome::Quiet;
        }

        let event = AlertEvent {
            ts_ns: assessment.ts_ns,
            subject_id: assessment.subject_id.clone(),
            cause,
            confidence: confidence_for(cause),
            level: assessment.alert_level,
            message: AlertEvent::message_for(cause),
        };

        let cooldown_ns = self.config.cooldown_ms * 1_000_000;
        match self.active.get_mut(&assessment.subject_id) {
            Some(active) if assessment.ts_ns < active.ts_ns + cooldown_ns => {
                if event.level > active.level {
                    // Severity promotion keeps the original cooldown.
                    active.level = event.level;
                    info!(
                        subject = %event.subject_id,
                        level = event.level.as_str(),
                        "promoting active alert"
                    );
                    self.push_ring(event.clone());
                    TriggerOutcome::Promoted(event)
                } else {
                    debug!(subject = %event.subject_id, "alert suppressed by cooldown");
                    TriggerOutcome::Suppressed
                }
            }
            _ => {
                self.active.insert(
                    assessment.subject_id.clone(),
                    ActiveAlert {
                        ts_ns: assessment.ts_ns,
                        level: event.level,
                    },
                );
                info!(
                    subject = %event.subject_id,
                    level = event.level.as_str(),
                    confidence = event.confidence,
                    "alert triggered"
                );
                self.push_ring(event.clone());
                TriggerOutcome::Alert(event)
            }
        }
    }

    /// Spec-surface convenience: does this assessment alert at all?
    pub fn should_trigger(
        &mut self,
        assessment: &RiskAssessment,
        audio: Option<&AudioEvent>,
    ) -> bool {
        matches!(
            self.evaluate(assessment, audio),
            TriggerOutcome::Alert(_) | TriggerOutcome::Promoted(_)
        )
    }

    fn push_ring(&mut self, event: AlertEvent) {
        self.ring.push_back(event);
        while self.ring.len() > self.config.ring_capacity {
            self.ring.pop_front();
        }
    }

    /// Most recent alerts, oldest first.
    pub fn recent_alerts(&self, n: usize) -> Vec<AlertEvent> {
        self.ring.iter().rev().take(n).rev().cloned().collect()
    }

    pub fn ring_len(&self) -> usize {
        self.ring.len()
    }

    /// Level of the subject's active alert, if any.
    pub fn active_level(&self, subject_id: &SubjectId) -> Option<AlertLevel> {
        self.active.get(subject_id).map(|a| a.level)
    }
}
