//! Per-subject fusion & risk scoring.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, trace};

use vigil_models::{AlertLevel, AudioEvent, PoseSample, RiskAssessment, StabilityTrend, SubjectId};

use crate::angles::compute_joint_angles;
use crate::config::RiskConfig;
use crate::scores::{
    activity_level, balance_score, posture_deviation, stability_from_variance, torso_angle_deg,
    FatigueEma,
};

/// Outcome of ingesting one sample.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Sample accepted; assessment produced, with any audio event that
    /// fused into it.
    Scored {
        assessment: RiskAssessment,
        fused_audio: Option<AudioEvent>,
    },
    /// Sample was older than the reorder tolerance and was dropped.
    DroppedOutOfOrder,
}

/// Per-subject mutable state. Owned by exactly one fusion worker.
#[derive(Debug, Default)]
struct SubjectState {
    ring: VecDeque<PoseSample>,
    /// Torso angles of the ring samples that had one.
    torso_angles: VecDeque<f32>,
    /// Stability history for the trend computation.
    stability_history: VecDeque<f32>,
    fatigue: FatigueEma,
    newest_ts_ns: u64,
    /// Carried sub-scores for frames with missing anchor landmarks.
    last_posture: f32,
    last_balance: f32,
}

/// The fusion & risk engine.
///
/// Not internally synchronized: the runtime shards subjects across a
/// fixed worker pool, and each worker owns one engine instance.
pub struct RiskEngine {
    config: RiskConfig,
    subjects: HashMap<SubjectId, SubjectState>,
    /// Ambient audio events, fused into any subject's nearby samples.
    audio_events: VecDeque<AudioEvent>,
    dropped_out_of_order: u64,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            subjects: HashMap::new(),
            audio_events: VecDeque::new(),
            dropped_out_of_order: 0,
        }
    }

    /// Record an ambient audio event for later fusion.
    pub fn ingest_audio(&mut self, event: AudioEvent) {
        debug!(keyword = %event.keyword, ts_ns = event.ts_ns, "audio event received");
        self.audio_events.push_back(event);
        // Drop events too old to ever fuse again.
        let horizon = self.config.audio_window_secs * 2 * 1_000_000_000;
        let newest = self.audio_events.back().map(|e| e.ts_ns).unwrap_or(0);
        while let Some(front) = self.audio_events.front() {
            if front.ts_ns + horizon < newest {
                self.audio_events.pop_front();
            } else {
                break;
            }
        }
    }

    /// Ingest one pose sample and score it.
    pub fn ingest(&mut self, mut sample: PoseSample) -> IngestOutcome {
        let state = self.subjects.entry(sample.subject_id.clone()).or_default();

        // Out-of-order policy: older than the newest seen by more than
        // the tolerance is dropped.
        let tolerance_ns = self.config.reorder_tolerance_ms * 1_000_000;
        if state.newest_ts_ns > 0 && sample.ts_ns + tolerance_ns < state.newest_ts_ns {
            self.dropped_out_of_order += 1;
            trace!(
                subject = %sample.subject_id,
                ts_ns = sample.ts_ns,
                newest = state.newest_ts_ns,
                "dropping out-of-order sample"
            );
            return IngestOutcome::DroppedOutOfOrder;
        }
        state.newest_ts_ns = state.newest_ts_ns.max(sample.ts_ns);

        // Step 1: joint angles.
        sample.joint_angles = compute_joint_angles(&sample, &self.config.joint_triples);

        // Steps 2-4: sub-scores, carrying the previous value when anchor
        // landmarks are missing from this frame.
        let posture = posture_deviation(&sample, self.config.posture_full_deviation_deg)
            .unwrap_or(state.last_posture);
        let balance = balance_score(&sample).unwrap_or(state.last_balance);
        state.last_posture = posture;
        state.last_balance = balance;

        if let Some(angle) = torso_angle_deg(&sample) {
            state.torso_angles.push_back(angle);
            while state.torso_angles.len() > self.config.stability_window {
                state.torso_angles.pop_front();
            }
        }
        let stability = stability_from_variance(
            state.torso_angles.make_contiguous(),
            self.config.stability_variance_ref,
        );

        // Step 5: fatigue EMA and the weighted score.
        let fatigue = state
            .fatigue
            .update(sample.ts_ns, stability, self.config.fatigue_window_secs);

        sample.posture_deviation = posture;
        sample.balance_score = balance;
        sample.stability_score = stability;
        sample.activity_level = state
            .ring
            .back()
            .map(|prev| activity_level(prev, &sample))
            .unwrap_or(0.0);

        let w = &self.config.weights;
        let score = (w.posture_deviation * posture
            + w.balance * (1.0 - balance)
            + w.stability * (1.0 - stability)
            + w.fatigue * fatigue)
            .clamp(0.0, 1.0);

        // Step 6: threshold table.
        let t = &self.config.thresholds;
        let mut level = if score >= t.critical {
            AlertLevel::Critical
        } else if score >= t.high {
            AlertLevel::High
        } else if score >= t.medium {
            AlertLevel::Medium
        } else {
            AlertLevel::Low
        };

        // Audio fusion: a keyword inside the window raises the level one
        // step.
        let fused_audio = self.take_audio_near(sample.ts_ns);
        if fused_audio.is_some() {
            level = level.promoted();
        }

        let state = self.subjects.get_mut(&sample.subject_id).expect("state exists");
        state.stability_history.push_back(stability);
        while state.stability_history.len() > self.config.stability_window * 2 {
            state.stability_history.pop_front();
        }
        let trend = trend_of(
            state.stability_history.make_contiguous(),
            self.config.trend_epsilon,
        );

        let assessment = RiskAssessment {
            subject_id: sample.subject_id.clone(),
            ts_ns: sample.ts_ns,
            fall_risk_score: score,
            alert_level: level,
            stability_trend: trend,
            fatigue,
            recommendations: recommendations(posture, trend, fatigue),
        };

        // Retain the sample under both history bounds.
        state.ring.push_back(sample);
        while state.ring.len() > self.config.max_history_samples {
            state.ring.pop_front();
        }
        let horizon_ns = self.config.max_history_secs * 1_000_000_000;
        let newest = state.newest_ts_ns;
        while let Some(front) = state.ring.front() {
            if front.ts_ns + horizon_ns < newest {
                state.ring.pop_front();
            } else {
                break;
            }
        }

        IngestOutcome::Scored {
            assessment,
            fused_audio,
        }
    }

    /// First audio event within the fusion window of `ts_ns`.
    fn take_audio_near(&self, ts_ns: u64) -> Option<AudioEvent> {
        let window_ns = self.config.audio_window_secs * 1_000_000_000;
        self.audio_events
            .iter()
            .find(|e| e.ts_ns.abs_diff(ts_ns) <= window_ns)
            .cloned()
    }

    /// History snapshot for a subject (copies, per the ownership rules).
    pub fn history(&self, subject_id: &SubjectId) -> Vec<PoseSample> {
        self.subjects
            .get(subject_id)
            .map(|s| s.ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn history_len(&self, subject_id: &SubjectId) -> usize {
        self.subjects.get(subject_id).map(|s| s.ring.len()).unwrap_or(0)
    }

    pub fn dropped_out_of_order(&self) -> u64 {
        self.dropped_out_of_order
    }
}

/// Compare the recent half of the stability history against the older
/// half.
fn trend_of(history: &[f32], epsilon: f32) -> StabilityTrend {
    if history.len() < 4 {
        return StabilityTrend::Stable;
    }
    let mid = history.len() / 2;
    let older = &history[..mid];
    let recent = &history[mid..];
    let mean = |xs: &[f32]| xs.iter().sum::<f32>() / xs.len() as f32;
    let delta = mean(recent) - mean(older);
    if delta > epsilon {
        StabilityTrend::Improving
    } else if delta < -epsilon {
        StabilityTrend::Declining
    } else {
        StabilityTrend::Stable
    }
}

fn recommendations(posture: f32, trend: StabilityTrend, fatigue: f32) -> Vec<String> {
    let mut out = Vec::new();
    if posture > 0.7 {
        out.push("check balance support immediately".to_string());
    }
    if trend == StabilityTrend::Declining {
        out.push("increase supervision; stability is declining".to_string());
    }
    if fatigue > 0.5 {
        out.push("suggest rest; sustained instability observed".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{falling_sample, tilted_sample, tilted_sample_for};

    const FRAME_NS: u64 = 33_000_000;

    fn engine() -> RiskEngine {
        RiskEngine::new(RiskConfig::default())
    }

    fn score_of(outcome: IngestOutcome) -> f32 {
        match outcome {
            IngestOutcome::Scored { assessment, .. } => assessment.fall_risk_score,
            IngestOutcome::DroppedOutOfOrder => panic!("sample dropped"),
        }
    }

    /// A standing subject stays below the medium threshold.
    #[test]
    fn test_standing_subject_low_risk() {
        let mut engine = engine();
        for i in 0..30u64 {
            let score = score_of(engine.ingest(tilted_sample(i * FRAME_NS, 2.0)));
            assert!(score < 0.3, "frame {i} scored {score}");
        }
    }

    /// Monotonically worsening posture yields a
    /// non-decreasing score.
    #[test]
    fn test_monotone_posture_monotone_risk() {
        let mut engine = engine();
        let mut last = 0.0f32;
        for i in 0..12u64 {
            let theta = 6.0 * i as f32; // 0..66 degrees
            let score = score_of(engine.ingest(tilted_sample(i * FRAME_NS, theta)));
            assert!(
                score + 1e-6 >= last,
                "score regressed at frame {i}: {score} < {last}"
            );
            last = score;
        }
        assert!(last > 0.3);
    }

    #[test]
    fn test_fall_reaches_high_level() {
        let mut engine = engine();
        let mut worst = AlertLevel::None;
        for i in 0..10u64 {
            let progress = (i + 1) as f32 / 10.0;
            if let IngestOutcome::Scored { assessment, .. } =
                engine.ingest(falling_sample(i * FRAME_NS, progress))
            {
                worst = worst.max(assessment.alert_level);
            }
        }
        assert!(worst >= AlertLevel::High, "worst level {worst:?}");
    }

    /// Out-of-order samples beyond the 200 ms tolerance are dropped.
    #[test]
    fn test_out_of_order_dropped() {
        let mut engine = engine();
        engine.ingest(tilted_sample(1_000_000_000, 0.0));
        let outcome = engine.ingest(tilted_sample(700_000_000, 0.0));
        assert!(matches!(outcome, IngestOutcome::DroppedOutOfOrder));
        assert_eq!(engine.dropped_out_of_order(), 1);
        // Within tolerance is accepted.
        let outcome = engine.ingest(tilted_sample(900_000_000, 0.0));
        assert!(matches!(outcome, IngestOutcome::Scored { .. }));
    }

    /// The history ring never exceeds the configured bound.
    #[test]
    fn test_history_bounded() {
        let mut config = RiskConfig::default();
        config.max_history_samples = 50;
        let mut engine = RiskEngine::new(config);
        for i in 0..200u64 {
            engine.ingest(tilted_sample(i * FRAME_NS, 1.0));
        }
        assert_eq!(engine.history_len(&SubjectId::from("s1")), 50);
    }

    #[test]
    fn test_duration_bound_evicts() {
        let mut config = RiskConfig::default();
        config.max_history_secs = 1;
        let mut engine = RiskEngine::new(config);
        for i in 0..90u64 {
            engine.ingest(tilted_sample(i * FRAME_NS, 1.0));
        }
        // 90 frames at 33 ms cover ~3 s; only ~1 s may remain.
        let len = engine.history_len(&SubjectId::from("s1"));
        assert!(len < 45, "len {len}");
    }

    /// Audio inside the fusion window promotes the level one step.
    #[test]
    fn test_audio_promotes_level() {
        let mut engine = engine();
        engine.ingest_audio(AudioEvent {
            ts_ns: 2_000_000_000,
            keyword: "help".to_string(),
            confidence: 0.8,
        });
        let outcome = engine.ingest(tilted_sample(3_000_000_000, 2.0));
        match outcome {
            IngestOutcome::Scored {
                assessment,
                fused_audio,
            } => {
                assert!(fused_audio.is_some());
                assert_eq!(assessment.alert_level, AlertLevel::Medium);
            }
            _ => panic!("dropped"),
        }
    }

    #[test]
    fn test_audio_outside_window_ignored() {
        let mut engine = engine();
        engine.ingest_audio(AudioEvent {
            ts_ns: 0,
            keyword: "help".to_string(),
            confidence: 0.8,
        });
        let outcome = engine.ingest(tilted_sample(20_000_000_000, 2.0));
        match outcome {
            IngestOutcome::Scored { fused_audio, .. } => assert!(fused_audio.is_none()),
            _ => panic!("dropped"),
        }
    }

    #[test]
    fn test_subjects_are_independent() {
        let mut engine = engine();
        for i in 0..20u64 {
            engine.ingest(tilted_sample_for(i * FRAME_NS, 1.0, "a"));
            engine.ingest(tilted_sample_for(i * FRAME_NS, 80.0, "b"));
        }
        assert_eq!(engine.history_len(&SubjectId::from("a")), 20);
        assert_eq!(engine.history_len(&SubjectId::from("b")), 20);
    }

    #[test]
    fn test_declining_trend_recommendation() {
        let mut engine = engine();
        let mut saw_declining = false;
        for i in 0..40u64 {
            // Growing sway: alternating tilt of rising amplitude.
            let theta = if i % 2 == 0 { 0.0 } else { (i as f32) * 1.8 };
            if let IngestOutcome::Scored { assessment, .. } =
                engine.ingest(tilted_sample(i * FRAME_NS, theta))
            {
                if assessment.stability_trend == StabilityTrend::Declining {
                    saw_declining = true;
                    assert!(assessment
                        .recommendations
                        .iter()
                        .any(|r| r.contains("supervision")));
                }
            }
        }
        assert!(saw_declining);
    }
}
