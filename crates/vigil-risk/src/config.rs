//! Risk engine configuration.

use serde::{Deserialize, Serialize};

/// Weights of the fall-risk score terms. They should sum to 1.0; the
/// score is clipped to [0, 1] regardless.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RiskWeights {
    pub posture_deviation: f32,
    pub balance: f32,
    pub stability: f32,
    pub fatigue: f32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            posture_deviation: 0.4,
            balance: 0.3,
            stability: 0.2,
            fatigue: 0.1,
        }
    }
}

/// Alert-level threshold table over the fall-risk score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RiskThresholds {
    /// Below this: low. At or above: medium.
    pub medium: f32,
    pub high: f32,
    pub critical: f32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            medium: 0.3,
            high: 0.7,
            critical: 0.9,
        }
    }
}

/// A named joint triple: the interior angle is measured at `mid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JointTriple {
    pub name: String,
    pub first: usize,
    pub mid: usize,
    pub last: usize,
}

/// Configuration for the fusion & risk engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RiskConfig {
    pub weights: RiskWeights,
    pub thresholds: RiskThresholds,
    /// Joint triples to measure per sample.
    pub joint_triples: Vec<JointTriple>,
    /// Torso-angle window for the stability variance (samples).
    pub stability_window: usize,
    /// Torso-angle variance (deg^2) that maps to stability 0.
    pub stability_variance_ref: f32,
    /// Torso angle (degrees from vertical) treated as fully horizontal.
    pub posture_full_deviation_deg: f32,
    /// Per-subject history bound, in samples.
    pub max_history_samples: usize,
    /// Per-subject history bound, in seconds.
    pub max_history_secs: u64,
    /// Samples older than the newest seen by more than this are dropped.
    pub reorder_tolerance_ms: u64,
    /// Fusion window around a sample for audio events, in seconds.
    pub audio_window_secs: u64,
    /// Fatigue EMA horizon in seconds.
    pub fatigue_window_secs: u64,
    /// Stability-trend delta below which the trend reads stable.
    pub trend_epsilon: f32,
}

impl Default for RiskConfig {
    fn default() -> Self {
        use vigil_models::landmark::pose_index as pi;
        Self {
            weights: RiskWeights::default(),
            thresholds: RiskThresholds::default(),
            joint_triples: vec![
                JointTriple {
                    name: "left_knee".to_string(),
                    first: pi::LEFT_HIP,
                    mid: pi::LEFT_KNEE,
                    last: pi::LEFT_ANKLE,
                },
                JointTriple {
                    name: "right_knee".to_string(),
                    first: pi::RIGHT_HIP,
                    mid: pi::RIGHT_KNEE,
                    last: pi::RIGHT_ANKLE,
                },
                JointTriple {
                    name: "left_hip".to_string(),
                    first: pi::LEFT_SHOULDER,
                    mid: pi::LEFT_HIP,
                    last: pi::LEFT_KNEE,
                },
                JointTriple {
                    name: "right_hip".to_string(),
                    first: pi::RIGHT_SHOULDER,
                    mid: pi::RIGHT_HIP,
                    last: pi::RIGHT_KNEE,
                },
                JointTriple {
                    name: "left_elbow".to_string(),
                    first: pi::LEFT_SHOULDER,
                    mid: pi::LEFT_ELBOW,
                    last: pi::LEFT_WRIST,
                },
                JointTriple {
                    name: "right_elbow".to_string(),
                    first: pi::RIGHT_SHOULDER,
                    mid: pi::RIGHT_ELBOW,
                    last: pi::RIGHT_WRIST,
                },
            ],
            stability_window: 15,
            stability_variance_ref: 400.0,
            posture_full_deviation_deg: 80.0,
            max_history_samples: 1000,
            max_history_secs: 300,
            reorder_tolerance_ms: 200,
            audio_window_secs: 5,
            fatigue_window_secs: 60,
            trend_epsilon: 0.05,
        }
    }
}
