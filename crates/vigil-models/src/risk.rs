//! Risk assessment results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::subject::SubjectId;

/// Alert severity ladder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl AlertLevel {
    /// The next level up; `Critical` saturates.
    pub fn promoted(&self) -> Self {
        match self {
            AlertLevel::None => AlertLevel::Low,
            AlertLevel::Low => AlertLevel::Medium,
            AlertLevel::Medium => AlertLevel::High,
            AlertLevel::High => AlertLevel::Critical,
            AlertLevel::Critical => AlertLevel::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Low => "low",
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
            AlertLevel::Critical => "critical",
        }
    }
}

/// Direction of the recent stability trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StabilityTrend {
    Improving,
    #[default]
    Stable,
    Declining,
}

/// Output of the fusion & risk engine for one subject at one instant.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RiskAssessment {
    pub subject_id: SubjectId,
    /// Monotonic timestamp of the sample that produced this assessment.
    pub ts_ns: u64,
    /// Weighted fall-risk score in [0, 1].
    pub fall_risk_score: f32,
    pub alert_level: AlertLevel,
    pub stability_trend: StabilityTrend,
    /// Slow EMA of stability decline, in [0, 1].
    pub fatigue: f32,
    /// Free-form care recommendations, worst findings first.
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion_ladder() {
        assert_eq!(AlertLevel::None.promoted(), AlertLevel::Low);
        assert_eq!(AlertLevel::Medium.promoted(), AlertLevel::High);
        assert_eq!(AlertLevel::Critical.promoted(), AlertLevel::Critical);
    }

    #[test]
    fn test_level_ordering() {
        assert!(AlertLevel::Critical > AlertLevel::High);
        assert!(AlertLevel::Low > AlertLevel::None);
    }
}
