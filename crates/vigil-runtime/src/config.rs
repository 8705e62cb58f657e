//! Runtime configuration.

use serde::{Deserialize, Serialize};

use vigil_detect::DetectorConfig;
use vigil_risk::{RiskConfig, TriggerConfig};

/// Top-level configuration of the detection runtime.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct RuntimeConfig {
    /// Fixed fusion worker pool size; subjects hash onto workers.
    pub fusion_workers: usize,
    /// Frame channel capacity between capture and detection.
    pub frame_channel_capacity: usize,
    /// Alert sink capacity.
    pub alert_channel_capacity: usize,
    /// Seconds without any capture event before the source is declared
    /// lost.
    pub source_stall_timeout_secs: u64,
    pub detector: DetectorConfig,
    pub risk: RiskConfig,
    pub trigger: TriggerConfig,
}

impl RuntimeConfig {
    pub fn normalized(mut self) -> Self {
        if self.fusion_workers == 0 {
            self.fusion_workers = 4;
        }
        if self.frame_channel_capacity == 0 {
            self.frame_channel_capacity = 2;
        }
        if self.alert_channel_capacity == 0 {
            self.alert_channel_capacity = 100;
        }
        if self.source_stall_timeout_secs == 0 {
            self.source_stall_timeout_secs = 10;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_defaults() {
        let config = RuntimeConfig::default().normalized();
        assert_eq!(config.fusion_workers, 4);
        assert_eq!(config.frame_channel_capacity, 2);
        assert_eq!(config.alert_channel_capacity, 100);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(serde_json::from_str::<RuntimeConfig>(r#"{"fusion_wrokers": 2}"#).is_err());
    }
}
