//! Source configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for opening a media source.
///
/// Exactly one of `camera_index` and `file` must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SourceConfig {
    /// Camera device index (`/dev/video<N>` on Linux).
    pub camera_index: Option<u32>,
    /// Media file to read instead of a camera.
    pub file: Option<PathBuf>,
    /// Target frame rate.
    pub fps: u32,
    /// Target frame width.
    pub width: u32,
    /// Target frame height.
    pub height: u32,
    /// Whether the audio stream is captured at all.
    pub audio_enabled: bool,
    /// Audio sample rate in Hz (mono is fixed).
    pub audio_sample_rate: u32,
    /// Samples per emitted audio chunk.
    pub audio_chunk_samples: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            camera_index: Some(0),
            file: None,
            fps: 30,
            width: 640,
            height: 480,
            audio_enabled: false,
            audio_sample_rate: 16_000,
            audio_chunk_samples: 1_600,
        }
    }
}

impl SourceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            camera_index: std::env::var("VIGIL_CAMERA_INDEX")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(defaults.camera_index),
            file: std::env::var("VIGIL_SOURCE_FILE").ok().map(PathBuf::from),
            fps: std::env::var("VIGIL_SOURCE_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.fps),
            width: std::env::var("VIGIL_SOURCE_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.width),
            height: std::env::var("VIGIL_SOURCE_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.height),
            audio_enabled: std::env::var("VIGIL_AUDIO_ENABLED")
                .ok()
                .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.audio_enabled),
            audio_sample_rate: std::env::var("VIGIL_AUDIO_SAMPLE_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.audio_sample_rate),
            audio_chunk_samples: std::env::var("VIGIL_AUDIO_CHUNK_SAMPLES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.audio_chunk_samples),
        }
    }

    /// Check internal consistency before opening.
    pub fn validate(&self) -> Result<(), String> {
        if self.camera_index.is_none() && self.file.is_none() {
            return Err("neither camera_index nor file is set".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err("frame dimensions must be positive".to_string());
        }
        if self.fps == 0 {
            return Err("fps must be positive".to_string());
        }
        if self.audio_enabled && self.audio_sample_rate == 0 {
            return Err("audio_sample_rate must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(SourceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_requires_some_input() {
        let config = SourceConfig {
            camera_index: None,
            file: None,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = serde_json::from_str::<SourceConfig>(r#"{"fsp": 30}"#);
        assert!(err.is_err());
    }
}
