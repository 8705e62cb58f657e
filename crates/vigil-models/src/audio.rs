//! Captured audio chunks and derived audio events.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A chunk of captured mono audio.
///
/// Samples are float in [-1.0, 1.0]. Immutable after capture.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Monotonic capture timestamp in nanoseconds (start of chunk).
    pub ts_ns: u64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Mono samples.
    pub samples: Vec<f32>,
}

impl AudioChunk {
    /// Duration of the chunk in nanoseconds.
    pub fn duration_ns(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1_000_000_000 / self.sample_rate as u64
    }
}

/// An event derived from the audio stream by the keyword spotter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioEvent {
    /// Monotonic timestamp of the chunk the keyword was heard in.
    pub ts_ns: u64,
    /// The keyword that matched (lowercased).
    pub keyword: String,
    /// Spotter confidence in [0, 1].
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_duration() {
        let chunk = AudioChunk {
            ts_ns: 0,
            sample_rate: 16_000,
            samples: vec![0.0; 16_000],
        };
        assert_eq!(chunk.duration_ns(), 1_000_000_000);
    }

    #[test]
    fn test_zero_rate_duration() {
        let chunk = AudioChunk {
            ts_ns: 0,
            sample_rate: 0,
            samples: vec![0.0; 10],
        };
        assert_eq!(chunk.duration_ns(), 0);
    }
}
