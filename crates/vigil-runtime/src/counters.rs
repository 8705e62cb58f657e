//! Pipeline health counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared monotonic counters; one instance per pipeline.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub frames_in: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub bad_frames: AtomicU64,
    pub detector_failures: AtomicU64,
    pub samples_scored: AtomicU64,
    pub alerts_emitted: AtomicU64,
    pub alerts_dropped: AtomicU64,
    pub audio_events: AtomicU64,
}

impl PipelineCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
