//! Scripted in-memory source for tests and replay.

use std::collections::VecDeque;

use vigil_models::{AudioChunk, Frame, PixelLayout};

use crate::error::{SourceError, SourceResult};
use crate::MediaEvent;

/// A source that replays a fixed sequence of events, then reports EOF.
///
/// Used throughout the test suites in place of live capture.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    events: VecDeque<MediaEvent>,
}

impl ScriptedSource {
    pub fn new(events: impl IntoIterator<Item = MediaEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }

    /// Append a synthetic gray frame.
    pub fn push_frame(&mut self, ts_ns: u64, seq: u64, width: u32, height: u32) {
        let data = vec![128u8; width as usize * height as usize * 3];
        let frame = Frame::new(ts_ns, seq, PixelLayout::Rgb8, width, height, data)
            .expect("scripted frame dimensions");
        self.events.push_back(MediaEvent::Frame(frame));
    }

    /// Append an audio chunk of constant amplitude.
    pub fn push_audio(&mut self, ts_ns: u64, sample_rate: u32, amplitude: f32, samples: usize) {
        self.events.push_back(MediaEvent::Audio(AudioChunk {
            ts_ns,
            sample_rate,
            samples: vec![amplitude; samples],
        }));
    }

    /// Next scripted event, or `Eof` when exhausted.
    ///
    /// Yields to the scheduler between events so replay paces like a
    /// real capture loop instead of monopolizing the task.
    pub async fn next(&mut self) -> SourceResult<MediaEvent> {
        tokio::task::yield_now().await;
        self.events.pop_front().ok_or(SourceError::Eof)
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}
