//! Frame and audio capture.
//!
//! Sources yield timestamped frames and audio chunks from a camera index
//! or a media file, via an FFmpeg child process decoding to raw pixels and
//! samples on stdout. Timestamps are monotonic and sequence numbers
//! strictly increasing; EOF and device loss are distinct error kinds.

pub mod capture;
pub mod config;
pub mod error;
pub mod keyword;
pub mod scripted;

pub use capture::{open, AudioCapture, FrameCapture, MediaSource};
pub use config::SourceConfig;
pub use error::{SourceError, SourceResult};
pub use keyword::{KeywordSpotter, KeywordSpotterConfig, TranscriberSpotter};
pub use scripted::ScriptedSource;

use vigil_models::{AudioChunk, Frame};

/// One item produced by a media source.
#[derive(Debug, Clone)]
pub enum MediaEvent {
    Frame(Frame),
    Audio(AudioChunk),
}
