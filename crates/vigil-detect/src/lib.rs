//! Detector backends, selection and coordinate handling.
//!
//! A `Detector` runs one inference over a frame and returns subjects with
//! landmarks in absolute image pixels. The registry enumerates backends
//! per platform, picks the best match for a capability request, and
//! provides the fallback chain used when a backend stops detecting.

pub mod backend;
pub mod backends;
pub mod detector;
pub mod error;
pub mod fallback;
pub mod letterbox;
pub mod platform;
pub mod registry;

pub use backend::{BackendClass, BackendDescriptor, Capabilities, LatencyClass};
pub use backends::heuristic::HeuristicPoseBackend;
pub use backends::scripted::ScriptedBackend;
pub use detector::{
    DetectedSubject, DetectionResult, Detector, DetectorConfig, DetectorStage, RawCoords,
    RawLandmark, RawOutput, RawSubject,
};
pub use error::{DetectError, DetectResult};
pub use fallback::{FallbackAction, FallbackController};
pub use letterbox::Letterbox;
pub use platform::{detect_platform, PlatformTag};
pub use registry::{BackendFactory, BackendRegistry};
