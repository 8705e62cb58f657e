//! Shared data models for the Vigil pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Captured frames and audio chunks
//! - Landmarks, pose samples and detector families
//! - Risk assessments and alert events
//! - Registered subjects and their persisted records
//! - Model artifacts and cloud optimization jobs

pub mod alert;
pub mod artifact;
pub mod audio;
pub mod frame;
pub mod job;
pub mod landmark;
pub mod pose;
pub mod rect;
pub mod risk;
pub mod subject;

// Re-export common types
pub use alert::{AlertCause, AlertEvent, AlertRecord};
pub use artifact::{Dtype, InputSpec, ModelArtifact, ModelFormat, QuantizationHint, TensorSpec};
pub use audio::{AudioChunk, AudioEvent};
pub use frame::{Frame, PixelLayout};
pub use job::{CloudJob, JobError, JobId, JobKind, JobState};
pub use landmark::{DetectorFamily, Landmark};
pub use pose::{PoseSample, SampleError};
pub use rect::BoundingBox;
pub use risk::{AlertLevel, RiskAssessment, StabilityTrend};
pub use subject::{Subject, SubjectId, EMBEDDING_DIM};
