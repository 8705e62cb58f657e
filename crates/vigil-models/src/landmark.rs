//! Landmarks and detector families.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which landmark topology a detector produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DetectorFamily {
    /// Full-body pose, 33 landmarks.
    Pose,
    /// Face mesh, 468 landmarks.
    FaceMesh,
    /// Single hand, 21 landmarks.
    Hand,
}

impl DetectorFamily {
    /// Number of landmarks this family produces per subject.
    pub fn landmark_count(&self) -> usize {
        match self {
            DetectorFamily::Pose => 33,
            DetectorFamily::FaceMesh => 468,
            DetectorFamily::Hand => 21,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorFamily::Pose => "pose",
            DetectorFamily::FaceMesh => "face_mesh",
            DetectorFamily::Hand => "hand",
        }
    }
}

/// A keypoint in absolute image pixels with a visibility weight.
///
/// Coordinates are float32 pixels, already converted from whatever the
/// backend emitted (some emit normalized [0,1] coordinates) and clipped to
/// the image bounds. A landmark that the backend did not emit at all is
/// represented by `None` in the sample vector, not by a zeroed point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Depth relative to the subject, when the backend provides it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    /// Visibility in [0, 1].
    pub visibility: f32,
}

impl Landmark {
    /// Create a 2D landmark.
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility: visibility.clamp(0.0, 1.0),
        }
    }

    /// Create a landmark with depth.
    pub fn with_z(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: Some(z),
            visibility: visibility.clamp(0.0, 1.0),
        }
    }

    /// Clip the coordinates to `[0, width-1] x [0, height-1]`.
    pub fn clipped(mut self, width: u32, height: u32) -> Self {
        self.x = self.x.clamp(0.0, width.saturating_sub(1) as f32);
        self.y = self.y.clamp(0.0, height.saturating_sub(1) as f32);
        self
    }
}

/// Well-known pose landmark indices (MediaPipe topology).
pub mod pose_index {
    pub const NOSE: usize = 0;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_ELBOW: usize = 13;
    pub const RIGHT_ELBOW: usize = 14;
    pub const LEFT_WRIST: usize = 15;
    pub const RIGHT_WRIST: usize = 16;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
    pub const LEFT_KNEE: usize = 25;
    pub const RIGHT_KNEE: usize = 26;
    pub const LEFT_ANKLE: usize = 27;
    pub const RIGHT_ANKLE: usize = 28;
}
