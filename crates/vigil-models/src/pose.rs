//! Pose samples held in the risk engine's per-subject history.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::landmark::{DetectorFamily, Landmark};
use crate::rect::BoundingBox;
use crate::subject::SubjectId;

/// Errors constructing a pose sample.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("landmark count {got} does not match {family:?} ({want})")]
    LandmarkCount {
        family: DetectorFamily,
        want: usize,
        got: usize,
    },
}

/// One analyzed detection, tagged with the subject it belongs to.
///
/// The landmark vector always has exactly `family.landmark_count()` slots;
/// a slot is `None` when the backend emitted nothing for that index
/// (missing, as opposed to present-but-low-visibility).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PoseSample {
    /// Monotonic timestamp in nanoseconds.
    pub ts_ns: u64,
    /// Subject the sample was attributed to.
    pub subject_id: SubjectId,
    /// Landmark family of the producing detector.
    pub family: DetectorFamily,
    /// Landmarks in absolute pixels, fixed length per family.
    pub landmarks: Vec<Option<Landmark>>,
    /// Bounding box of the subject in the frame.
    pub bbox: BoundingBox,
    /// Interior joint angles in degrees, keyed by joint name.
    #[serde(default)]
    pub joint_angles: HashMap<String, f32>,
    /// Horizontal hip stability over stance width, in [0, 1].
    #[serde(default)]
    pub balance_score: f32,
    /// Inverse torso-angle variance over the recent window, in [0, 1].
    #[serde(default)]
    pub stability_score: f32,
    /// Torso lean from vertical: 0 upright, 1 horizontal.
    #[serde(default)]
    pub posture_deviation: f32,
    /// Movement magnitude since the previous sample, in [0, 1].
    #[serde(default)]
    pub activity_level: f32,
}

impl PoseSample {
    /// Create a sample, rejecting landmark vectors of the wrong length.
    pub fn new(
        ts_ns: u64,
        subject_id: SubjectId,
        family: DetectorFamily,
        landmarks: Vec<Option<Landmark>>,
        bbox: BoundingBox,
    ) -> Result<Self, SampleError> {
        let want = family.landmark_count();
        if landmarks.len() != want {
            return Err(SampleError::LandmarkCount {
                family,
                want,
                got: landmarks.len(),
            });
        }
        Ok(Self {
            ts_ns,
            subject_id,
            family,
            landmarks,
            bbox,
            joint_angles: HashMap::new(),
            balance_score: 0.0,
            stability_score: 0.0,
            posture_deviation: 0.0,
            activity_level: 0.0,
        })
    }

    /// Landmark at `index` if present.
    pub fn landmark(&self, index: usize) -> Option<Landmark> {
        self.landmarks.get(index).copied().flatten()
    }

    /// Number of landmarks actually present (not missing).
    pub fn present_count(&self) -> usize {
        self.landmarks.iter().filter(|l| l.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_landmarks(n: usize) -> Vec<Option<Landmark>> {
        vec![Some(Landmark::new(1.0, 2.0, 0.9)); n]
    }

    #[test]
    fn test_count_enforced_per_family() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let id = SubjectId::from("s1");
        assert!(PoseSample::new(0, id.clone(), DetectorFamily::Pose, full_landmarks(33), bbox).is_ok());
        let err = PoseSample::new(0, id, DetectorFamily::Pose, full_landmarks(21), bbox).unwrap_err();
        assert_eq!(
            err,
            SampleError::LandmarkCount {
                family: DetectorFamily::Pose,
                want: 33,
                got: 21
            }
        );
    }

    #[test]
    fn test_missing_landmark_access() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let mut lms = full_landmarks(33);
        lms[5] = None;
        let sample =
            PoseSample::new(0, SubjectId::from("s1"), DetectorFamily::Pose, lms, bbox).unwrap();
        assert!(sample.landmark(5).is_none());
        assert_eq!(sample.present_count(), 32);
    }
}
