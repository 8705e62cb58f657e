//! The `Detector` contract and the detection stage wrapper.

use serde::{Deserialize, Serialize};
use tracing::trace;

use vigil_models::{BoundingBox, DetectorFamily, Frame, Landmark};

use crate::backend::BackendDescriptor;
use crate::error::{DetectError, DetectResult};
use crate::letterbox::Letterbox;

/// Coordinate space a backend reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawCoords {
    /// Pixels of the detector's native input (letterboxed space).
    InputPixels,
    /// Normalized [0,1] over the detector input.
    Normalized,
}

/// One raw landmark as emitted by a backend; `None` means the backend
/// produced nothing for that topology index.
pub type RawLandmark = Option<(f32, f32, Option<f32>, f32)>;

/// One subject as emitted by a backend, before coordinate conversion.
#[derive(Debug, Clone)]
pub struct RawSubject {
    /// Bounding box in the backend's coordinate space (x, y, w, h).
    pub bbox: (f32, f32, f32, f32),
    /// Landmarks (x, y, z?, visibility), fixed length per family.
    pub landmarks: Vec<RawLandmark>,
    pub confidence: f32,
}

/// Raw inference output.
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub subjects: Vec<RawSubject>,
    pub coords: RawCoords,
}

/// A concrete inference backend.
///
/// Backends are single-threaded and exclusively owned by one worker;
/// `infer` blocks for the duration of one inference.
pub trait Detector: Send {
    /// Run one inference over a letterboxed input buffer.
    fn infer(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
        family: DetectorFamily,
    ) -> DetectResult<RawOutput>;

    /// Native input resolution (width, height).
    fn input_size(&self) -> (u32, u32);

    /// Static descriptor (also the method tag on results).
    fn describe(&self) -> &BackendDescriptor;

    /// Release backend resources; subsequent `infer` calls fail.
    fn close(&mut self);
}

/// One detected subject in source-image coordinates.
#[derive(Debug, Clone)]
pub struct DetectedSubject {
    pub bbox: BoundingBox,
    pub family: DetectorFamily,
    /// Landmarks in absolute image pixels; `None` slots are missing.
    pub landmarks: Vec<Option<Landmark>>,
    pub confidence: f32,
}

/// Result of `DetectorStage::detect`: ordered subjects plus the method
/// tag of the backend that produced them.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub subjects: Vec<DetectedSubject>,
    pub method: String,
}

/// Stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DetectorConfig {
    /// Visibility below this floor is kept as low-confidence, never
    /// treated as missing.
    pub visibility_floor: f32,
    /// Subjects below this confidence are dropped from results.
    pub min_subject_confidence: f32,
    /// Consecutive empty frames before the fallback controller downgrades.
    pub empty_frames_before_fallback: u32,
    /// Consecutive successful detections before re-upgrading.
    pub successes_before_upgrade: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            visibility_floor: 0.001,
            min_subject_confidence: 0.2,
            empty_frames_before_fallback: 3,
            successes_before_upgrade: 30,
        }
    }
}

/// Wraps a backend with letterboxing and output normalization.
pub struct DetectorStage {
    backend: Box<dyn Detector>,
    config: DetectorConfig,
}

impl DetectorStage {
    pub fn new(backend: Box<dyn Detector>, config: DetectorConfig) -> Self {
        Self { backend, config }
    }

    /// Method tag of the wrapped backend.
    pub fn method(&self) -> String {
        self.backend.describe().name.clone()
    }

    /// Run detection over one frame.
    ///
    /// The frame is letterboxed to the backend's native input; output
    /// coordinates are mapped back to source pixels and clipped, so both
    /// normalized and pixel backends yield identical absolute positions.
    pub fn detect(&mut self, frame: &Frame, family: DetectorFamily) -> DetectResult<DetectionResult> {
        if frame.data.len() != frame.expected_len() {
            return Err(DetectError::InvalidInput(format!(
                "frame buffer {} bytes, expected {}",
                frame.data.len(),
                frame.expected_len()
            )));
        }

        let (in_w, in_h) = self.backend.input_size();
        let letterbox = Letterbox::compute(frame.width, frame.height, in_w, in_h);
        let input = letterbox.apply(frame);

        let raw = self.backend.infer(&input, in_w, in_h, family)?;
        let method = self.backend.describe().name.clone();

        let want = family.landmark_count();
        let mut subjects = Vec::with_capacity(raw.subjects.len());
        for subject in raw.subjects {
            if subject.confidence < self.config.min_subject_confidence {
                continue;
            }
            if subject.landmarks.len() != want {
                return Err(DetectError::InvalidInput(format!(
                    "backend emitted {} landmarks for {:?} (want {})",
                    subject.landmarks.len(),
                    family,
                    want
                )));
            }
            subjects.push(self.convert_subject(subject, raw.coords, &letterbox, frame, family));
        }

        trace!(
            method = %method,
            subjects = subjects.len(),
            "detection complete"
        );
        Ok(DetectionResult { subjects, method })
    }

    fn convert_subject(
        &self,
        raw: RawSubject,
        coords: RawCoords,
        letterbox: &Letterbox,
        frame: &Frame,
        family: DetectorFamily,
    ) -> DetectedSubject {
        let map = |x: f32, y: f32| match coords {
            RawCoords::InputPixels => letterbox.to_image(x, y),
            RawCoords::Normalized => letterbox.normalized_to_image(x, y),
        };

        let landmarks = raw
            .landmarks
            .into_iter()
            .map(|lm| {
                lm.map(|(x, y, z, visibility)| {
                    let (ix, iy) = map(x, y);
                    // Low visibility stays present with its weight.
                    let vis = visibility.max(0.0);
                    let landmark = match z {
                        Some(z) => Landmark::with_z(ix, iy, z, vis),
                        None => Landmark::new(ix, iy, vis),
                    };
                    landmark.clipped(frame.width, frame.height)
                })
            })
            .collect();

        let (bx, by, bw, bh) = raw.bbox;
        let (x0, y0) = map(bx, by);
        let (x1, y1) = map(bx + bw, by + bh);
        let bbox = BoundingBox::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
            .clipped(frame.width, frame.height);

        DetectedSubject {
            bbox,
            family,
            landmarks,
            confidence: raw.confidence,
        }
    }

    /// Visibility floor in effect (for callers distinguishing low
    /// confidence from missing).
    pub fn visibility_floor(&self) -> f32 {
        self.config.visibility_floor
    }

    pub fn close(&mut self) {
        self.backend.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::scripted::ScriptedBackend;
    use vigil_models::PixelLayout;

    fn gray_frame(width: u32, height: u32) -> Frame {
        Frame::new(
            0,
            0,
            PixelLayout::Rgb8,
            width,
            height,
            vec![100u8; width as usize * height as usize * 3],
        )
        .unwrap()
    }

    /// Normalized and pixel backends agree on absolute
    /// coordinates within half a pixel.
    #[test]
    fn test_normalized_and_pixel_paths_agree() {
        let (w, h) = (256u32, 256u32);
        let frame = gray_frame(w, h);

        // One landmark at normalized (0.5, 0.25).
        let norm = ScriptedBackend::single_pose_subject(RawCoords::Normalized, 0.5, 0.25);
        let pix = ScriptedBackend::single_pose_subject(
            RawCoords::InputPixels,
            0.5 * (w as f32 - 1.0),
            0.25 * (h as f32 - 1.0),
        );

        let mut norm_stage = DetectorStage::new(Box::new(norm), DetectorConfig::default());
        let mut pix_stage = DetectorStage::new(Box::new(pix), DetectorConfig::default());

        let a = norm_stage.detect(&frame, DetectorFamily::Pose).unwrap();
        let b = pix_stage.detect(&frame, DetectorFamily::Pose).unwrap();

        let la = a.subjects[0].landmarks[0].unwrap();
        let lb = b.subjects[0].landmarks[0].unwrap();
        assert!((la.x - lb.x).abs() < 0.5, "{} vs {}", la.x, lb.x);
        assert!((la.y - lb.y).abs() < 0.5, "{} vs {}", la.y, lb.y);
        assert!((la.x - 0.5 * (w as f32 - 1.0)).abs() < 0.5);
    }

    #[test]
    fn test_landmark_count_mismatch_rejected() {
        let frame = gray_frame(64, 64);
        let backend = ScriptedBackend::with_landmark_count(RawCoords::Normalized, 21);
        let mut stage = DetectorStage::new(Box::new(backend), DetectorConfig::default());
        let err = stage.detect(&frame, DetectorFamily::Pose).unwrap_err();
        assert!(matches!(err, DetectError::InvalidInput(_)));
    }

    #[test]
    fn test_low_visibility_is_kept() {
        let frame = gray_frame(64, 64);
        let backend = ScriptedBackend::single_pose_subject_with_visibility(
            RawCoords::Normalized,
            0.5,
            0.5,
            0.0001,
        );
        let mut stage = DetectorStage::new(Box::new(backend), DetectorConfig::default());
        let result = stage.detect(&frame, DetectorFamily::Pose).unwrap();
        let lm = result.subjects[0].landmarks[0].unwrap();
        assert!(lm.visibility > 0.0);
        assert!(lm.visibility < stage.visibility_floor());
    }

    #[test]
    fn test_method_tag_present() {
        let frame = gray_frame(64, 64);
        let backend = ScriptedBackend::single_pose_subject(RawCoords::Normalized, 0.5, 0.5);
        let mut stage = DetectorStage::new(Box::new(backend), DetectorConfig::default());
        let result = stage.detect(&frame, DetectorFamily::Pose).unwrap();
        assert_eq!(result.method, "scripted");
    }
}
