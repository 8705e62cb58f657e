//! Scripted backend for tests and replay.

use std::collections::VecDeque;

use vigil_models::DetectorFamily;

use crate::backend::{BackendClass, BackendDescriptor, Capabilities, LatencyClass};
use crate::detector::{Detector, RawCoords, RawOutput, RawSubject};
use crate::error::{DetectError, DetectResult};

/// A backend that emits pre-scripted detections.
pub struct ScriptedBackend {
    descriptor: BackendDescriptor,
    coords: RawCoords,
    position: (f32, f32),
    visibility: f32,
    landmark_count_override: Option<usize>,
    /// Subject counts returned per call; when exhausted, repeats the last
    /// configured count (default 1).
    script: VecDeque<usize>,
    default_count: usize,
    /// Fully custom outputs; takes precedence over the count script.
    raw_outputs: Option<VecDeque<RawOutput>>,
    input_size: (u32, u32),
    closed: bool,
}

impl ScriptedBackend {
    fn base(coords: RawCoords) -> Self {
        Self {
            descriptor: BackendDescriptor {
                name: "scripted".to_string(),
                class: BackendClass::GenericCpu,
                capabilities: Capabilities {
                    pose: true,
                    face: true,
                    hand: true,
                    fp16: false,
                    int8: false,
                },
                latency: LatencyClass::Realtime,
                platforms: Vec::new(),
            },
            coords,
            position: (0.5, 0.5),
            visibility: 0.9,
            landmark_count_override: None,
            script: VecDeque::new(),
            default_count: 1,
            raw_outputs: None,
            input_size: (256, 256),
            closed: false,
        }
    }

    /// One subject whose landmarks all sit at (`x`, `y`).
    pub fn single_pose_subject(coords: RawCoords, x: f32, y: f32) -> Self {
        let mut backend = Self::base(coords);
        backend.position = (x, y);
        backend
    }

    /// Like [`single_pose_subject`](Self::single_pose_subject) with an
    /// explicit landmark visibility.
    pub fn single_pose_subject_with_visibility(
        coords: RawCoords,
        x: f32,
        y: f32,
        visibility: f32,
    ) -> Self {
        let mut backend = Self::single_pose_subject(coords, x, y);
        backend.visibility = visibility;
        backend
    }

    /// Emit the wrong landmark count regardless of family (for testing
    /// boundary rejection).
    pub fn with_landmark_count(coords: RawCoords, count: usize) -> Self {
        let mut backend = Self::base(coords);
        backend.landmark_count_override = Some(count);
        backend
    }

    /// Subject counts for successive calls; after the script is
    /// exhausted, every call yields `final_count`.
    pub fn with_subject_script(script: Vec<usize>, final_count: usize) -> Self {
        let mut backend = Self::base(RawCoords::Normalized);
        backend.script = script.into();
        backend.default_count = final_count;
        backend
    }

    /// Rename the backend (distinct method tags in fallback tests).
    pub fn named(mut self, name: &str) -> Self {
        self.descriptor.name = name.to_string();
        self
    }

    /// Replay fully custom raw outputs, one per call; once exhausted,
    /// every call returns zero subjects.
    pub fn from_raw_outputs(outputs: Vec<RawOutput>) -> Self {
        let mut backend = Self::base(RawCoords::Normalized);
        backend.raw_outputs = Some(outputs.into());
        backend
    }
}

impl Detector for ScriptedBackend {
    fn infer(
        &mut self,
        _input: &[u8],
        _width: u32,
        _height: u32,
        family: DetectorFamily,
    ) -> DetectResult<RawOutput> {
        if self.closed {
            return Err(DetectError::Closed);
        }
        if let Some(outputs) = &mut self.raw_outputs {
            return Ok(outputs.pop_front().unwrap_or(RawOutput {
                subjects: Vec::new(),
                coords: self.coords,
            }));
        }
        let count = self.script.pop_front().unwrap_or(self.default_count);
        let n = self
            .landmark_count_override
            .unwrap_or_else(|| family.landmark_count());
        let (x, y) = self.position;

        let subjects = (0..count)
            .map(|_| RawSubject {
                bbox: match self.coords {
                    RawCoords::Normalized => (x - 0.1, y - 0.1, 0.2, 0.2),
                    RawCoords::InputPixels => (x - 20.0, y - 20.0, 40.0, 40.0),
                },
                landmarks: vec![Some((x, y, None, self.visibility)); n],
                confidence: 0.9,
            })
            .collect();

        Ok(RawOutput {
            subjects,
            coords: self.coords,
        })
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn describe(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_then_default() {
        let mut backend = ScriptedBackend::with_subject_script(vec![0, 0], 2);
        let counts: Vec<usize> = (0..4)
            .map(|_| {
                backend
                    .infer(&[], 256, 256, DetectorFamily::Pose)
                    .unwrap()
                    .subjects
                    .len()
            })
            .collect();
        assert_eq!(counts, [0, 0, 2, 2]);
    }

    #[test]
    fn test_closed_backend_fails() {
        let mut backend = ScriptedBackend::single_pose_subject(RawCoords::Normalized, 0.5, 0.5);
        backend.close();
        assert!(matches!(
            backend.infer(&[], 256, 256, DetectorFamily::Pose),
            Err(DetectError::Closed)
        ));
    }
}
