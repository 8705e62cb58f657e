//! Face embedding extraction.

use async_trait::async_trait;

use vigil_detect::{DetectedSubject, DetectorStage};
use vigil_models::{DetectorFamily, Frame, EMBEDDING_DIM};

use crate::error::SubjectsResult;

/// Extracts a 128-dim embedding for the first face in a frame.
#[async_trait]
pub trait FaceEmbedder: Send {
    /// `None` when no face is present.
    async fn embed(&mut self, frame: &Frame) -> SubjectsResult<Option<Vec<f32>>>;
}

/// Geometry-based embedder over a face-mesh detector.
///
/// The embedding is a normalized landmark-geometry signature: 64 mesh
/// points sampled uniformly across the topology, centered on the face
/// box and scaled by its diagonal. Not as discriminative as a learned
/// encoder, but deterministic and engine-independent; threshold tuning
/// lives in the registry config.
pub struct DetectorEmbedder {
    stage: DetectorStage,
}

impl DetectorEmbedder {
    pub fn new(stage: DetectorStage) -> Self {
        Self { stage }
    }

    /// Build the signature for one detected face.
    pub fn signature(subject: &DetectedSubject) -> Vec<f32> {
        let (cx, cy) = subject.bbox.center();
        let scale = (subject.bbox.width * subject.bbox.width
            + subject.bbox.height * subject.bbox.height)
            .sqrt()
            .max(1.0);

        let total = subject.landmarks.len().max(1);
        let points = EMBEDDING_DIM / 2;
        let mut embedding = Vec::with_capacity(EMBEDDING_DIM);
        for i in 0..points {
            let idx = i * total / points;
            match subject.landmarks.get(idx).copied().flatten() {
                Some(lm) => {
                    embedding.push((lm.x - cx) / scale);
                    embedding.push((lm.y - cy) / scale);
                }
                None => {
                    embedding.push(0.0);
                    embedding.push(0.0);
                }
            }
        }
        embedding
    }
}

#[async_trait]
impl FaceEmbedder for DetectorEmbedder {
    async fn embed(&mut self, frame: &Frame) -> SubjectsResult<Option<Vec<f32>>> {
        let result = self.stage.detect(frame, DetectorFamily::FaceMesh)?;
        Ok(result.subjects.first().map(Self::signature))
    }
}

/// Embedder returning pre-scripted embeddings (tests).
#[derive(Debug, Default)]
pub struct ScriptedEmbedder {
    outputs: std::collections::VecDeque<Option<Vec<f32>>>,
}

impl ScriptedEmbedder {
    pub fn new(outputs: impl IntoIterator<Item = Option<Vec<f32>>>) -> Self {
        Self {
            outputs: outputs.into_iter().collect(),
        }
    }

    /// An embedder that always reports the same embedding.
    pub fn constant(embedding: Vec<f32>) -> Self {
        let mut s = Self::default();
        s.outputs.push_back(Some(embedding));
        s
    }
}

#[async_trait]
impl FaceEmbedder for ScriptedEmbedder {
    async fn embed(&mut self, _frame: &Frame) -> SubjectsResult<Option<Vec<f32>>> {
        match self.outputs.len() {
            0 => Ok(None),
            1 => Ok(self.outputs.front().cloned().unwrap()),
            _ => Ok(self.outputs.pop_front().unwrap()),
        }
    }
}
