//! Subject identity tagging for detected frames.

use async_trait::async_trait;

use vigil_models::{Frame, SubjectId};
use vigil_subjects::{FaceEmbedder, SubjectRegistry, SubjectsError};

/// Assigns a subject identity to a frame before fusion.
#[async_trait]
pub trait SubjectTagger: Send {
    /// Identity of the primary subject in the frame, if known.
    async fn tag(&mut self, frame: &Frame) -> Option<SubjectId>;
}

/// Always tags the same identity (single-subject deployments, tests).
pub struct FixedTagger {
    id: SubjectId,
}

impl FixedTagger {
    pub fn new(id: impl Into<SubjectId>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl SubjectTagger for FixedTagger {
    async fn tag(&mut self, _frame: &Frame) -> Option<SubjectId> {
        Some(self.id.clone())
    }
}

/// Tags via the face registry, re-identifying every `interval` frames
/// and carrying the last identity in between (face recognition is far
/// more expensive than pose detection).
pub struct RegistryTagger<E: FaceEmbedder> {
    registry: SubjectRegistry<E>,
    interval: u64,
    frames_seen: u64,
    last: Option<SubjectId>,
}

impl<E: FaceEmbedder> RegistryTagger<E> {
    pub fn new(registry: SubjectRegistry<E>, interval: u64) -> Self {
        Self {
            registry,
            interval: interval.max(1),
            frames_seen: 0,
            last: None,
        }
    }
}

#[async_trait]
impl<E: FaceEmbedder> SubjectTagger for RegistryTagger<E> {
    async fn tag(&mut self, frame: &Frame) -> Option<SubjectId> {
        let due = self.frames_seen % self.interval == 0;
        self.frames_seen += 1;
        if due {
            match self.registry.identify(frame).await {
                Ok(Some(id)) => self.last = Some(id),
                Ok(None) => {}
                Err(SubjectsError::NoFace) => {}
                Err(e) => tracing::warn!("identification failed: {e}"),
            }
        }
        self.last.clone()
    }
}
