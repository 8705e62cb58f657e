//! Subject registration and identification.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vigil_models::{Frame, Subject, SubjectId, EMBEDDING_DIM};

use crate::embedder::FaceEmbedder;
use crate::error::{SubjectsError, SubjectsResult};
use crate::store::SubjectStore;

/// Registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RegistryConfig {
    /// Maximum Euclidean distance for a positive identification.
    pub match_threshold: f32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.6,
        }
    }
}

/// The subject registry: embedding extraction plus the durable store.
pub struct SubjectRegistry<E: FaceEmbedder> {
    store: SubjectStore,
    embedder: E,
    config: RegistryConfig,
}

impl<E: FaceEmbedder> SubjectRegistry<E> {
    pub fn new(store: SubjectStore, embedder: E, config: RegistryConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Register a subject from an image.
    ///
    /// The first detected face provides the embedding; `ErrNoFace` when
    /// there is none. Re-registering an existing id replaces the
    /// embedding and bumps the record version.
    pub async fn register(
        &mut self,
        id: impl Into<SubjectId>,
        name: impl Into<String>,
        image: &Frame,
        profile: HashMap<String, String>,
    ) -> SubjectsResult<Subject> {
        let id = id.into();
        let embedding = self
            .embedder
            .embed(image)
            .await?
            .ok_or(SubjectsError::NoFace)?;
        if embedding.len() != EMBEDDING_DIM {
            return Err(SubjectsError::BadEmbedding(embedding.len()));
        }

        let mut subject = Subject::new(id.clone(), name, embedding, profile);
        if let Some(existing) = self.store.get(&id).await {
            subject.version = existing.version + 1;
            subject.observations = existing.observations;
            subject.last_seen = existing.last_seen;
            info!(subject = %id, version = subject.version, "re-registering subject");
        } else {
            info!(subject = %id, "registering new subject");
        }
        self.store.put(subject.clone()).await?;
        Ok(subject)
    }

    /// Identify the first face in a frame against the registered set.
    ///
    /// Returns the best match under the threshold (smallest distance
    /// breaks ties), updating its session stats. `Ok(None)` when nothing
    /// matches; `ErrNoFace` when the frame holds no face at all.
    pub async fn identify(&mut self, frame: &Frame) -> SubjectsResult<Option<SubjectId>> {
        let embedding = self
            .embedder
            .embed(frame)
            .await?
            .ok_or(SubjectsError::NoFace)?;

        let best = self
            .store
            .with_all(|subjects| {
                subjects
                    .values()
                    .filter_map(|s| s.distance(&embedding).map(|d| (s.id.clone(), d)))
                    .filter(|(_, d)| *d < self.config.match_threshold)
                    .min_by(|a, b| a.1.total_cmp(&b.1))
            })
            .await;

        match best {
            Some((id, distance)) => {
                debug!(subject = %id, distance, "subject identified");
                self.store
                    .update(&id, |subject| {
                        subject.last_seen = Some(Utc::now());
                        subject.observations += 1;
                    })
                    .await?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Remove a subject permanently.
    pub async fn delete(&self, id: &SubjectId) -> SubjectsResult<Subject> {
        info!(subject = %id, "deregistering subject");
        self.store.delete(id).await
    }

    /// All registered subjects, ordered by id.
    pub async fn list(&self) -> Vec<Subject> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::ScriptedEmbedder;
    use vigil_models::PixelLayout;

    fn frame() -> Frame {
        Frame::new(0, 0, PixelLayout::Rgb8, 4, 4, vec![0u8; 48]).unwrap()
    }

    fn embedding(seed: f32) -> Vec<f32> {
        (0..EMBEDDING_DIM).map(|i| seed + i as f32 * 0.001).collect()
    }

    async fn registry_with(
        dir: &tempfile::TempDir,
        embedder: ScriptedEmbedder,
    ) -> SubjectRegistry<ScriptedEmbedder> {
        let store = SubjectStore::open(dir.path().join("subjects.json"))
            .await
            .unwrap();
        SubjectRegistry::new(store, embedder, RegistryConfig::default())
    }

    #[tokio::test]
    async fn test_register_and_identify() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = ScriptedEmbedder::constant(embedding(0.0));
        let mut registry = registry_with(&dir, embedder).await;

        registry
            .register("ada", "Ada", &frame(), HashMap::new())
            .await
            .unwrap();
        let found = registry.identify(&frame()).await.unwrap();
        assert_eq!(found, Some(SubjectId::from("ada")));

        // Session stats recorded.
        let listed = registry.list().await;
        assert_eq!(listed[0].observations, 1);
        assert!(listed[0].last_seen.is_some());
    }

    #[tokio::test]
    async fn test_no_face_error() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = ScriptedEmbedder::new([None]);
        let mut registry = registry_with(&dir, embedder).await;
        assert!(matches!(
            registry
                .register("ada", "Ada", &frame(), HashMap::new())
                .await,
            Err(SubjectsError::NoFace)
        ));
    }

    #[tokio::test]
    async fn test_no_match_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        // Register with one embedding, identify with a far one.
        let embedder = ScriptedEmbedder::new([Some(embedding(0.0)), Some(embedding(10.0))]);
        let mut registry = registry_with(&dir, embedder).await;
        registry
            .register("ada", "Ada", &frame(), HashMap::new())
            .await
            .unwrap();
        assert_eq!(registry.identify(&frame()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_smallest_distance_wins() {
        let dir = tempfile::tempdir().unwrap();
        let probe: Vec<f32> = vec![0.01; EMBEDDING_DIM];
        let near: Vec<f32> = vec![0.02; EMBEDDING_DIM];
        let far: Vec<f32> = vec![0.04; EMBEDDING_DIM];
        let embedder = ScriptedEmbedder::new([Some(far), Some(near), Some(probe)]);
        let mut registry = registry_with(&dir, embedder).await;

        registry
            .register("far", "Far", &frame(), HashMap::new())
            .await
            .unwrap();
        registry
            .register("near", "Near", &frame(), HashMap::new())
            .await
            .unwrap();
        let found = registry.identify(&frame()).await.unwrap();
        assert_eq!(found, Some(SubjectId::from("near")));
    }

    #[tokio::test]
    async fn test_reregistration_bumps_version() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = ScriptedEmbedder::constant(embedding(0.0));
        let mut registry = registry_with(&dir, embedder).await;

        let first = registry
            .register("ada", "Ada", &frame(), HashMap::new())
            .await
            .unwrap();
        assert_eq!(first.version, 1);
        let second = registry
            .register("ada", "Ada again", &frame(), HashMap::new())
            .await
            .unwrap();
        assert_eq!(second.version, 2);
        assert_eq!(registry.list().await.len(), 1);
    }
}
