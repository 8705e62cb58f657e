//! Durable key-value store for subject records.
//!
//! One JSON file, written through atomically (temp file + rename) on
//! every mutation. Records are keyed `subject:<id>`; a `meta:version`
//! entry carries the schema version. Embeddings are stored as a
//! length-prefixed little-endian float32 array, base64-encoded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use vigil_models::{Subject, SubjectId};

use crate::error::{SubjectsError, SubjectsResult};

/// Current store schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Serialized subject record; the embedding travels as an encoded blob.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSubject {
    name: String,
    embedding: String,
    #[serde(default)]
    profile: HashMap<String, String>,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    last_seen: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    observations: u64,
}

/// Encode an embedding as a length-prefixed f32 LE array in base64.
pub fn encode_embedding(embedding: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(4 + embedding.len() * 4);
    bytes.extend_from_slice(&(embedding.len() as u32).to_le_bytes());
    for value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    BASE64.encode(bytes)
}

/// Decode a length-prefixed embedding blob.
pub fn decode_embedding(encoded: &str) -> Option<Vec<f32>> {
    let bytes = BASE64.decode(encoded).ok()?;
    if bytes.len() < 4 {
        return None;
    }
    let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    if bytes.len() != 4 + count * 4 {
        return None;
    }
    Some(
        bytes[4..]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}

/// The durable subject store.
///
/// Reads take the shared lock, mutations the exclusive lock; every
/// mutation is persisted before it returns.
pub struct SubjectStore {
    path: PathBuf,
    inner: RwLock<HashMap<SubjectId, Subject>>,
}

impl SubjectStore {
    /// Load the store from `path`, creating an empty one if absent.
    pub async fn open(path: impl AsRef<Path>) -> SubjectsResult<Self> {
        let path = path.as_ref().to_path_buf();
        let subjects = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::parse(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "creating new subject store");
                HashMap::new()
            }
            Err(e) => return Err(SubjectsError::Io(e)),
        };
        info!(
            path = %path.display(),
            subjects = subjects.len(),
            "subject store loaded"
        );
        Ok(Self {
            path,
            inner: RwLock::new(subjects),
        })
    }

    fn parse(contents: &str) -> SubjectsResult<HashMap<SubjectId, Subject>> {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(contents)?;

        let version = raw
            .get("meta:version")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        if version != SCHEMA_VERSION {
            return Err(SubjectsError::UnsupportedSchema(version));
        }

        let mut subjects = HashMap::new();
        for (key, value) in raw {
            let Some(id) = key.strip_prefix("subject:") else {
                continue;
            };
            let stored: StoredSubject = serde_json::from_value(value)?;
            let embedding = decode_embedding(&stored.embedding).ok_or_else(|| {
                SubjectsError::BadEmbedding(0)
            })?;
            subjects.insert(
                SubjectId::from(id),
                Subject {
                    id: SubjectId::from(id),
                    name: stored.name,
                    embedding,
                    profile: stored.profile,
                    version: stored.version,
                    last_seen: stored.last_seen,
                    observations: stored.observations,
                },
            );
        }
        Ok(subjects)
    }

    /// Serialize and atomically replace the store file.
    async fn persist(&self, subjects: &HashMap<SubjectId, Subject>) -> SubjectsResult<()> {
        let mut raw: HashMap<String, serde_json::Value> = HashMap::new();
        raw.insert(
            "meta:version".to_string(),
            serde_json::Value::from(SCHEMA_VERSION),
        );
        for (id, subject) in subjects {
            let stored = StoredSubject {
                name: subject.name.clone(),
                embedding: encode_embedding(&subject.embedding),
                profile: subject.profile.clone(),
                version: subject.version,
                last_seen: subject.last_seen,
                observations: subject.observations,
            };
            raw.insert(format!("subject:{id}"), serde_json::to_value(stored)?);
        }

        let payload = serde_json::to_string_pretty(&raw)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, payload).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "subject store persisted");
        Ok(())
    }

    /// Insert or replace a subject; persists before returning.
    pub async fn put(&self, subject: Subject) -> SubjectsResult<()> {
        let mut guard = self.inner.write().await;
        guard.insert(subject.id.clone(), subject);
        self.persist(&guard).await
    }

    /// Remove a subject; persists before returning.
    pub async fn delete(&self, id: &SubjectId) -> SubjectsResult<Subject> {
        let mut guard = self.inner.write().await;
        let removed = guard
            .remove(id)
            .ok_or_else(|| SubjectsError::UnknownSubject(id.to_string()))?;
        self.persist(&guard).await?;
        Ok(removed)
    }

    pub async fn get(&self, id: &SubjectId) -> Option<Subject> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<Subject> {
        let mut subjects: Vec<Subject> = self.inner.read().await.values().cloned().collect();
        subjects.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        subjects
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Run `f` over all subjects under the shared lock.
    pub async fn with_all<R>(&self, f: impl FnOnce(&HashMap<SubjectId, Subject>) -> R) -> R {
        f(&*self.inner.read().await)
    }

    /// Mutate one subject in place and persist.
    pub async fn update(
        &self,
        id: &SubjectId,
        f: impl FnOnce(&mut Subject),
    ) -> SubjectsResult<()> {
        let mut guard = self.inner.write().await;
        let subject = guard
            .get_mut(id)
            .ok_or_else(|| SubjectsError::UnknownSubject(id.to_string()))?;
        f(subject);
        self.persist(&guard).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(id: &str, embedding: Vec<f32>) -> Subject {
        Subject::new(id, format!("name-{id}"), embedding, HashMap::new())
    }

    #[test]
    fn test_embedding_codec_round_trip() {
        let embedding = vec![0.5f32, -1.25, 3.0, f32::MIN_POSITIVE];
        let encoded = encode_embedding(&embedding);
        assert_eq!(decode_embedding(&encoded).unwrap(), embedding);
    }

    #[test]
    fn test_embedding_codec_rejects_truncation() {
        let encoded = encode_embedding(&[1.0, 2.0]);
        let bytes = BASE64.decode(&encoded).unwrap();
        let truncated = BASE64.encode(&bytes[..bytes.len() - 4]);
        assert!(decode_embedding(&truncated).is_none());
    }

    #[tokio::test]
    async fn test_put_get_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.json");

        let store = SubjectStore::open(&path).await.unwrap();
        store.put(subject("ada", vec![1.0; 128])).await.unwrap();
        store.put(subject("bob", vec![2.0; 128])).await.unwrap();
        drop(store);

        let reloaded = SubjectStore::open(&path).await.unwrap();
        assert_eq!(reloaded.len().await, 2);
        let ada = reloaded.get(&SubjectId::from("ada")).await.unwrap();
        assert_eq!(ada.name, "name-ada");
        assert_eq!(ada.embedding.len(), 128);
    }

    #[tokio::test]
    async fn test_delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.json");

        let store = SubjectStore::open(&path).await.unwrap();
        store.put(subject("ada", vec![1.0; 128])).await.unwrap();
        store.delete(&SubjectId::from("ada")).await.unwrap();
        assert!(matches!(
            store.delete(&SubjectId::from("ada")).await,
            Err(SubjectsError::UnknownSubject(_))
        ));
        drop(store);

        let reloaded = SubjectStore::open(&path).await.unwrap();
        assert!(reloaded.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_schema_version_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.json");
        tokio::fs::write(&path, r#"{"meta:version": 99}"#).await.unwrap();
        assert!(matches!(
            SubjectStore::open(&path).await,
            Err(SubjectsError::UnsupportedSchema(99))
        ));
    }
}
