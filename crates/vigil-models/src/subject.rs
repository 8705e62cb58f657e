//! Registered subjects.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Unique identifier for a monitored subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Embedding dimensionality produced by the face recognizer.
pub const EMBEDDING_DIM: usize = 128;

/// A registered subject and its persisted state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    /// 128-dim face embedding.
    pub embedding: Vec<f32>,
    /// Free-form profile attributes (age group, mobility aids, ...).
    #[serde(default)]
    pub profile: HashMap<String, String>,
    /// Bumped on every re-registration of the same id.
    #[serde(default)]
    pub version: u32,
    /// Wall-clock time of the last successful identification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    /// Number of successful identifications.
    #[serde(default)]
    pub observations: u64,
}

impl Subject {
    /// Create a freshly registered subject.
    pub fn new(
        id: impl Into<SubjectId>,
        name: impl Into<String>,
        embedding: Vec<f32>,
        profile: HashMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            embedding,
            profile,
            version: 1,
            last_seen: None,
            observations: 0,
        }
    }

    /// Euclidean distance between this subject's embedding and `other`.
    ///
    /// Returns `None` when dimensions differ.
    pub fn distance(&self, other: &[f32]) -> Option<f32> {
        if self.embedding.len() != other.len() {
            return None;
        }
        let sum: f32 = self
            .embedding
            .iter()
            .zip(other)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Some(sum.sqrt())
    }
}
