//! Subject identity: registration, identification and persistence.
//!
//! Subjects are identified by comparing a 128-dim face embedding against
//! the registered set (Euclidean distance, configurable threshold). The
//! store is a durable key-value file written through on every mutation.

pub mod embedder;
pub mod error;
pub mod registry;
pub mod store;

pub use embedder::{DetectorEmbedder, FaceEmbedder, ScriptedEmbedder};
pub use error::{SubjectsError, SubjectsResult};
pub use registry::{RegistryConfig, SubjectRegistry};
pub use store::SubjectStore;
