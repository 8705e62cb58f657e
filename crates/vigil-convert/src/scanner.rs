//! Model file discovery.

use std::path::Path;

use tracing::{debug, info};

use vigil_models::{ModelArtifact, ModelFormat};

use crate::error::{ConvertError, ConvertResult};

/// Walk `root` recursively and emit an artifact per recognized model
/// file, ordered by path.
pub fn scan_models(root: &Path) -> ConvertResult<Vec<ModelArtifact>> {
    if !root.exists() {
        return Err(ConvertError::FileNotFound(root.to_path_buf()));
    }
    let mut artifacts = Vec::new();
    walk(root, &mut artifacts)?;
    artifacts.sort_by(|a, b| a.path.cmp(&b.path));
    info!(root = %root.display(), models = artifacts.len(), "model scan complete");
    Ok(artifacts)
}

fn walk(dir: &Path, out: &mut Vec<ModelArtifact>) -> ConvertResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(&path, out)?;
        } else if file_type.is_file() {
            if let Some(format) = ModelFormat::from_path(&path) {
                debug!(path = %path.display(), format = format.as_str(), "model found");
                out.push(ModelArtifact::new(path, format));
            }
        }
    }
    Ok(())
}
