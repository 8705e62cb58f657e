//! Durable alert log sink.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::warn;

use vigil_models::{AlertEvent, AlertRecord};

/// Append-only NDJSON alert log: one JSON object per line.
pub struct AlertLogSink {
    path: PathBuf,
}

impl AlertLogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Append one alert; failures are logged, never fatal to the
    /// pipeline.
    pub async fn append(&self, event: &AlertEvent) {
        let record = AlertRecord::from_event(event);
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!("failed to serialize alert record: {e}");
                return;
            }
        };
        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
            file.flush().await
        }
        .await;
        if let Err(e) = result {
            warn!(path = %self.path.display(), "failed to append alert: {e}");
        }
    }
}
