//! Per-model batch conversion report.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConvertResult;
use crate::rules::Classification;
use crate::tflite::ModelFlags;

/// Outcome of one model in a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ModelOutcome {
    Ok {
        output: PathBuf,
        upcast_applied: bool,
    },
    Failed {
        classification: Classification,
    },
}

impl ModelOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ModelOutcome::Ok { .. })
    }
}

/// One model's report entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub model: PathBuf,
    #[serde(default)]
    pub flags: ModelFlags,
    pub outcome: ModelOutcome,
}

/// Report for a whole batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub entries: Vec<ModelReport>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ModelReport) {
        self.entries.push(entry);
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    /// Write the report as pretty JSON.
    pub async fn write(&self, path: &Path) -> ConvertResult<()> {
        let payload = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }

    /// One line per model, for the CLI summary.
    pub fn summary_lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| match &entry.outcome {
                ModelOutcome::Ok {
                    output,
                    upcast_applied,
                } => format!(
                    "ok    {} -> {}{}",
                    entry.model.display(),
                    output.display(),
                    if *upcast_applied { " (after fp32 upcast)" } else { "" }
                ),
                ModelOutcome::Failed { classification } => format!(
                    "fail  {} [{}] {}",
                    entry.model.display(),
                    classification.tag.as_str(),
                    classification.root_cause
                ),
            })
            .collect()
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleTag;

    #[test]
    fn test_counts_and_summary() {
        let mut report = BatchReport::new();
        report.push(ModelReport {
            model: PathBuf::from("a.tflite"),
            flags: ModelFlags::default(),
            outcome: ModelOutcome::Ok {
                output: PathBuf::from("a.onnx"),
                upcast_applied: true,
            },
        });
        report.push(ModelReport {
            model: PathBuf::from("b.tflite"),
            flags: ModelFlags::default(),
            outcome: ModelOutcome::Failed {
                classification: Classification {
                    tag: RuleTag::SelectTfOpsOrFlex,
                    root_cause: "flex ops".to_string(),
                    remediation: "rewrite".to_string(),
                    log_tail: String::new(),
                },
            },
        });

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        let lines = report.summary_lines();
        assert!(lines[0].contains("after fp32 upcast"));
        assert!(lines[1].contains("select_tf_ops_or_flex"));
    }

    #[tokio::test]
    async fn test_report_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = BatchReport::new();
        report.write(&path).await.unwrap();
        let back: BatchReport =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert!(back.entries.is_empty());
    }
}
