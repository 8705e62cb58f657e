//! TFLite → ONNX conversion through the external converter.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{ConvertError, ConvertResult};
use crate::rules::{classify, Classification};
use crate::tflite::{inspect, upcast_fp16_file, ModelFlags};

/// External converter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ConverterConfig {
    /// Converter executable; receives
    /// `--tflite_path <in> --onnx_path <out>`.
    pub command: PathBuf,
    /// Extra arguments placed before the path flags.
    pub args: Vec<String>,
    /// Hard wall-clock limit per invocation, seconds.
    pub timeout_secs: u64,
    /// Skip conversion when the output already exists.
    pub skip_existing: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("tflite2onnx"),
            args: Vec::new(),
            timeout_secs: 600,
            skip_existing: true,
        }
    }
}

/// Result of one conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub onnx_path: PathBuf,
    /// Pre-analysis flags of the input model.
    pub flags: ModelFlags,
    /// Set when the fp32 upcast had to run first.
    pub upcast_applied: bool,
}

/// Drives the external TFLite→ONNX converter with error classification
/// and the automatic fp16 upcast retry.
pub struct TfliteConverter {
    config: ConverterConfig,
}

impl TfliteConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Convert `input` into `out_dir/<stem>.onnx`.
    ///
    /// On converter failure the log is classified against the rule
    /// table; an fp16 classification triggers one automatic upcast and
    /// retry, every other rule is surfaced without retrying.
    pub async fn convert(&self, input: &Path, out_dir: &Path) -> ConvertResult<Conversion> {
        let data = tokio::fs::read(input)
            .await
            .map_err(|_| ConvertError::FileNotFound(input.to_path_buf()))?;
        let flags = inspect(&data)?;

        tokio::fs::create_dir_all(out_dir).await?;
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "model".to_string());
        let onnx_path = out_dir.join(format!("{stem}.onnx"));

        if self.config.skip_existing && onnx_path.exists() {
            info!(output = %onnx_path.display(), "output exists; skipping conversion");
            return Ok(Conversion {
                onnx_path,
                flags,
                upcast_applied: false,
            });
        }

        match self.run_converter(input, &onnx_path).await {
            Ok(()) => Ok(Conversion {
                onnx_path,
                flags,
                upcast_applied: false,
            }),
            Err(ConvertError::Conversion(c)) if c.tag.retry_with_upcast() => {
                warn!(
                    input = %input.display(),
                    rule = c.tag.as_str(),
                    "conversion failed on fp16; upcasting and retrying"
                );
                let upcast = upcast_fp16_file(input, None).await?;
                self.run_converter(upcast.output(), &onnx_path).await?;
                info!(output = %onnx_path.display(), "conversion succeeded after upcast");
                Ok(Conversion {
                    onnx_path,
                    flags,
                    upcast_applied: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// One converter invocation; failures come back classified.
    async fn run_converter(&self, input: &Path, output: &Path) -> ConvertResult<()> {
        let command = which::which(&self.config.command).map_err(|_| {
            ConvertError::ConverterNotFound(self.config.command.display().to_string())
        })?;

        let mut cmd = Command::new(&command);
        cmd.args(&self.config.args)
            .arg("--tflite_path")
            .arg(input)
            .arg("--onnx_path")
            .arg(output)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(input = %input.display(), output = %output.display(), "running converter");
        let result = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| ConvertError::Timeout(self.config.timeout_secs))?;
        let out = result.map_err(ConvertError::Io)?;

        if out.status.success() && output.exists() {
            return Ok(());
        }

        let log = format!(
            "{}\n{}",
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
        // Re-analyze the exact input we handed to the converter.
        let flags = tokio::fs::read(input)
            .await
            .ok()
            .and_then(|data| inspect(&data).ok())
            .unwrap_or_default();
        Err(ConvertError::Conversion(classify(&log, &flags)))
    }

    /// Classify a failure log directly (used by tests and the report).
    pub fn classify_log(log: &str, flags: &ModelFlags) -> Classification {
        classify(log, flags)
    }
}
