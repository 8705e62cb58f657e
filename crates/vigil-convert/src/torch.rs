//! PyTorch → TorchScript → ONNX export guard.
//!
//! The heavy lifting happens in an external exporter (a pinned script
//! around `torch.jit.trace` + `torch.onnx.export`); this module owns the
//! contract: fully concrete input shapes, batch dimension fixed at 1
//! unless explicitly overridden, and an opset floor.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::info;

use vigil_models::InputSpec;

use crate::error::{ConvertError, ConvertResult};

/// Minimum ONNX opset the pipeline accepts.
pub const MIN_OPSET: u32 = 13;

/// Exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TorchExportConfig {
    /// Exporter executable; receives
    /// `--model <in> --output <out> --opset <n> --input <name:shape:dtype>...`.
    pub command: PathBuf,
    /// ONNX opset to pin; must be at least [`MIN_OPSET`].
    pub opset: u32,
    /// Allow a batch dimension other than 1.
    pub allow_batch_override: bool,
    pub timeout_secs: u64,
}

impl Default for TorchExportConfig {
    fn default() -> Self {
        Self {
            command: PathBuf::from("torch-export-onnx"),
            opset: 13,
            allow_batch_override: false,
            timeout_secs: 600,
        }
    }
}

/// Validate that every dimension of every input is a positive constant.
///
/// Dynamic-batch export is forbidden: the leading dimension must be 1
/// unless the override is set.
pub fn validate_input_specs(specs: &InputSpec, allow_batch_override: bool) -> ConvertResult<()> {
    if specs.is_empty() {
        return Err(ConvertError::InvalidInput(
            "at least one input spec is required".to_string(),
        ));
    }
    for (name, spec) in specs {
        if !spec.is_concrete() {
            return Err(ConvertError::DynamicShape(format!(
                "input '{name}' has non-positive dims: {:?}",
                spec.shape
            )));
        }
        if !allow_batch_override && spec.shape[0] != 1 {
            return Err(ConvertError::InvalidInput(format!(
                "input '{name}' batch dim is {} (must be 1)",
                spec.shape[0]
            )));
        }
    }
    Ok(())
}

/// Runs the external exporter under the shape/opset guard.
pub struct TorchExporter {
    config: TorchExportConfig,
}

impl TorchExporter {
    pub fn new(config: TorchExportConfig) -> ConvertResult<Self> {
        if config.opset < MIN_OPSET {
            return Err(ConvertError::InvalidInput(format!(
                "opset {} is below the minimum {MIN_OPSET}",
                config.opset
            )));
        }
        Ok(Self { config })
    }

    /// Export a PyTorch/TorchScript module to ONNX.
    pub async fn export(
        &self,
        model: &Path,
        output: &Path,
        specs: &InputSpec,
    ) -> ConvertResult<PathBuf> {
        validate_input_specs(specs, self.config.allow_batch_override)?;
        let command = which::which(&self.config.command).map_err(|_| {
            ConvertError::ConverterNotFound(self.config.command.display().to_string())
        })?;

        let mut cmd = Command::new(&command);
        cmd.arg("--model")
            .arg(model)
            .arg("--output")
            .arg(output)
            .arg("--opset")
            .arg(self.config.opset.to_string());
        for (name, spec) in specs {
            let shape: Vec<String> = spec.shape.iter().map(|d| d.to_string()).collect();
            cmd.arg("--input")
                .arg(format!("{name}:{}:{}", shape.join("x"), spec.dtype.as_str()));
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

        info!(model = %model.display(), opset = self.config.opset, "exporting to ONNX");
        let result = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| ConvertError::Timeout(self.config.timeout_secs))?;
        let out = result.map_err(ConvertError::Io)?;

        if !out.status.success() || !output.exists() {
            let log = format!(
                "{}\n{}",
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr)
            );
            return Err(ConvertError::Conversion(crate::rules::classify(
                &log,
                &Default::default(),
            )));
        }
        Ok(output.to_path_buf())
    }
}
