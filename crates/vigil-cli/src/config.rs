//! CLI configuration.
//!
//! A single JSON file covers every subcommand. All keys have defaults;
//! unknown keys are rejected (configuration errors exit with code 2).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vigil_convert::{ConverterConfig, TorchExportConfig};
use vigil_hub::{HubClientConfig, OrchestratorConfig};
use vigil_models::InputSpec;

/// Hub connection settings (token comes from `VIGIL_HUB_TOKEN`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HubSettings {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        let defaults = HubClientConfig::default();
        Self {
            base_url: defaults.base_url,
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

impl HubSettings {
    pub fn to_client_config(&self) -> HubClientConfig {
        HubClientConfig {
            base_url: self.base_url.clone(),
            api_token: std::env::var("VIGIL_HUB_TOKEN").unwrap_or_default(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..Default::default()
        }
    }
}

/// Top-level CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct CliConfig {
    /// Root scanned for model files.
    pub models_root: Option<PathBuf>,
    /// Where converted ONNX files land.
    pub onnx_dir: Option<PathBuf>,
    /// Batch conversion report path.
    pub report_path: Option<PathBuf>,
    /// Job cache directory (resume across restarts).
    pub job_cache_dir: Option<PathBuf>,
    /// Input specs used for compile submissions.
    pub input_specs: InputSpec,
    pub converter: ConverterConfig,
    pub torch: TorchExportConfig,
    pub orchestrator: OrchestratorConfig,
    pub hub: HubSettings,
}

impl CliConfig {
    /// Load from a JSON file; absent file yields pure defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
        serde_json::from_str(&contents)
            .map_err(|e| format!("invalid config {}: {e}", path.display()))
    }

    pub fn models_root(&self) -> PathBuf {
        self.models_root.clone().unwrap_or_else(|| PathBuf::from("models"))
    }

    pub fn onnx_dir(&self) -> PathBuf {
        self.onnx_dir.clone().unwrap_or_else(|| PathBuf::from("onnx"))
    }

    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("convert_report.json"))
    }

    pub fn job_cache_dir(&self) -> PathBuf {
        self.job_cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("job_cache"))
    }
}
