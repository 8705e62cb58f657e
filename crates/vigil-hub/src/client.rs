//! The abstract hub client surface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vigil_models::{InputSpec, JobId};

use crate::error::HubResult;

/// A device advertised by the optimization service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubDevice {
    pub name: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// Raw job status as the service reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteJobStatus {
    /// Free-form status string; normalized by the monitor.
    pub status: String,
    /// Percent complete, when the service reports one.
    #[serde(default)]
    pub progress: Option<u8>,
    /// Full payload, preserved for error extraction and diagnostics.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Options shared by the submit operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitOptions {
    /// Extra compile/link options passed through to the service.
    #[serde(default)]
    pub options: Vec<String>,
}

/// Operations the core needs from the optimization service. Transport,
/// auth and rate limiting live below this trait.
#[async_trait]
pub trait HubClient: Send + Sync {
    async fn list_devices(&self) -> HubResult<Vec<HubDevice>>;

    /// Upload model bytes; returns the remote model id.
    async fn upload_model(&self, name: &str, bytes: Vec<u8>) -> HubResult<String>;

    async fn submit_compile(
        &self,
        model_id: &str,
        device: &HubDevice,
        input_specs: &InputSpec,
        opts: &SubmitOptions,
    ) -> HubResult<JobId>;

    async fn submit_profile(&self, model_id: &str, device: &HubDevice) -> HubResult<JobId>;

    async fn submit_link(&self, model_ids: &[String], opts: &SubmitOptions) -> HubResult<JobId>;

    async fn submit_quantize(&self, model_id: &str, dtype: &str) -> HubResult<JobId>;

    async fn get_job(&self, job_id: &JobId) -> HubResult<RemoteJobStatus>;

    async fn cancel_job(&self, job_id: &JobId) -> HubResult<()>;

    async fn download_artifact(&self, job_id: &JobId) -> HubResult<Vec<u8>>;
}
