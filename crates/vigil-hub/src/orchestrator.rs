//! Upload, submission and artifact retrieval.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vigil_models::{CloudJob, InputSpec, JobKind, JobState, ModelArtifact};

use crate::cache::JobCache;
use crate::client::{HubClient, HubDevice, SubmitOptions};
use crate::device::select_device;
use crate::error::{HubError, HubResult};

/// Orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OrchestratorConfig {
    /// Preferred target device name or family token.
    pub preferred_device: String,
    /// Where downloaded artifacts land.
    pub artifacts_dir: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            preferred_device: "Snapdragon X Elite".to_string(),
            artifacts_dir: PathBuf::from("artifacts"),
        }
    }
}

/// Inference statistics extracted from a completed profile job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_time_us: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_memory_bytes: Option<u64>,
}

impl ProfileSummary {
    pub fn is_empty(&self) -> bool {
        self.inference_time_us.is_none() && self.peak_memory_bytes.is_none()
    }
}

/// Reject any input spec with a non-positive dimension before it can
/// reach the service.
pub fn validate_input_specs(specs: &InputSpec) -> HubResult<()> {
    for (name, spec) in specs {
        if !spec.is_concrete() {
            return Err(HubError::DynamicShape(format!(
                "input '{name}' has non-positive dims: {:?}",
                spec.shape
            )));
        }
    }
    Ok(())
}

/// Submits work to the hub and fetches results.
pub struct Orchestrator<C: HubClient> {
    client: Arc<C>,
    config: OrchestratorConfig,
    cache: Option<JobCache>,
}

impl<C: HubClient> Orchestrator<C> {
    pub fn new(client: Arc<C>, config: OrchestratorConfig, cache: Option<JobCache>) -> Self {
        Self {
            client,
            config,
            cache,
        }
    }

    pub fn client(&self) -> Arc<C> {
        Arc::clone(&self.client)
    }

    async fn cache_save(&self, job: &CloudJob) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(job).await {
                warn!(job_id = %job.id, "failed to cache submitted job: {e}");
            }
        }
    }

    /// Resolve the configured target device against the service list.
    pub async fn resolve_device(&self) -> HubResult<HubDevice> {
        let devices = self.client.list_devices().await?;
        select_device(&devices, &self.config.preferred_device)
            .map(|(device, _)| device.clone())
            .ok_or_else(|| HubError::Validation("service reports no devices".to_string()))
    }

    /// Upload a model file; returns the remote model id.
    pub async fn upload_model(&self, artifact: &ModelArtifact) -> HubResult<String> {
        let bytes = tokio::fs::read(&artifact.path).await?;
        let name = artifact
            .path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.{}", artifact.stem(), artifact.format.as_str()));
        info!(model = %artifact.path.display(), size = bytes.len(), "uploading model");
        self.client.upload_model(&name, bytes).await
    }

    /// Submit a compile job. Input specs must be fully concrete.
    pub async fn submit_compile(
        &self,
        model_id: &str,
        input_specs: &InputSpec,
        opts: &SubmitOptions,
    ) -> HubResult<CloudJob> {
        validate_input_specs(input_specs)?;
        let device = self.resolve_device().await?;
        let id = self
            .client
            .submit_compile(model_id, &device, input_specs, opts)
            .await?;
        let job = CloudJob::new(id, JobKind::Compile, model_id, device.name.clone());
        info!(job_id = %job.id, device = %device.name, "compile job submitted");
        self.cache_save(&job).await;
        Ok(job)
    }

    pub async fn submit_profile(&self, model_id: &str) -> HubResult<CloudJob> {
        let device = self.resolve_device().await?;
        let id = self.client.submit_profile(model_id, &device).await?;
        let job = CloudJob::new(id, JobKind::Profile, model_id, device.name.clone());
        info!(job_id = %job.id, device = %device.name, "profile job submitted");
        self.cache_save(&job).await;
        Ok(job)
    }

    pub async fn submit_link(
        &self,
        model_ids: &[String],
        opts: &SubmitOptions,
    ) -> HubResult<CloudJob> {
        if model_ids.is_empty() {
            return Err(HubError::Validation("link requires at least one model".to_string()));
        }
        let device = self.resolve_device().await?;
        let id = self.client.submit_link(model_ids, opts).await?;
        let job = CloudJob::new(id, JobKind::Link, model_ids.join("+"), device.name.clone());
        info!(job_id = %job.id, "link job submitted");
        self.cache_save(&job).await;
        Ok(job)
    }

    pub async fn submit_quantize(&self, model_id: &str, dtype: &str) -> HubResult<CloudJob> {
        let device = self.resolve_device().await?;
        let id = self.client.submit_quantize(model_id, dtype).await?;
        let job = CloudJob::new(id, JobKind::Quantize, model_id, device.name.clone());
        info!(job_id = %job.id, dtype, "quantize job submitted");
        self.cache_save(&job).await;
        Ok(job)
    }

    /// Download a completed job's artifact into the artifacts dir.
    ///
    /// The job's cache entry is removed on success; the job has reached
    /// the end of its lifecycle.
    pub async fn download_artifact(&self, job: &CloudJob) -> HubResult<PathBuf> {
        if job.state != JobState::Completed {
            return Err(HubError::ArtifactUnavailable(format!(
                "job {} is {}",
                job.id,
                job.state.as_str()
            )));
        }
        let bytes = self.client.download_artifact(&job.id).await?;
        tokio::fs::create_dir_all(&self.config.artifacts_dir).await?;
        let sanitized = job.model_ref.replace(['/', ':'], "_");
        let path = self
            .config
            .artifacts_dir
            .join(format!("{}-{}.bin", sanitized, job.kind.as_str()));
        tokio::fs::write(&path, &bytes).await?;
        info!(job_id = %job.id, path = %path.display(), bytes = bytes.len(), "artifact downloaded");
        if let Some(cache) = &self.cache {
            cache.remove(&job.id).await?;
        }
        Ok(path)
    }

    /// Fetch and parse profile statistics for a completed profile job,
    /// persisting them beside the artifacts.
    pub async fn profile_summary(&self, job: &CloudJob) -> HubResult<ProfileSummary> {
        if job.kind != JobKind::Profile || job.state != JobState::Completed {
            return Err(HubError::Validation(format!(
                "job {} is not a completed profile job",
                job.id
            )));
        }
        let remote = self.client.get_job(&job.id).await?;
        let summary = parse_profile(&remote.payload);
        if summary.is_empty() {
            warn!(job_id = %job.id, "profile payload carries no recognizable statistics");
        } else {
            info!(
                job_id = %job.id,
                inference_time_us = ?summary.inference_time_us,
                peak_memory_bytes = ?summary.peak_memory_bytes,
                "profile summary"
            );
            tokio::fs::create_dir_all(&self.config.artifacts_dir).await?;
            let sanitized = job.model_ref.replace(['/', ':'], "_");
            let path = self
                .config
                .artifacts_dir
                .join(format!("{sanitized}.profile.json"));
            tokio::fs::write(&path, serde_json::to_string_pretty(&summary)?).await?;
        }
        Ok(summary)
    }
}

/// Probe a profile payload for latency/memory statistics.
fn parse_profile(payload: &serde_json::Value) -> ProfileSummary {
    let root = payload
        .get("execution_summary")
        .or_else(|| payload.get("profile"))
        .unwrap_or(payload);

    let inference_time_us = ["estimated_inference_time", "execution_time_us", "avg_time_us"]
        .iter()
        .find_map(|key| root.get(key))
        .and_then(|v| v.as_f64());
    let peak_memory_bytes = ["estimated_peak_memory", "peak_memory_bytes"]
        .iter()
        .find_map(|key| root.get(key))
        .and_then(|v| v.as_u64());

    ProfileSummary {
        inference_time_us,
        peak_memory_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHubClient;
    use serde_json::json;
    use vigil_models::{Dtype, JobId, ModelFormat, TensorSpec};

    fn specs(shape: Vec<i64>) -> InputSpec {
        vec![("image".to_string(), TensorSpec::new(shape, Dtype::Float32))]
    }

    fn orchestrator(client: Arc<MockHubClient>, dir: &std::path::Path) -> Orchestrator<MockHubClient> {
        Orchestrator::new(
            client,
            OrchestratorConfig {
                preferred_device: "X Elite".to_string(),
                artifacts_dir: dir.to_path_buf(),
            },
            None,
        )
    }

    /// Dynamic shapes never reach the service.
    #[tokio::test]
    async fn test_dynamic_shape_rejected_before_submission() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockHubClient::new());
        let orch = orchestrator(Arc::clone(&client), dir.path());

        let err = orch
            .submit_compile("m1", &specs(vec![-1, 3, 256, 256]), &SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::DynamicShape(_)));
        assert!(client.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_submit_compile_resolves_device() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockHubClient::new());
        let orch = orchestrator(Arc::clone(&client), dir.path());

        let job = orch
            .submit_compile("m1", &specs(vec![1, 3, 256, 256]), &SubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(job.kind, JobKind::Compile);
        assert_eq!(job.device, "Snapdragon X Elite CRD");
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(client.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("pose.tflite");
        tokio::fs::write(&model_path, b"model-bytes").await.unwrap();
        let client = Arc::new(MockHubClient::new());
        let orch = orchestrator(Arc::clone(&client), dir.path());

        let artifact = ModelArtifact::new(&model_path, ModelFormat::Tflite);
        let model_id = orch.upload_model(&artifact).await.unwrap();
        assert_eq!(model_id, "m-pose.tflite");
    }

    #[tokio::test]
    async fn test_download_requires_completed() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockHubClient::new());
        client.put_artifact("j1", b"artifact".to_vec());
        let orch = orchestrator(Arc::clone(&client), dir.path());

        let mut job = CloudJob::new(JobId::from_string("j1"), JobKind::Compile, "m1", "dev");
        assert!(matches!(
            orch.download_artifact(&job).await,
            Err(HubError::ArtifactUnavailable(_))
        ));

        job.transition(JobState::Queued);
        job.transition(JobState::Completed);
        let path = orch.download_artifact(&job).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"artifact");
    }

    #[tokio::test]
    async fn test_profile_summary_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockHubClient::new());
        client.script_job(
            "j1",
            &[json!({
                "status": "SUCCESS",
                "execution_summary": {
                    "estimated_inference_time": 1234.5,
                    "estimated_peak_memory": 8_388_608,
                },
            })],
        );
        let orch = orchestrator(Arc::clone(&client), dir.path());

        let mut job = CloudJob::new(JobId::from_string("j1"), JobKind::Profile, "m1", "dev");
        job.transition(JobState::Completed);
        let summary = orch.profile_summary(&job).await.unwrap();
        assert_eq!(summary.inference_time_us, Some(1234.5));
        assert_eq!(summary.peak_memory_bytes, Some(8_388_608));
        assert!(dir.path().join("m1.profile.json").exists());
    }

    #[test]
    fn test_parse_profile_fallback_keys() {
        let summary = parse_profile(&json!({"execution_time_us": 42.0}));
        assert_eq!(summary.inference_time_us, Some(42.0));
        assert!(parse_profile(&json!({"nothing": 1})).is_empty());
    }
}
