//! In-memory hub client for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use vigil_models::{InputSpec, JobId};

use crate::client::{HubClient, HubDevice, RemoteJobStatus, SubmitOptions};
use crate::error::{HubError, HubResult};

#[derive(Default)]
struct MockState {
    devices: Vec<HubDevice>,
    /// Per job: status strings returned by successive polls; the last
    /// entry repeats forever.
    scripts: HashMap<String, Vec<serde_json::Value>>,
    cursors: HashMap<String, usize>,
    cancelled: Vec<String>,
    uploads: Vec<String>,
    submitted: Vec<String>,
    artifacts: HashMap<String, Vec<u8>>,
    next_job: u32,
    /// Upload failures to inject before succeeding.
    upload_transient_failures: u32,
}

/// A scripted hub client.
pub struct MockHubClient {
    state: Mutex<MockState>,
}

impl Default for MockHubClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHubClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                devices: vec![HubDevice {
                    name: "Snapdragon X Elite CRD".to_string(),
                    os: "linux".to_string(),
                    attributes: vec!["npu".to_string()],
                }],
                ..Default::default()
            }),
        }
    }

    pub fn with_devices(self, devices: Vec<HubDevice>) -> Self {
        self.state.lock().unwrap().devices = devices;
        self
    }

    /// Script the poll responses for a job id. Entries may be bare
    /// status strings or full payload objects with a `status` key.
    pub fn script_job(&self, job_id: &str, statuses: &[serde_json::Value]) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(job_id.to_string(), statuses.to_vec());
    }

    pub fn put_artifact(&self, job_id: &str, bytes: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .artifacts
            .insert(job_id.to_string(), bytes);
    }

    /// Make the next `n` uploads fail with a transient error.
    pub fn fail_uploads_transiently(&self, n: u32) {
        self.state.lock().unwrap().upload_transient_failures = n;
    }

    pub fn cancel_count(&self, job_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .cancelled
            .iter()
            .filter(|id| id.as_str() == job_id)
            .count()
    }

    pub fn poll_count(&self, job_id: &str) -> usize {
        self.state.lock().unwrap().cursors.get(job_id).copied().unwrap_or(0)
    }

    pub fn uploads(&self) -> Vec<String> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn submissions(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    fn new_job(&self, kind: &str) -> JobId {
        let mut state = self.state.lock().unwrap();
        state.next_job += 1;
        let id = format!("j{:05}", state.next_job);
        state.submitted.push(format!("{kind}:{id}"));
        JobId::from_string(id)
    }
}

#[async_trait]
impl HubClient for MockHubClient {
    async fn list_devices(&self) -> HubResult<Vec<HubDevice>> {
        Ok(self.state.lock().unwrap().devices.clone())
    }

    async fn upload_model(&self, name: &str, _bytes: Vec<u8>) -> HubResult<String> {
        let mut state = self.state.lock().unwrap();
        if state.upload_transient_failures > 0 {
            state.upload_transient_failures -= 1;
            return Err(HubError::Transient("injected upload failure".to_string()));
        }
        let model_id = format!("m-{name}");
        state.uploads.push(model_id.clone());
        Ok(model_id)
    }

    async fn submit_compile(
        &self,
        _model_id: &str,
        _device: &HubDevice,
        _input_specs: &InputSpec,
        _opts: &SubmitOptions,
    ) -> HubResult<JobId> {
        Ok(self.new_job("compile"))
    }

    async fn submit_profile(&self, _model_id: &str, _device: &HubDevice) -> HubResult<JobId> {
        Ok(self.new_job("profile"))
    }

    async fn submit_link(&self, _model_ids: &[String], _opts: &SubmitOptions) -> HubResult<JobId> {
        Ok(self.new_job("link"))
    }

    async fn submit_quantize(&self, _model_id: &str, _dtype: &str) -> HubResult<JobId> {
        Ok(self.new_job("quantize"))
    }

    async fn get_job(&self, job_id: &JobId) -> HubResult<RemoteJobStatus> {
        let mut state = self.state.lock().unwrap();
        let script = state
            .scripts
            .get(job_id.as_str())
            .cloned()
            .ok_or_else(|| HubError::UnknownJob(job_id.to_string()))?;
        let cursor = state.cursors.entry(job_id.to_string()).or_insert(0);
        let entry = script
            .get(*cursor)
            .or_else(|| script.last())
            .cloned()
            .unwrap_or_else(|| json!("PENDING"));
        *cursor += 1;

        let (status, payload) = match &entry {
            serde_json::Value::String(s) => (s.clone(), json!({ "status": s })),
            other => (
                other
                    .get("status")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                other.clone(),
            ),
        };
        let progress = payload.get("progress").and_then(|v| v.as_u64()).map(|p| p as u8);
        Ok(RemoteJobStatus {
            status,
            progress,
            payload,
        })
    }

    async fn cancel_job(&self, job_id: &JobId) -> HubResult<()> {
        self.state.lock().unwrap().cancelled.push(job_id.to_string());
        Ok(())
    }

    async fn download_artifact(&self, job_id: &JobId) -> HubResult<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .artifacts
            .get(job_id.as_str())
            .cloned()
            .ok_or_else(|| HubError::ArtifactUnavailable(job_id.to_string()))
    }
}
