//! Reqwest-backed hub client.
//!
//! Transient failures (network, 429, 5xx) are retried with exponential
//! backoff: 1 s base, doubling to a 30 s cap, at most 5 attempts.
//! Validation failures (other 4xx) surface immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use vigil_models::{InputSpec, JobId};

use crate::client::{HubClient, HubDevice, RemoteJobStatus, SubmitOptions};
use crate::error::{HubError, HubResult};

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HubClientConfig {
    pub base_url: String,
    pub api_token: String,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for HubClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hub.example.com/api/v1".to_string(),
            api_token: String::new(),
            request_timeout: Duration::from_secs(120),
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

impl HubClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("VIGIL_HUB_URL").unwrap_or(defaults.base_url),
            api_token: std::env::var("VIGIL_HUB_TOKEN").unwrap_or_default(),
            request_timeout: Duration::from_secs(
                std::env::var("VIGIL_HUB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            ..defaults
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self.backoff_base.saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.backoff_cap)
    }
}

/// Hub client over HTTP.
pub struct HttpHubClient {
    http: Client,
    config: HubClientConfig,
}

impl HttpHubClient {
    pub fn new(config: HubClientConfig) -> HubResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(HubError::from)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> HubResult<Self> {
        Self::new(HubClientConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Run a request factory with the transient-retry policy.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> HubResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = HubResult<T>>,
    {
        let mut last_error = None;
        for attempt in 0..self.config.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.config.max_attempts => {
                    let delay = self.config.backoff_delay(attempt);
                    warn!(attempt = attempt + 1, ?delay, "transient hub error, retrying: {e}");
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| HubError::Transient("retries exhausted".to_string())))
    }

    async fn json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> HubResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::from_status(status.as_u16(), body));
        }
        Ok(response.json().await?)
    }

    async fn post_json(&self, path: &str, body: serde_json::Value) -> HubResult<serde_json::Value> {
        self.with_retry(|| async {
            let response = self
                .http
                .post(self.url(path))
                .bearer_auth(&self.config.api_token)
                .json(&body)
                .send()
                .await?;
            Self::json_response(response).await
        })
        .await
    }

    fn job_id_from(value: &serde_json::Value) -> HubResult<JobId> {
        value
            .get("job_id")
            .and_then(|v| v.as_str())
            .map(JobId::from_string)
            .ok_or_else(|| HubError::Validation("response carries no job_id".to_string()))
    }
}

#[async_trait]
impl HubClient for HttpHubClient {
    async fn list_devices(&self) -> HubResult<Vec<HubDevice>> {
        self.with_retry(|| async {
            let response = self
                .http
                .get(self.url("devices"))
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            Self::json_response(response).await
        })
        .await
    }

    async fn upload_model(&self, name: &str, bytes: Vec<u8>) -> HubResult<String> {
        debug!(name, size = bytes.len(), "uploading model");
        let value = self
            .with_retry(|| async {
                let part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(name.to_string());
                let form = reqwest::multipart::Form::new().part("model", part);
                let response = self
                    .http
                    .post(self.url("models"))
                    .bearer_auth(&self.config.api_token)
                    .multipart(form)
                    .send()
                    .await?;
                Self::json_response::<serde_json::Value>(response).await
            })
            .await?;
        value
            .get("model_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| HubError::Validation("response carries no model_id".to_string()))
    }

    async fn submit_compile(
        &self,
        model_id: &str,
        device: &HubDevice,
        input_specs: &InputSpec,
        opts: &SubmitOptions,
    ) -> HubResult<JobId> {
        let specs: serde_json::Map<String, serde_json::Value> = input_specs
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    json!({ "shape": spec.shape, "dtype": spec.dtype.as_str() }),
                )
            })
            .collect();
        let body = json!({
            "model_id": model_id,
            "device": device.name,
            "input_specs": specs,
            "options": opts.options,
        });
        Self::job_id_from(&self.post_json("jobs/compile", body).await?)
    }

    async fn submit_profile(&self, model_id: &str, device: &HubDevice) -> HubResult<JobId> {
        let body = json!({ "model_id": model_id, "device": device.name });
        Self::job_id_from(&self.post_json("jobs/profile", body).await?)
    }

    async fn submit_link(&self, model_ids: &[String], opts: &SubmitOptions) -> HubResult<JobId> {
        let body = json!({ "model_ids": model_ids, "options": opts.options });
        Self::job_id_from(&self.post_json("jobs/link", body).await?)
    }

    async fn submit_quantize(&self, model_id: &str, dtype: &str) -> HubResult<JobId> {
        let body = json!({ "model_id": model_id, "dtype": dtype });
        Self::job_id_from(&self.post_json("jobs/quantize", body).await?)
    }

    async fn get_job(&self, job_id: &JobId) -> HubResult<RemoteJobStatus> {
        let value: serde_json::Value = self
            .with_retry(|| async {
                let response = self
                    .http
                    .get(self.url(&format!("jobs/{job_id}")))
                    .bearer_auth(&self.config.api_token)
                    .send()
                    .await?;
                Self::json_response(response).await
            })
            .await?;
        let status = value
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let progress = value
            .get("progress")
            .and_then(|v| v.as_u64())
            .map(|p| p.min(100) as u8);
        Ok(RemoteJobStatus {
            status,
            progress,
            payload: value,
        })
    }

    async fn cancel_job(&self, job_id: &JobId) -> HubResult<()> {
        // Cancellation is best-effort; do not retry a 4xx.
        let response = self
            .http
            .post(self.url(&format!("jobs/{job_id}/cancel")))
            .bearer_auth(&self.config.api_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::from_status(status.as_u16(), body));
        }
        Ok(())
    }

    async fn download_artifact(&self, job_id: &JobId) -> HubResult<Vec<u8>> {
        self.with_retry(|| async {
            let response = self
                .http
                .get(self.url(&format!("jobs/{job_id}/artifact")))
                .bearer_auth(&self.config.api_token)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(HubError::from_status(status.as_u16(), body));
            }
            Ok(response.bytes().await?.to_vec())
        })
        .await
    }
}
