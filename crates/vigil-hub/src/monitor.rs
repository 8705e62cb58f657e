//! Job state monitoring.
//!
//! Backoff-jittered polling with reset on state change, server status
//! normalization, per-kind deadlines with one cancellation attempt, and
//! batch waiting over a fixed poller pool.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use vigil_models::{CloudJob, JobState};

use crate::cache::JobCache;
use crate::client::HubClient;
use crate::error::{HubError, HubResult};

/// Ranked payload fields probed for a user-visible failure reason.
const ERROR_FIELDS: &[&str] = &[
    "status.message",
    "failure_reason",
    "status.error",
    "details",
    "metadata",
];

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// First poll interval; also the value restored on any state change.
    pub initial_poll: Duration,
    pub backoff_factor: f64,
    pub poll_cap: Duration,
    /// Relative jitter added to each sleep (0.1 = up to +10%).
    pub jitter: f64,
    /// Poller pool size for `wait_all`.
    pub pollers: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            initial_poll: Duration::from_secs(2),
            backoff_factor: 1.5,
            poll_cap: Duration::from_secs(30),
            jitter: 0.1,
            pollers: 4,
        }
    }
}

/// Extract the first non-empty ranked error field from a payload.
pub fn extract_error_message(payload: &serde_json::Value) -> Option<String> {
    for path in ERROR_FIELDS {
        let mut value = Some(payload);
        for segment in path.split('.') {
            value = value.and_then(|v| v.get(segment));
        }
        match value {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(serde_json::Value::Null) | None => continue,
            Some(other) => {
                let rendered = other.to_string();
                if rendered != "{}" && rendered != "[]" && rendered != "\"\"" {
                    return Some(rendered);
                }
            }
        }
    }
    None
}

/// Watches jobs until they reach a terminal state.
pub struct JobMonitor<C: HubClient> {
    client: Arc<C>,
    config: MonitorConfig,
    cache: Option<JobCache>,
}

impl<C: HubClient> Clone for JobMonitor<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<C: HubClient + 'static> JobMonitor<C> {
    pub fn new(client: Arc<C>, config: MonitorConfig, cache: Option<JobCache>) -> Self {
        Self {
            client,
            config,
            cache,
        }
    }

    async fn save(&self, job: &CloudJob) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(job).await {
                warn!(job_id = %job.id, "failed to cache job state: {e}");
            }
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let jitter = if self.config.jitter > 0.0 {
            rand::thread_rng().gen_range(0.0..self.config.jitter)
        } else {
            0.0
        };
        delay.mul_f64(1.0 + jitter)
    }

    /// Poll one job to a terminal state, enforcing its deadline.
    ///
    /// Already-terminal jobs return immediately without touching the
    /// service. On deadline, cancellation is attempted exactly once and
    /// the job is marked `Timeout` regardless of the cancel outcome.
    pub async fn monitor_job(&self, job: &mut CloudJob) -> HubResult<JobState> {
        if job.state.is_terminal() {
            debug!(job_id = %job.id, state = job.state.as_str(), "job already terminal");
            return Ok(job.state);
        }

        let deadline = Instant::now() + job.deadline();
        let mut delay = self.config.initial_poll;

        loop {
            match self.client.get_job(&job.id).await {
                Ok(remote) => {
                    let changed = match JobState::parse_server_status(&remote.status) {
                        Some(next) => job.transition(next),
                        None => {
                            warn!(
                                job_id = %job.id,
                                status = %remote.status,
                                "unknown server status; keeping current state"
                            );
                            false
                        }
                    };
                    if let Some(progress) = remote.progress {
                        job.progress = job.progress.max(progress.min(100));
                    }
                    if job.state == JobState::Failed && job.last_error.is_none() {
                        let message = extract_error_message(&remote.payload)
                            .unwrap_or_else(|| "job failed without a reported reason".to_string());
                        job.set_error(message, Some(remote.payload.clone()));
                    }
                    self.save(job).await;

                    if job.state.is_terminal() {
                        info!(
                            job_id = %job.id,
                            state = job.state.as_str(),
                            "job reached terminal state"
                        );
                        return Ok(job.state);
                    }

                    delay = if changed {
                        self.config.initial_poll
                    } else {
                        delay.mul_f64(self.config.backoff_factor).min(self.config.poll_cap)
                    };
                }
                Err(e) if e.is_retryable() => {
                    warn!(job_id = %job.id, "transient poll failure: {e}");
                    delay = delay.mul_f64(self.config.backoff_factor).min(self.config.poll_cap);
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                return self.force_timeout(job).await;
            }
            let sleep_for = self.jittered(delay).min(deadline - now);
            tokio::time::sleep(sleep_for).await;
            if Instant::now() >= deadline {
                return self.force_timeout(job).await;
            }
        }
    }

    /// One cancellation attempt, then mark the job timed out.
    async fn force_timeout(&self, job: &mut CloudJob) -> HubResult<JobState> {
        warn!(job_id = %job.id, "job deadline elapsed; attempting cancellation");
        if let Err(e) = self.client.cancel_job(&job.id).await {
            warn!(job_id = %job.id, "cancellation failed: {e}");
        }
        job.set_error(
            format!("deadline exceeded after {}s", job.deadline_secs),
            None,
        );
        job.transition(JobState::Timeout);
        self.save(job).await;
        Ok(JobState::Timeout)
    }

    /// Wait for every job to reach a terminal state, or for the overall
    /// deadline to pass. Jobs are distributed over a fixed poller pool;
    /// each job is owned by exactly one poller at a time. Returns jobs
    /// in their input order with their final observed state.
    pub async fn wait_all(
        &self,
        jobs: Vec<CloudJob>,
        overall_deadline: Option<Duration>,
    ) -> Vec<CloudJob> {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }
        let started = Instant::now();
        let queue: Arc<tokio::sync::Mutex<VecDeque<(usize, CloudJob)>>> =
            Arc::new(tokio::sync::Mutex::new(jobs.into_iter().enumerate().collect()));
        let (tx, mut rx) = tokio::sync::mpsc::channel::<(usize, CloudJob)>(total);

        let workers = self.config.pollers.max(1).min(total);
        for _ in 0..workers {
            let monitor = self.clone();
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            tokio::spawn(async move {
                loop {
                    let Some((index, mut job)) = queue.lock().await.pop_front() else {
                        break;
                    };
                    let remaining = overall_deadline
                        .map(|d| d.saturating_sub(started.elapsed()));
                    let outcome = match remaining {
                        Some(left) if left.is_zero() => Ok(job.state),
                        Some(left) => {
                            match tokio::time::timeout(left, monitor.monitor_job(&mut job)).await {
                                Ok(result) => result,
                                Err(_) => Ok(job.state), // overall deadline hit
                            }
                        }
                        None => monitor.monitor_job(&mut job).await,
                    };
                    if let Err(e) = outcome {
                        warn!(job_id = %job.id, "monitoring failed: {e}");
                        job.set_error(e.to_string(), None);
                    }
                    if tx.send((index, job)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut results: Vec<Option<CloudJob>> = (0..total).map(|_| None).collect();
        while let Some((index, job)) = rx.recv().await {
            results[index] = Some(job);
        }
        results.into_iter().flatten().collect()
    }
}
