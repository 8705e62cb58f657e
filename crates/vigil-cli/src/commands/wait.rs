//! `vigil wait` — drive outstanding jobs to a terminal state and pull
//! artifacts.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use vigil_hub::{HttpHubClient, HubClient, JobCache, JobMonitor, MonitorConfig, Orchestrator};
use vigil_models::{JobKind, JobState};

use crate::commands::{EXIT_CONFIG, EXIT_OK, EXIT_PARTIAL};
use crate::config::CliConfig;

pub async fn run(
    config: &CliConfig,
    only_jobs: Vec<String>,
    deadline_secs: Option<u64>,
    drain: bool,
) -> u8 {
    let client = match HttpHubClient::new(config.hub.to_client_config()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("hub client: {e}");
            return EXIT_CONFIG;
        }
    };
    let cache = match JobCache::open(config.job_cache_dir()).await {
        Ok(cache) => cache,
        Err(e) => {
            error!("job cache: {e}");
            return EXIT_CONFIG;
        }
    };

    let mut jobs = match cache.load_all().await {
        Ok(jobs) => jobs,
        Err(e) => {
            error!("cannot load job cache: {e}");
            return EXIT_CONFIG;
        }
    };
    if !only_jobs.is_empty() {
        jobs.retain(|job| only_jobs.iter().any(|id| id == job.id.as_str()));
    }
    if jobs.is_empty() {
        println!("no outstanding jobs");
        return EXIT_OK;
    }

    let monitor = JobMonitor::new(
        Arc::clone(&client),
        MonitorConfig::default(),
        Some(cache.clone()),
    );
    let orchestrator = Orchestrator::new(
        Arc::clone(&client),
        config.orchestrator.clone(),
        Some(cache.clone()),
    );

    // Drain mode: cancel outstanding jobs instead of waiting them out.
    if drain {
        let mut failures = 0usize;
        for job in jobs.iter_mut().filter(|j| !j.state.is_terminal()) {
            match client.cancel_job(&job.id).await {
                Ok(()) => {
                    job.transition(JobState::Cancelled);
                    if let Err(e) = cache.save(job).await {
                        warn!(job_id = %job.id, "failed to cache cancelled job: {e}");
                    }
                    println!("cancelled  {}", job.id);
                }
                Err(e) => {
                    warn!(job_id = %job.id, "cancellation failed: {e}");
                    failures += 1;
                }
            }
        }
        return if failures == 0 { EXIT_OK } else { EXIT_PARTIAL };
    }

    let done = monitor
        .wait_all(jobs, deadline_secs.map(Duration::from_secs))
        .await;

    let mut failures = 0usize;
    for job in &done {
        let note = match job.state {
            JobState::Completed if job.kind != JobKind::Profile => {
                match orchestrator.download_artifact(job).await {
                    Ok(path) => format!("artifact: {}", path.display()),
                    Err(e) => {
                        warn!(job_id = %job.id, "artifact download failed: {e}");
                        failures += 1;
                        format!("artifact download failed: {e}")
                    }
                }
            }
            JobState::Completed => match orchestrator.profile_summary(job).await {
                Ok(summary) => format!(
                    "inference: {:?} us, peak memory: {:?} bytes",
                    summary.inference_time_us, summary.peak_memory_bytes
                ),
                Err(e) => {
                    warn!(job_id = %job.id, "profile readback failed: {e}");
                    String::new()
                }
            },
            _ => {
                failures += 1;
                job.last_error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_default()
            }
        };
        println!(
            "{:9} {:10} {:3}%  {}  {}",
            job.kind.as_str(),
            job.state.as_str(),
            job.progress,
            job.id,
            note
        );
    }

    if failures == 0 {
        EXIT_OK
    } else {
        EXIT_PARTIAL
    }
}
