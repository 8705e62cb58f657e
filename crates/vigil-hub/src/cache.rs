//! On-disk job cache: one `<job-id>.json` per job, rewritten on every
//! observed transition. Used to resume monitoring after a restart.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use vigil_models::{CloudJob, JobId};

use crate::error::{HubError, HubResult};

/// Directory of last-observed job states.
#[derive(Debug, Clone)]
pub struct JobCache {
    dir: PathBuf,
}

impl JobCache {
    /// Open (and create) the cache directory.
    pub async fn open(dir: impl AsRef<Path>) -> HubResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(format!("{job_id}.json"))
    }

    /// Persist the job's current state.
    pub async fn save(&self, job: &CloudJob) -> HubResult<()> {
        let payload = serde_json::to_string_pretty(job)?;
        tokio::fs::write(self.path_for(&job.id), payload).await?;
        debug!(job_id = %job.id, state = job.state.as_str(), "job cached");
        Ok(())
    }

    /// Load one job, if cached.
    pub async fn load(&self, job_id: &JobId) -> HubResult<Option<CloudJob>> {
        match tokio::fs::read_to_string(self.path_for(job_id)).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HubError::Io(e)),
        }
    }

    /// Load every cached job; unreadable entries are skipped with a
    /// warning.
    pub async fn load_all(&self) -> HubResult<Vec<CloudJob>> {
        let mut jobs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => match serde_json::from_str(&contents) {
                    Ok(job) => jobs.push(job),
                    Err(e) => warn!(path = %path.display(), "skipping bad cache entry: {e}"),
                },
                Err(e) => warn!(path = %path.display(), "skipping unreadable cache entry: {e}"),
            }
        }
        jobs.sort_by(|a: &CloudJob, b: &CloudJob| a.submitted_at.cmp(&b.submitted_at));
        Ok(jobs)
    }

    /// Drop a job from the cache (after artifact download).
    pub async fn remove(&self, job_id: &JobId) -> HubResult<()> {
        match tokio::fs::remove_file(self.path_for(job_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HubError::Io(e)),
        }
    }
}
