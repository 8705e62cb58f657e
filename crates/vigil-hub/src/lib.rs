//! Cloud job orchestration.
//!
//! `HubClient` is the abstract surface over the optimization service:
//! list devices, upload models, submit compile/profile/link/quantize
//! jobs, poll, cancel, download. The orchestrator validates and submits
//! work; the monitor owns the job state machine: backoff-jittered
//! polling, status normalization, per-kind deadlines with cancellation,
//! and batch waiting. Observed states are cached on disk so a restart
//! resumes without re-polling terminal jobs.

pub mod cache;
pub mod client;
pub mod device;
pub mod error;
pub mod http;
pub mod mock;
pub mod monitor;
pub mod orchestrator;

pub use cache::JobCache;
pub use client::{HubClient, HubDevice, RemoteJobStatus, SubmitOptions};
pub use device::{select_device, DeviceMatch};
pub use error::{HubError, HubResult};
pub use http::{HttpHubClient, HubClientConfig};
pub use mock::MockHubClient;
pub use monitor::{JobMonitor, MonitorConfig};
pub use orchestrator::{Orchestrator, OrchestratorConfig, ProfileSummary};
