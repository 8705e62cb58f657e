//! Tracing setup for the CLI.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `VIGIL_LOG` overrides the default
/// `info` filter.
pub fn init() {
    let filter = EnvFilter::try_from_env("VIGIL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
