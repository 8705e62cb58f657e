//! `vigil scan` — discover model files.

use tracing::error;

use vigil_convert::{scan_models, ConvertError};

use crate::commands::{EXIT_CONFIG, EXIT_OK, EXIT_PARTIAL};
use crate::config::CliConfig;

pub async fn run(config: &CliConfig) -> u8 {
    let root = config.models_root();
    let artifacts = match scan_models(&root) {
        Ok(artifacts) => artifacts,
        Err(ConvertError::FileNotFound(path)) => {
            error!("models root does not exist: {}", path.display());
            return EXIT_CONFIG;
        }
        Err(e) => {
            error!("scan failed: {e}");
            return EXIT_PARTIAL;
        }
    };

    if artifacts.is_empty() {
        println!("no model files under {}", root.display());
        return EXIT_OK;
    }
    for artifact in &artifacts {
        println!("{:12} {}", artifact.format.as_str(), artifact.path.display());
    }
    println!("{} model file(s)", artifacts.len());
    EXIT_OK
}
