//! `vigil submit` — upload models and submit optimization jobs.

use std::sync::Arc;

use tracing::{error, info};

use vigil_convert::{scan_models, ConvertError};
use vigil_hub::{HttpHubClient, JobCache, Orchestrator, SubmitOptions};
use vigil_models::ModelFormat;

use crate::commands::{EXIT_CONFIG, EXIT_OK, EXIT_PARTIAL};
use crate::config::CliConfig;

pub async fn run(config: &CliConfig, profile: bool, quantize: Option<String>) -> u8 {
    if config.input_specs.is_empty() {
        error!("submit requires input_specs in the configuration");
        return EXIT_CONFIG;
    }

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
    let uploadable: Vec<_> = artifacts
        .iter()
        .filter(|a| matches!(a.format, ModelFormat::Onnx | ModelFormat::Tflite))
        .collect();
    if uploadable.is_empty() {
        println!("nothing to submit under {}", root.display());
        return EXIT_OK;
    }

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
    let orchestrator = Orchestrator::new(client, config.orchestrator.clone(), Some(cache));

    let total = uploadable.len();
    let mut failures = 0usize;
    for artifact in uploadable {
        let result = async {
            let model_id = orchestrator.upload_model(artifact).await?;
            let compile = orchestrator
                .submit_compile(&model_id, &config.input_specs, &SubmitOptions::default())
                .await?;
            println!("compile   {}  {}", compile.id, artifact.path.display());
            if profile {
                let job = orchestrator.submit_profile(&model_id).await?;
                println!("profile   {}  {}", job.id, artifact.path.display());
            }
            if let Some(dtype) = &quantize {
                let job = orchestrator.submit_quantize(&model_id, dtype).await?;
                println!("quantize  {}  {}", job.id, artifact.path.display());
            }
            Ok::<_, vigil_hub::HubError>(())
        }
        .await;

        if let Err(e) = result {
            error!(model = %artifact.path.display(), "submission failed: {e}");
            failures += 1;
        }
    }

    info!(
        submitted = total - failures,
        failed = failures,
        "submission pass complete"
    );
    if failures == 0 {
        EXIT_OK
    } else {
        EXIT_PARTIAL
    }
}
