//! `vigil convert` — batch TFLite→ONNX conversion with the fp16 upcast
//! and TorchScript export guard.

use std::path::Path;

use tracing::{error, info, warn};

use vigil_convert::tflite::{inspect, ModelFlags};
use vigil_convert::{
    scan_models, BatchReport, ConvertError, ModelOutcome, ModelReport, TfliteConverter,
    TorchExporter,
};
use vigil_models::ModelFormat;

use crate::commands::{EXIT_CONFIG, EXIT_OK, EXIT_PARTIAL};
use crate::config::CliConfig;

/// Pre-analysis flags for a failed conversion's report entry; a model
/// that cannot be read or parsed reports empty flags.
async fn pre_analysis(path: &Path) -> ModelFlags {
    match tokio::fs::read(path).await {
        Ok(data) => inspect(&data).unwrap_or_default(),
        Err(_) => ModelFlags::default(),
    }
}

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

    let converter = TfliteConverter::new(config.converter.clone());
    let exporter = match TorchExporter::new(config.torch.clone()) {
        Ok(exporter) => exporter,
        Err(e) => {
            error!("torch exporter configuration: {e}");
            return EXIT_CONFIG;
        }
    };
    let out_dir = config.onnx_dir();
    let mut report = BatchReport::new();

    for artifact in &artifacts {
        match artifact.format {
            ModelFormat::Tflite => {
                let (flags, outcome) = match converter.convert(&artifact.path, &out_dir).await {
                    Ok(conversion) => (
                        conversion.flags,
                        ModelOutcome::Ok {
                            output: conversion.onnx_path,
                            upcast_applied: conversion.upcast_applied,
                        },
                    ),
                    Err(ConvertError::Conversion(classification)) => (
                        pre_analysis(&artifact.path).await,
                        ModelOutcome::Failed { classification },
                    ),
                    Err(e) => {
                        error!(model = %artifact.path.display(), "conversion aborted: {e}");
                        let flags = pre_analysis(&artifact.path).await;
                        let classification = TfliteConverter::classify_log(&e.to_string(), &flags);
                        (flags, ModelOutcome::Failed { classification })
                    }
                };
                report.push(ModelReport {
                    model: artifact.path.clone(),
                    flags,
                    outcome,
                });
            }
            ModelFormat::Pt | ModelFormat::Torchscript => {
                if config.input_specs.is_empty() {
                    warn!(
                        model = %artifact.path.display(),
                        "skipping torch export: no input_specs configured"
                    );
                    continue;
                }
                let output = out_dir.join(format!("{}.onnx", artifact.stem()));
                let outcome = match exporter
                    .export(&artifact.path, &output, &config.input_specs)
                    .await
                {
                    Ok(path) => ModelOutcome::Ok {
                        output: path,
                        upcast_applied: false,
                    },
                    Err(ConvertError::Conversion(classification)) => {
                        ModelOutcome::Failed { classification }
                    }
                    Err(e) => {
                        error!(model = %artifact.path.display(), "export aborted: {e}");
                        ModelOutcome::Failed {
                            classification: TfliteConverter::classify_log(
                                &e.to_string(),
                                &ModelFlags::default(),
                            ),
                        }
                    }
                };
                report.push(ModelReport {
                    model: artifact.path.clone(),
                    // Torch checkpoints carry no TFLite flatbuffer to
                    // pre-analyze.
                    flags: ModelFlags::default(),
                    outcome,
                });
            }
            ModelFormat::Onnx => {
                info!(model = %artifact.path.display(), "already ONNX; nothing to convert");
            }
        }
    }

    let report_path = config.report_path();
    if let Err(e) = report.write(&report_path).await {
        warn!("failed to write report {}: {e}", report_path.display());
    }

    for line in report.summary_lines() {
        println!("{line}");
    }
    println!(
        "{} converted, {} failed ({})",
        report.succeeded(),
        report.failed(),
        report_path.display()
    );

    if report.failed() == 0 {
        EXIT_OK
    } else {
        EXIT_PARTIAL
    }
}
