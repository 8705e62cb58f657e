//! Vigil optimization pipeline CLI.

mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::EXIT_CONFIG;
use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "vigil", version, about = "Edge model optimization pipeline")]
struct Cli {
    /// JSON configuration file (defaults apply when omitted).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover model files under the configured root.
    Scan,
    /// Convert models to ONNX (TFLite with fp16 upcast, TorchScript
    /// under the fixed-shape guard).
    Convert,
    /// Upload models and submit compile jobs.
    Submit {
        /// Also submit a profile job per model.
        #[arg(long)]
        profile: bool,
        /// Submit a quantize job with the given dtype (e.g. int8).
        #[arg(long)]
        quantize: Option<String>,
    },
    /// Wait for outstanding jobs and download artifacts.
    Wait {
        /// Restrict to specific job ids (default: every cached job).
        #[arg(long = "job")]
        jobs: Vec<String>,
        /// Overall deadline in seconds.
        #[arg(long)]
        deadline_secs: Option<u64>,
        /// Cancel outstanding jobs instead of waiting for them.
        #[arg(long)]
        drain: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let code = match cli.command {
        Command::Scan => commands::scan::run(&config).await,
        Command::Convert => commands::convert::run(&config).await,
        Command::Submit { profile, quantize } => {
            commands::submit::run(&config, profile, quantize).await
        }
        Command::Wait {
            jobs,
            deadline_secs,
            drain,
        } => commands::wait::run(&config, jobs, deadline_secs, drain).await,
    };
    ExitCode::from(code)
}
