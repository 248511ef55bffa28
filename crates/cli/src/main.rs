//! logweave — merge a directory tree of multi-line logs into one
//! chronologically ordered file.
//!
//! ```bash
//! logweave -p /var/log/myapp
//! logweave --parent-folder /var/log/myapp --workers 8 --summary-json
//! ```

mod config;
mod discover;
mod logging;
mod workspace;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use engine::Pipeline;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Merge and chronologically order multi-line log files
#[derive(Debug, Parser)]
#[command(name = "logweave")]
#[command(version)]
#[command(about = "Merge and chronologically order multi-line log files")]
struct Cli {
    /// Root folder scanned recursively for *.log and *.log.<N> files
    #[arg(short = 'p', long = "parent-folder", visible_alias = "parentFolder", value_name = "DIR")]
    parent_folder: PathBuf,

    /// Additional configuration file (toml, yaml or json)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of files coalesced concurrently
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Keep per-file, merged and ordered intermediates
    #[arg(long)]
    keep_intermediates: bool,

    /// Print the run summary as JSON instead of the artifact path
    #[arg(long)]
    summary_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_cli();

    let basic_tracing = logging::init_tracing_basic();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(workers) = cli.workers {
        config.pipeline.worker_count = workers;
    }
    if cli.keep_intermediates {
        config.output.keep_intermediates = true;
    }
    config.validate().context("Configuration validation failed")?;

    drop(basic_tracing);
    logging::init_tracing_from_config(&config.logging)?;

    info!("Starting logweave v{}", env!("CARGO_PKG_VERSION"));

    let parent = cli.parent_folder;
    workspace::validate_parent(&parent)?;

    let output_dir = config.output_dir(&parent);
    workspace::prepare_output_dir(&output_dir)?;

    let inputs = discover::discover_logs(&parent, &output_dir)?;
    if inputs.is_empty() {
        println!("No log files found under {}", parent.display());
        return Ok(());
    }
    info!("Found {} log file(s) under {}", inputs.len(), parent.display());

    let pipeline = Pipeline::new(config.pipeline.clone()).context("Failed to build pipeline")?;
    let report = pipeline
        .run(inputs, &output_dir)
        .await
        .context("Pipeline run failed")?;

    let failed = report.failed().count();
    if failed > 0 {
        warn!("{} of {} file(s) could not be processed", failed, report.results.len());
    }

    if !config.output.keep_intermediates {
        let removed = workspace::clean_output_dir(&output_dir, &report.final_path)?;
        info!("Removed {} intermediate file(s)", removed);
    }

    if cli.summary_json {
        let summary = serde_json::to_string_pretty(&report.summary()).context("Failed to serialize run summary")?;
        println!("{}", summary);
    } else {
        println!("{}", report.final_path.display());
    }

    Ok(())
}

/// Parse arguments; usage errors exit 1 like every other failure, while
/// `--help` and `--version` keep clap's exit 0.
fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            // Nothing to recover if stderr is gone
            let _ = e.print();
            std::process::exit(USAGE_EXIT_CODE);
        }
        Err(e) => e.exit(),
    }
}

const USAGE_EXIT_CODE: i32 = 1;
