//! Pipeline — dispatch, merge, order, expand.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::conf::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::pattern::detect::PatternDetector;
use crate::pattern::TimestampPattern;
use crate::records::expand_stream;
use crate::stage::{dispatch, merge_files, order_file, MergeSummary, ProcessingResult};

/// One configured pipeline. Cheap to share; several may run side by side
/// with different configurations.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunReport {
    pub results: Vec<ProcessingResult>,
    pub merge: MergeSummary,
    /// Pattern detected for the merged stream; `None` means ordering ran in
    /// passthrough mode.
    pub merged_pattern: Option<TimestampPattern>,
    pub merged_path: PathBuf,
    pub ordered_path: PathBuf,
    pub final_path: PathBuf,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<TimestampPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Serializable view of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files: Vec<FileSummary>,
    pub merged_pattern: Option<TimestampPattern>,
    pub final_path: PathBuf,
    pub metrics: MetricsSnapshot,
}

struct StageOutput {
    merge: MergeSummary,
    merged_pattern: Option<TimestampPattern>,
    merged_path: PathBuf,
    ordered_path: PathBuf,
    final_path: PathBuf,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn summary(&self) -> RunSummary {
        let files = self
            .results
            .iter()
            .map(|r| match &r.outcome {
                Ok(file) => FileSummary {
                    input: r.input.clone(),
                    output: Some(file.path.clone()),
                    pattern: Some(file.pattern),
                    error: None,
                },
                Err(e) => FileSummary {
                    input: r.input.clone(),
                    output: None,
                    pattern: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        RunSummary {
            files,
            merged_pattern: self.merged_pattern,
            final_path: self.final_path.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::Config)?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage over `inputs`, writing into `dest_dir`.
    ///
    /// Per-file failures end up in [`RunReport::results`]. An `Err` means a
    /// stage artifact (merged, ordered or final file) could not be produced.
    pub async fn run(&self, inputs: Vec<PathBuf>, dest_dir: &Path) -> PipelineResult<RunReport> {
        let metrics = Arc::new(PipelineMetrics::new());

        info!(
            "Coalescing {} file(s) into {} with {} worker(s)",
            inputs.len(),
            dest_dir.display(),
            self.config.worker_count
        );
        let results = dispatch(inputs, dest_dir, Arc::clone(&self.config), Arc::clone(&metrics)).await;

        let produced: Vec<PathBuf> = results
            .iter()
            .filter_map(|r| r.output().map(Path::to_path_buf))
            .collect();
        info!(
            "Coalesced {} of {} file(s)",
            produced.len(),
            results.len()
        );

        let config = Arc::clone(&self.config);
        let stage_metrics = Arc::clone(&metrics);
        let dest = dest_dir.to_path_buf();
        let stages = tokio::task::spawn_blocking(move || run_stages(&config, &produced, &dest, &stage_metrics))
            .await
            .map_err(|e| PipelineError::Worker {
                path: dest_dir.to_path_buf(),
                reason: e.to_string(),
            })??;

        Ok(RunReport {
            results,
            merge: stages.merge,
            merged_pattern: stages.merged_pattern,
            merged_path: stages.merged_path,
            ordered_path: stages.ordered_path,
            final_path: stages.final_path,
            metrics: metrics.snapshot(),
        })
    }
}

/// The single-threaded tail of a run, after the dispatch barrier.
fn run_stages(
    config: &PipelineConfig,
    produced: &[PathBuf],
    dest_dir: &Path,
    metrics: &PipelineMetrics,
) -> PipelineResult<StageOutput> {
    let merged_path = dest_dir.join(&config.merged_file_name);
    let ordered_path = dest_dir.join(&config.ordered_file_name);
    let final_path = dest_dir.join(&config.final_file_name);

    let merge = merge_files(produced, &merged_path, metrics).map_err(log_stage_failure)?;
    info!(
        file = %merged_path.display(),
        files = merge.files_merged,
        lines = merge.lines,
        "Merged coalesced files"
    );

    let detector = PatternDetector::new(config.detection_lines)?;
    let merged_pattern = detector.detect_file(&merged_path).map_err(log_stage_failure)?;
    let matcher = match merged_pattern {
        Some(pattern) => {
            info!("Detected {} timestamp pattern in merged stream", pattern);
            Some(pattern.compile()?)
        }
        None => {
            warn!(
                "Could not detect date pattern in {}; lines are kept in merge order",
                merged_path.display()
            );
            None
        }
    };

    let ordered = order_file(&merged_path, &ordered_path, matcher.as_ref(), metrics).map_err(log_stage_failure)?;
    info!(file = %ordered_path.display(), lines = ordered, "Ordered merged stream");

    let source = File::open(&ordered_path).map_err(|e| log_stage_failure(PipelineError::open(&ordered_path, e)))?;
    let target = File::create(&final_path).map_err(|e| log_stage_failure(PipelineError::create(&final_path, e)))?;
    let expanded = expand_stream(
        BufReader::new(source),
        BufWriter::new(target),
        matcher.as_ref(),
        &config.sentinel,
        &ordered_path,
        &final_path,
        metrics,
    )
    .map_err(log_stage_failure)?;
    info!(file = %final_path.display(), lines = expanded, "Wrote final artifact");

    Ok(StageOutput {
        merge,
        merged_pattern,
        merged_path,
        ordered_path,
        final_path,
    })
}

fn log_stage_failure(e: PipelineError) -> PipelineError {
    error!("{}", e);
    e
}
