//! Dispatch — fan per-file coalescing out over a bounded worker pool.
//!
//! Each input is handled start to finish by one blocking worker: detect the
//! file's timestamp pattern, reserve a destination name, coalesce. Workers
//! report exactly one outcome each into a shared, lock-protected list. The
//! returned future resolves only after every worker has finished, which is
//! the barrier the merge stage relies on.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::conf::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics::PipelineMetrics;
use crate::pattern::detect::PatternDetector;
use crate::pattern::TimestampPattern;
use crate::records::{coalesce_stream, CoalesceSummary};

/// A successfully coalesced input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalescedFile {
    pub path: PathBuf,
    pub pattern: TimestampPattern,
    pub summary: CoalesceSummary,
}

/// Outcome for one input file.
#[derive(Debug)]
pub struct ProcessingResult {
    pub input: PathBuf,
    pub outcome: Result<CoalescedFile, PipelineError>,
}

impl ProcessingResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn output(&self) -> Option<&Path> {
        self.outcome.as_ref().ok().map(|f| f.path.as_path())
    }
}

/// Coalesce every input into `dest_dir`, at most `config.worker_count` at a
/// time.
///
/// Results come back in input order regardless of completion order, so the
/// merge stage sees a deterministic file sequence. Per-file failures are
/// logged and returned, never propagated.
pub async fn dispatch(
    inputs: Vec<PathBuf>,
    dest_dir: &Path,
    config: Arc<PipelineConfig>,
    metrics: Arc<PipelineMetrics>,
) -> Vec<ProcessingResult> {
    let results: Arc<Mutex<Vec<(usize, ProcessingResult)>>> =
        Arc::new(Mutex::new(Vec::with_capacity(inputs.len())));

    stream::iter(inputs.into_iter().enumerate())
        .map(|(index, input)| {
            let results = Arc::clone(&results);
            let dest_dir = dest_dir.to_path_buf();
            let config = Arc::clone(&config);
            let metrics = Arc::clone(&metrics);

            async move {
                let worker_input = input.clone();
                let worker_metrics = Arc::clone(&metrics);
                let outcome = tokio::task::spawn_blocking(move || {
                    process_file(&worker_input, &dest_dir, &config, &worker_metrics)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(PipelineError::Worker {
                        path: input.clone(),
                        reason: e.to_string(),
                    })
                });

                match &outcome {
                    Ok(file) => {
                        debug!(
                            file = %input.display(),
                            output = %file.path.display(),
                            pattern = %file.pattern,
                            records = file.summary.records,
                            "coalesced"
                        );
                    }
                    Err(e) => warn!("{} was not processed: {}", input.display(), e),
                }
                metrics.record_file(outcome.is_ok());

                results.lock().push((index, ProcessingResult { input, outcome }));
            }
        })
        .buffer_unordered(config.worker_count)
        .collect::<Vec<()>>()
        .await;

    let mut collected = std::mem::take(&mut *results.lock());
    collected.sort_by_key(|(index, _)| *index);
    collected.into_iter().map(|(_, result)| result).collect()
}

/// Detect, reserve, coalesce: the whole job for one input.
pub fn process_file(
    input: &Path,
    dest_dir: &Path,
    config: &PipelineConfig,
    metrics: &PipelineMetrics,
) -> PipelineResult<CoalescedFile> {
    let detector = PatternDetector::new(config.detection_lines)?;
    let pattern = detector
        .detect_file(input)?
        .ok_or_else(|| PipelineError::UnrecognizedPattern(input.to_path_buf()))?;
    let matcher = pattern.compile()?;

    let source = File::open(input).map_err(|e| PipelineError::open(input, e))?;

    let reserved = [
        config.merged_file_name.as_str(),
        config.ordered_file_name.as_str(),
        config.final_file_name.as_str(),
    ];
    let (dest, file) = reserve_unique_path(dest_dir, input, &reserved)?;

    let result = coalesce_stream(
        BufReader::new(source),
        BufWriter::new(file),
        &matcher,
        &config.sentinel,
        input,
        &dest,
        metrics,
    );

    match result {
        Ok(summary) => Ok(CoalescedFile { path: dest, pattern, summary }),
        Err(e) => {
            if let Err(rm) = std::fs::remove_file(&dest) {
                debug!(file = %dest.display(), "could not remove partial output: {}", rm);
            }
            Err(e)
        }
    }
}

/// Create a fresh file in `dest_dir` named after `input`'s base name.
///
/// `app.log` becomes `app.log`, then `app1.log`, `app2.log`, … until a name
/// that neither exists nor is one of the `reserved` stage artifact names is
/// found. Creation uses `create_new`, so two workers racing for the same
/// base name can never end up sharing one file.
pub fn reserve_unique_path(
    dest_dir: &Path,
    input: &Path,
    reserved: &[&str],
) -> PipelineResult<(PathBuf, File)> {
    let base = input.file_name().ok_or_else(|| {
        PipelineError::create(
            input,
            io::Error::new(io::ErrorKind::InvalidInput, "input path has no file name"),
        )
    })?;
    let base_path = Path::new(base);
    let stem = base_path.file_stem().unwrap_or(base);
    let extension = base_path.extension();

    let mut count: u64 = 0;
    loop {
        let name = if count == 0 {
            base.to_os_string()
        } else {
            let mut name = OsString::from(stem);
            name.push(count.to_string());
            if let Some(ext) = extension {
                name.push(".");
                name.push(ext);
            }
            name
        };
        count += 1;

        if reserved.iter().any(|r| name == *r) {
            continue;
        }

        let candidate = dest_dir.join(&name);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(PipelineError::create(candidate, e)),
        }
    }
}
