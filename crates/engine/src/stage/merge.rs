use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::PipelineMetrics;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub files_merged: usize,
    pub files_skipped: usize,
    pub lines: usize,
}

/// Concatenate `inputs` into `output`, in the given order.
///
/// Every line written ends with `\n`, including the last line of an input
/// that lacked one, so two files never fuse at their boundary. Inputs that
/// cannot be read are logged and skipped. Failing to create or write the
/// output is fatal for the stage.
pub fn merge_files(
    inputs: &[PathBuf],
    output: &Path,
    metrics: &PipelineMetrics,
) -> PipelineResult<MergeSummary> {
    let file = File::create(output).map_err(|e| PipelineError::create(output, e))?;
    let mut writer = BufWriter::new(file);
    let mut summary = MergeSummary::default();

    for input in inputs {
        let content = match fs::read(input) {
            Ok(content) => content,
            Err(e) => {
                warn!("Error reading {}, skipping in merge: {}", input.display(), e);
                summary.files_skipped += 1;
                continue;
            }
        };

        let lines = append_terminated(&mut writer, &content).map_err(|e| PipelineError::write(output, e))?;
        debug!(file = %input.display(), lines, "merged");
        summary.files_merged += 1;
        summary.lines += lines;
    }
    writer.flush().map_err(|e| PipelineError::write(output, e))?;

    metrics.add_lines_merged(summary.lines as u64);
    Ok(summary)
}

fn append_terminated<W: Write>(writer: &mut W, content: &[u8]) -> std::io::Result<usize> {
    if content.is_empty() {
        return Ok(0);
    }
    writer.write_all(content)?;
    let mut lines = content.iter().filter(|&&b| b == b'\n').count();
    if content.last() != Some(&b'\n') {
        writer.write_all(b"\n")?;
        lines += 1;
    }
    Ok(lines)
}
