//! Model — PipelineConfig and its defaults.

use serde::{Deserialize, Serialize};

pub const DEFAULT_WORKER_COUNT: usize = 5;
pub const DEFAULT_SENTINEL: &str = "appTesting";
pub const DEFAULT_DETECTION_LINES: usize = 5;

/// Immutable settings for a single pipeline run.
///
/// Passed by value into [`crate::Pipeline::new`]; nothing in the engine reads
/// process-wide state, so two pipelines with different settings can run side
/// by side (tests do exactly that).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on files coalesced concurrently.
    pub worker_count: usize,
    /// Marker joining continuation lines inside intermediate files.
    pub sentinel: String,
    /// Leading lines sniffed by the pattern detector.
    pub detection_lines: usize,
    pub merged_file_name: String,
    pub ordered_file_name: String,
    pub final_file_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            sentinel: DEFAULT_SENTINEL.to_string(),
            detection_lines: DEFAULT_DETECTION_LINES,
            merged_file_name: "MERGED.log".to_string(),
            ordered_file_name: "MERGED_ORDERED.log".to_string(),
            final_file_name: "FINAL_FORMATTED.log".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be > 0".to_string());
        }
        if self.detection_lines == 0 {
            return Err("detection_lines must be > 0".to_string());
        }
        if self.sentinel.is_empty() {
            return Err("sentinel must not be empty".to_string());
        }
        if self.sentinel.contains(['\n', '\r']) {
            return Err("sentinel must not contain line terminators".to_string());
        }
        if self.sentinel.chars().all(is_timestamp_char) {
            return Err(format!(
                "sentinel must contain a character outside [0-9 :,.-], got: {}",
                self.sentinel
            ));
        }

        let names = [
            ("merged_file_name", &self.merged_file_name),
            ("ordered_file_name", &self.ordered_file_name),
            ("final_file_name", &self.final_file_name),
        ];
        for (key, name) in &names {
            validate_file_name(key, name)?;
        }
        if self.merged_file_name == self.ordered_file_name
            || self.merged_file_name == self.final_file_name
            || self.ordered_file_name == self.final_file_name
        {
            return Err("merged, ordered and final file names must be distinct".to_string());
        }
        Ok(())
    }
}

/// Characters a recognized timestamp is made of. A sentinel built only from
/// these could be found inside the timestamp of every record.
fn is_timestamp_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, ' ' | ':' | ',' | '.' | '-')
}

fn validate_file_name(key: &str, name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(format!("{} must be a bare file name, got: {}", key, name));
    }
    Ok(())
}
