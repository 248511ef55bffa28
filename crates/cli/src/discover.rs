use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// `name.log` or a rotated `name.log.<digits>`.
pub const LOG_FILE_PATTERN: &str = r"\.log(\.[0-9]+)?$";

/// Compiled file name rule for discovery.
pub struct LogFileFilter {
    matcher: RegexMatcher,
}

impl LogFileFilter {
    pub fn new() -> Result<Self> {
        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(false)
            .multi_line(false)
            .build(LOG_FILE_PATTERN)
            .context("Failed to compile log file name pattern")?;
        Ok(Self { matcher })
    }

    pub fn is_log_file_name(&self, name: &[u8]) -> bool {
        self.matcher.is_match(name).unwrap_or(false)
    }
}

/// Recursively collect log files under `root`, sorted by path.
///
/// The `exclude` directory (the artifact folder) is never descended into.
/// Unreadable entries are logged and skipped.
pub fn discover_logs(root: &Path, exclude: &Path) -> Result<Vec<PathBuf>> {
    let filter = LogFileFilter::new()?;

    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && entry.path() == exclude))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry during discovery: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| filter.is_log_file_name(entry.file_name().as_encoded_bytes()))
        .map(|entry| entry.into_path())
        .collect();

    found.sort();
    debug!(root = %root.display(), count = found.len(), "discovered log files");
    Ok(found)
}
