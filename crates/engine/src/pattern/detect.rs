//! Timestamp pattern detection: sniff the leading lines of a stream.
//!
//! Runs once per input file before coalescing, and once more on the merged
//! stream before ordering. The result is never revisited mid-stream.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{TimestampMatcher, TimestampPattern};
use crate::error::{PipelineError, PipelineResult};

/// Both recognized patterns, compiled once and tried in detection order.
pub struct PatternDetector {
    matchers: Vec<TimestampMatcher>,
    max_lines: usize,
}

impl PatternDetector {
    pub fn new(max_lines: usize) -> PipelineResult<Self> {
        let matchers = TimestampPattern::ALL
            .iter()
            .map(|p| p.compile())
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Self { matchers, max_lines })
    }

    /// First recognized pattern among the first `max_lines` lines.
    ///
    /// Each line is tried against the comma form before the period form.
    /// This is a sniff, not a grammar check: later lines are never looked at.
    pub fn detect<'a, I>(&self, lines: I) -> Option<TimestampPattern>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        lines.into_iter().take(self.max_lines).find_map(|line| {
            self.matchers
                .iter()
                .find(|m| m.is_match(line))
                .map(|m| m.pattern())
        })
    }

    /// Open `path` and sniff its leading lines.
    ///
    /// `Ok(None)` means the file was readable but nothing matched; an
    /// unreadable file is an error.
    pub fn detect_file(&self, path: &Path) -> PipelineResult<Option<TimestampPattern>> {
        let file = File::open(path).map_err(|e| PipelineError::open(path, e))?;
        let mut reader = BufReader::new(file);

        let mut lines: Vec<Vec<u8>> = Vec::with_capacity(self.max_lines);
        let mut buf = Vec::new();
        while lines.len() < self.max_lines {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).map_err(|source| PipelineError::Read {
                path: path.to_path_buf(),
                line: lines.len() + 1,
                source,
            })?;
            if read == 0 {
                break;
            }
            lines.push(std::mem::take(&mut buf));
        }

        Ok(self.detect(lines.iter().map(|l| l.as_slice())))
    }
}

/// Convenience wrapper for one-off detection over in-memory lines.
pub fn detect_pattern<'a, I>(lines: I, max_lines: usize) -> PipelineResult<Option<TimestampPattern>>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    Ok(PatternDetector::new(max_lines)?.detect(lines))
}

/// Convenience wrapper for one-off detection over a file.
pub fn detect_file(path: &Path, max_lines: usize) -> PipelineResult<Option<TimestampPattern>> {
    PatternDetector::new(max_lines)?.detect_file(path)
}
