use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::PipelineMetrics;
use crate::pattern::TimestampMatcher;

enum GroupAction {
    FlushAndStartNew,
    AddToCurrent,
    StartNew,
    Orphan,
}

/// One physical line of a coalesced intermediate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoalescedRecord {
    /// A timestamped line, followed by zero or more sentinel-joined
    /// continuation fragments in encounter order.
    Record(Vec<u8>),
    /// An untimestamped line seen before the first record of the file.
    /// Passed through untouched and never joined with anything.
    Orphan(Vec<u8>),
}

impl CoalescedRecord {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            CoalescedRecord::Record(b) | CoalescedRecord::Orphan(b) => b,
        }
    }
}

/// Joins wrapped continuation lines onto the record that owns them.
///
/// A line matching the stream's timestamp pattern (anywhere in the line)
/// starts a new record; anything else is appended to the pending record
/// behind the sentinel. The sentinel is not escaped: continuation text that
/// already contains it will be split apart again on expansion.
pub struct RecordCoalescer<'m> {
    matcher: &'m TimestampMatcher,
    sentinel: Vec<u8>,
    pending: Option<Vec<u8>>,
    continuations: usize,
}

impl<'m> RecordCoalescer<'m> {
    pub fn new(matcher: &'m TimestampMatcher, sentinel: &str) -> Self {
        Self {
            matcher,
            sentinel: sentinel.as_bytes().to_vec(),
            pending: None,
            continuations: 0,
        }
    }

    /// Feed one physical line (line terminator already stripped).
    /// Returns the record that became complete, if any.
    pub fn process(&mut self, line: &[u8]) -> Option<CoalescedRecord> {
        let action = if self.matcher.is_match(line) {
            if self.pending.is_some() {
                GroupAction::FlushAndStartNew
            } else {
                GroupAction::StartNew
            }
        } else if self.pending.is_some() {
            GroupAction::AddToCurrent
        } else {
            GroupAction::Orphan
        };

        match action {
            GroupAction::FlushAndStartNew => {
                let complete = self.flush();
                self.pending = Some(line.to_vec());
                complete
            }
            GroupAction::AddToCurrent => {
                if let Some(ref mut group) = self.pending {
                    group.extend_from_slice(&self.sentinel);
                    group.extend_from_slice(line);
                    self.continuations += 1;
                }
                None
            }
            GroupAction::StartNew => {
                self.pending = Some(line.to_vec());
                None
            }
            GroupAction::Orphan => {
                tracing::trace!("coalesce: line precedes first record, passing through");
                Some(CoalescedRecord::Orphan(line.to_vec()))
            }
        }
    }

    /// Continuation lines joined so far.
    pub fn continuations(&self) -> usize {
        self.continuations
    }

    /// Flush the pending record (call at end of input).
    pub fn flush(&mut self) -> Option<CoalescedRecord> {
        self.pending.take().map(CoalescedRecord::Record)
    }
}

/// Line and record counts for one coalesced file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoalesceSummary {
    pub lines_read: usize,
    pub records: usize,
    pub continuations: usize,
    pub orphans: usize,
}

/// Strip every trailing `\r` / `\n`.
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b'\n' && b != b'\r')
        .map(|p| p + 1)
        .unwrap_or(0);
    &line[..end]
}

/// Coalesce an in-memory sequence of physical lines.
pub fn coalesce_lines<'a, I>(lines: I, matcher: &TimestampMatcher, sentinel: &str) -> Vec<CoalescedRecord>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut coalescer = RecordCoalescer::new(matcher, sentinel);
    let mut out: Vec<CoalescedRecord> = lines
        .into_iter()
        .filter_map(|line| coalescer.process(trim_line_ending(line)))
        .collect();
    out.extend(coalescer.flush());
    out
}

/// Stream `reader` through a [`RecordCoalescer`] into `writer`, one record
/// per output line.
///
/// `source` and `dest` only label errors. Read failures fail the whole file,
/// as do write failures.
pub fn coalesce_stream<R: BufRead, W: Write>(
    mut reader: R,
    mut writer: W,
    matcher: &TimestampMatcher,
    sentinel: &str,
    source: &Path,
    dest: &Path,
    metrics: &PipelineMetrics,
) -> PipelineResult<CoalesceSummary> {
    let mut coalescer = RecordCoalescer::new(matcher, sentinel);
    let mut summary = CoalesceSummary::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(|e| PipelineError::Read {
            path: source.to_path_buf(),
            line: summary.lines_read + 1,
            source: e,
        })?;
        if read == 0 {
            break;
        }
        summary.lines_read += 1;
        metrics.record_line_read();

        if let Some(record) = coalescer.process(trim_line_ending(&buf)) {
            write_record(&mut writer, &record, dest, &mut summary, metrics)?;
        }
    }

    if let Some(record) = coalescer.flush() {
        write_record(&mut writer, &record, dest, &mut summary, metrics)?;
    }
    writer.flush().map_err(|e| PipelineError::write(dest, e))?;

    summary.continuations = coalescer.continuations();
    metrics.add_continuations(summary.continuations as u64);
    Ok(summary)
}

fn write_record<W: Write>(
    writer: &mut W,
    record: &CoalescedRecord,
    dest: &Path,
    summary: &mut CoalesceSummary,
    metrics: &PipelineMetrics,
) -> PipelineResult<()> {
    writer
        .write_all(record.as_bytes())
        .and_then(|_| writer.write_all(b"\n"))
        .map_err(|e| PipelineError::write(dest, e))?;

    match record {
        CoalescedRecord::Record(_) => {
            summary.records += 1;
            metrics.record_record_written();
        }
        CoalescedRecord::Orphan(_) => {
            summary.orphans += 1;
            metrics.record_orphan();
        }
    }
    Ok(())
}
