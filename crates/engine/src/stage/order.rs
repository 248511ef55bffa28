//! Ordering stage — stable chronological sort of the merged stream.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::warn;

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::PipelineMetrics;
use crate::pattern::TimestampMatcher;

/// One merged line and the instant it sorts by.
///
/// `timestamp` is `None` when the line carries no parsable timestamp of the
/// stream pattern; such lines sort before every timestamped line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: Option<NaiveDateTime>,
    pub raw: Vec<u8>,
}

/// Split on `\n`, dropping one `\r` before it.
///
/// A trailing terminator does not produce an extra empty line, but a file
/// holding a single empty line (`"\n"`) yields one empty line.
pub fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    if content.is_empty() {
        return Vec::new();
    }
    let body = content.strip_suffix(b"\n").unwrap_or(content);
    body.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .collect()
}

/// Attach sort keys and sort, stable on ties.
///
/// With no matcher (no pattern was found for the merged stream) every key is
/// `None` and the input order is kept.
pub fn order_lines<'a, I>(lines: I, matcher: Option<&TimestampMatcher>, metrics: &PipelineMetrics) -> Vec<LogLine>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut ordered: Vec<LogLine> = lines
        .into_iter()
        .map(|raw| LogLine {
            timestamp: matcher.and_then(|m| parse_key(m, raw, metrics)),
            raw: raw.to_vec(),
        })
        .collect();

    ordered.sort_by_key(|line| line.timestamp);
    ordered
}

fn parse_key(matcher: &TimestampMatcher, raw: &[u8], metrics: &PipelineMetrics) -> Option<NaiveDateTime> {
    match matcher.parse(raw) {
        Ok(ts) => Some(ts),
        Err(e) => {
            warn!("Error parsing date from line {:?}: {}", String::from_utf8_lossy(raw), e);
            metrics.record_unparsable_timestamp();
            None
        }
    }
}

/// Read `input`, order its lines and write them to `output`, one
/// `\n`-terminated line each. Returns the number of lines written.
pub fn order_file(
    input: &Path,
    output: &Path,
    matcher: Option<&TimestampMatcher>,
    metrics: &PipelineMetrics,
) -> PipelineResult<usize> {
    let content = fs::read(input).map_err(|e| PipelineError::open(input, e))?;
    let ordered = order_lines(split_lines(&content), matcher, metrics);

    let file = File::create(output).map_err(|e| PipelineError::create(output, e))?;
    let mut writer = BufWriter::new(file);
    for line in &ordered {
        writer
            .write_all(&line.raw)
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| PipelineError::write(output, e))?;
    }
    writer.flush().map_err(|e| PipelineError::write(output, e))?;

    metrics.add_lines_ordered(ordered.len() as u64);
    Ok(ordered.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::TimestampPattern;
    use tempfile::TempDir;

    fn raw(lines: &[LogLine]) -> Vec<String> {
        lines
            .iter()
            .map(|l| String::from_utf8(l.raw.clone()).unwrap())
            .collect()
    }

    // ─── split_lines ────────────────────────────────────────────

    #[test]
    fn test_split_lines_basic() {
        assert_eq!(split_lines(b"a\nb\n"), vec![&b"a"[..], &b"b"[..]]);
    }

    #[test]
    fn test_split_lines_unterminated() {
        assert_eq!(split_lines(b"a\nb"), vec![&b"a"[..], &b"b"[..]]);
    }

    #[test]
    fn test_split_lines_empty_and_blank() {
        assert!(split_lines(b"").is_empty());
        assert_eq!(split_lines(b"\n"), vec![&b""[..]]);
        assert_eq!(split_lines(b"a\n\nb\n"), vec![&b"a"[..], &b""[..], &b"b"[..]]);
    }

    #[test]
    fn test_split_lines_crlf() {
        assert_eq!(split_lines(b"a\r\nb\r\n"), vec![&b"a"[..], &b"b"[..]]);
    }

    // ─── order_lines ────────────────────────────────────────────

    #[test]
    fn test_order_chronological() {
        let m = TimestampPattern::Period.compile().unwrap();
        let lines: Vec<&[u8]> = vec![
            &b"2024-01-01 10:00:00.300 c"[..],
            &b"2024-01-01 10:00:00.100 a"[..],
            &b"2024-01-01 10:00:00.200 b"[..],
        ];
        let ordered = order_lines(lines, Some(&m), &PipelineMetrics::new());
        assert_eq!(
            raw(&ordered),
            vec![
                "2024-01-01 10:00:00.100 a",
                "2024-01-01 10:00:00.200 b",
                "2024-01-01 10:00:00.300 c",
            ]
        );
    }

    #[test]
    fn test_order_stable_on_equal_timestamps() {
        let m = TimestampPattern::Comma.compile().unwrap();
        let lines: Vec<&[u8]> = vec![
            &b"2024-01-01 10:00:00,500 first"[..],
            &b"2024-01-01 10:00:00,100 early"[..],
            &b"2024-01-01 10:00:00,500 second"[..],
            &b"2024-01-01 10:00:00,500 third"[..],
        ];
        let ordered = order_lines(lines, Some(&m), &PipelineMetrics::new());
        assert_eq!(
            raw(&ordered),
            vec![
                "2024-01-01 10:00:00,100 early",
                "2024-01-01 10:00:00,500 first",
                "2024-01-01 10:00:00,500 second",
                "2024-01-01 10:00:00,500 third",
            ]
        );
    }

    #[test]
    fn test_unparsable_lines_sort_first_in_relative_order() {
        let m = TimestampPattern::Period.compile().unwrap();
        let metrics = PipelineMetrics::new();
        let lines: Vec<&[u8]> = vec![
            &b"2024-01-01 10:00:00.100 a"[..],
            &b"orphan one"[..],
            &b"2024-13-45 10:00:00.000 invalid date"[..],
            &b"orphan two"[..],
        ];
        let ordered = order_lines(lines, Some(&m), &metrics);

        assert_eq!(
            raw(&ordered),
            vec![
                "orphan one",
                "2024-13-45 10:00:00.000 invalid date",
                "orphan two",
                "2024-01-01 10:00:00.100 a",
            ]
        );
        assert_eq!(metrics.snapshot().unparsable_timestamps, 3);
    }

    #[test]
    fn test_order_without_matcher_keeps_input_order() {
        let metrics = PipelineMetrics::new();
        let lines: Vec<&[u8]> = vec![&b"2024-01-01 10:00:00.300 c"[..], &b"2024-01-01 10:00:00.100 a"[..]];
        let ordered = order_lines(lines, None, &metrics);

        assert_eq!(raw(&ordered), vec!["2024-01-01 10:00:00.300 c", "2024-01-01 10:00:00.100 a"]);
        assert!(ordered.iter().all(|l| l.timestamp.is_none()));
        assert_eq!(metrics.snapshot().unparsable_timestamps, 0);
    }

    #[test]
    fn test_other_pattern_lines_sort_first() {
        let m = TimestampPattern::Period.compile().unwrap();
        let lines: Vec<&[u8]> = vec![&b"2024-01-01 10:00:00.100 period"[..], &b"2024-01-01 09:00:00,000 comma"[..]];
        let ordered = order_lines(lines, Some(&m), &PipelineMetrics::new());
        assert_eq!(
            raw(&ordered),
            vec!["2024-01-01 09:00:00,000 comma", "2024-01-01 10:00:00.100 period"]
        );
    }

    // ─── order_file ─────────────────────────────────────────────

    #[test]
    fn test_order_file_writes_terminated_lines() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("MERGED.log");
        let output = dir.path().join("MERGED_ORDERED.log");
        fs::write(
            &input,
            "2024-01-01 10:00:00.200 bappTesting  more\n2024-01-01 10:00:00.100 a\n",
        )
        .unwrap();

        let m = TimestampPattern::Period.compile().unwrap();
        let metrics = PipelineMetrics::new();
        let written = order_file(&input, &output, Some(&m), &metrics).unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "2024-01-01 10:00:00.100 a\n2024-01-01 10:00:00.200 bappTesting  more\n"
        );
        assert_eq!(metrics.snapshot().lines_ordered, 2);
    }

    #[test]
    fn test_order_file_missing_input() {
        let dir = TempDir::new().unwrap();
        let err = order_file(
            &dir.path().join("gone.log"),
            &dir.path().join("out.log"),
            None,
            &PipelineMetrics::new(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Open { .. }));
    }
}
