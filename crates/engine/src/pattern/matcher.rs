use chrono::NaiveDateTime;
use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use thiserror::Error;

use super::{TimestampPattern, TIMESTAMP_LAYOUT};
use crate::error::{PipelineError, PipelineResult};

#[derive(Error, Debug, PartialEq)]
pub enum TimestampError {
    #[error("no timestamp found in line")]
    NotFound,
    #[error("could not parse timestamp {text:?}: {source}")]
    Invalid {
        text: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// A compiled [`TimestampPattern`].
///
/// Matching is unanchored: a timestamp anywhere in the line counts, so a
/// continuation line quoting a timestamp mid-text is read as a new record.
pub struct TimestampMatcher {
    pattern: TimestampPattern,
    matcher: RegexMatcher,
}

impl TimestampMatcher {
    pub fn new(pattern: TimestampPattern) -> PipelineResult<Self> {
        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(false)
            .multi_line(false)
            .build(pattern.regex())
            .map_err(|e| PipelineError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            pattern,
            matcher,
        })
    }

    pub fn pattern(&self) -> TimestampPattern {
        self.pattern
    }

    #[inline]
    pub fn is_match(&self, line: &[u8]) -> bool {
        self.matcher.is_match(line).unwrap_or(false)
    }

    /// First timestamp-shaped substring of `line`, if any.
    pub fn find<'a>(&self, line: &'a [u8]) -> Option<&'a [u8]> {
        self.matcher
            .find(line)
            .unwrap_or(None)
            .map(|m| &line[m.start()..m.end()])
    }

    /// Locate the first timestamp in `line` and parse it.
    ///
    /// The support separator is normalized to `.` before parsing so both
    /// forms share [`TIMESTAMP_LAYOUT`].
    pub fn parse(&self, line: &[u8]) -> Result<NaiveDateTime, TimestampError> {
        let found = self.find(line).ok_or(TimestampError::NotFound)?;
        // Matched bytes are ASCII; the lossy conversion is exact.
        let text = String::from_utf8_lossy(found).replacen(self.pattern.separator() as char, ".", 1);
        NaiveDateTime::parse_from_str(&text, TIMESTAMP_LAYOUT)
            .map_err(|source| TimestampError::Invalid { text, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn comma() -> TimestampMatcher {
        TimestampPattern::Comma.compile().expect("Failed to compile comma pattern")
    }

    fn period() -> TimestampMatcher {
        TimestampPattern::Period.compile().expect("Failed to compile period pattern")
    }

    fn ts(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    // ─────────────────────────────────────────────────────────
    // is_match
    // ─────────────────────────────────────────────────────────

    #[test]
    fn test_comma_matches_comma_only() {
        let m = comma();
        assert!(m.is_match(b"2024-01-01 10:00:00,100 INFO start"));
        assert!(!m.is_match(b"2024-01-01 10:00:00.100 INFO start"));
    }

    #[test]
    fn test_period_matches_period_only() {
        let m = period();
        assert!(m.is_match(b"2024-01-01 10:00:00.100 INFO start"));
        assert!(!m.is_match(b"2024-01-01 10:00:00,100 INFO start"));
    }

    #[test]
    fn test_match_is_unanchored() {
        let m = period();
        assert!(m.is_match(b"[worker-3] 2024-01-01 10:00:00.100 INFO start"));
        assert!(m.is_match(b"  retry scheduled at 2024-01-01 10:00:00.100"));
    }

    #[test]
    fn test_missing_milliseconds_does_not_match() {
        let m = period();
        assert!(!m.is_match(b"2024-01-01 10:00:00 INFO start"));
        assert!(!m.is_match(b"2024-01-01 10:00:00.1 INFO start"));
    }

    #[test]
    fn test_iso_t_separator_does_not_match() {
        assert!(!period().is_match(b"2024-01-01T10:00:00.100Z INFO start"));
    }

    #[test]
    fn test_unicode_digits_do_not_match() {
        // Arabic-Indic digits would satisfy a Unicode \d
        let line = "٢٠٢٤-٠١-٠١ ١٠:٠٠:٠٠.١٠٠ start";
        assert!(!period().is_match(line.as_bytes()));
    }

    #[test]
    fn test_non_utf8_line() {
        let mut line = b"2024-01-01 10:00:00.100 ".to_vec();
        line.extend_from_slice(&[0xFF, 0xFE, 0x80]);
        assert!(period().is_match(&line));
    }

    // ─────────────────────────────────────────────────────────
    // parse
    // ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_period() {
        let parsed = period().parse(b"2024-01-01 10:00:00.050 other").unwrap();
        assert_eq!(parsed, ts(10, 0, 0, 50));
    }

    #[test]
    fn test_parse_comma_normalized() {
        let parsed = comma().parse(b"2024-01-01 23:59:59,999 late").unwrap();
        assert_eq!(parsed, ts(23, 59, 59, 999));
    }

    #[test]
    fn test_parse_takes_first_timestamp() {
        let line = b"2024-01-01 10:00:00.200 replaying event from 2024-01-01 09:00:00.000";
        assert_eq!(period().parse(line).unwrap(), ts(10, 0, 0, 200));
    }

    #[test]
    fn test_parse_not_found() {
        assert_eq!(period().parse(b"  stack trace"), Err(TimestampError::NotFound));
    }

    #[test]
    fn test_parse_invalid_calendar_date() {
        let err = period().parse(b"2024-13-45 10:00:00.000 bad month").unwrap_err();
        match err {
            TimestampError::Invalid { text, .. } => assert_eq!(text, "2024-13-45 10:00:00.000"),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid_hour() {
        assert!(matches!(
            comma().parse(b"2024-01-01 25:00:00,000 x"),
            Err(TimestampError::Invalid { .. })
        ));
    }
}
