//! Pattern module — recognized timestamp forms, compiled matchers, detection.
//!
//! Exactly two textual forms are recognized, differing only in the character
//! before the millisecond field:
//!
//! - `2024-01-01 10:00:00,123` ([`TimestampPattern::Comma`], primary)
//! - `2024-01-01 10:00:00.123` ([`TimestampPattern::Period`])

pub mod detect;
pub mod matcher;

pub use detect::{detect_file, detect_pattern};
pub use matcher::{TimestampError, TimestampMatcher};

use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

/// chrono layout every matched timestamp is parsed with, after the
/// separator has been normalized to `.`.
pub const TIMESTAMP_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPattern {
    /// `YYYY-MM-DD HH:MM:SS,mmm`
    Comma,
    /// `YYYY-MM-DD HH:MM:SS.mmm`
    Period,
}

impl TimestampPattern {
    /// Detection order: the comma form wins when a line carries both.
    pub const ALL: [TimestampPattern; 2] = [TimestampPattern::Comma, TimestampPattern::Period];

    /// Regex source. ASCII digit classes on purpose: `\d` would also accept
    /// Unicode digits that chrono cannot parse.
    pub fn regex(&self) -> &'static str {
        match self {
            TimestampPattern::Comma => {
                r"[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2},[0-9]{3}"
            }
            TimestampPattern::Period => {
                r"[0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3}"
            }
        }
    }

    pub fn separator(&self) -> u8 {
        match self {
            TimestampPattern::Comma => b',',
            TimestampPattern::Period => b'.',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimestampPattern::Comma => "comma",
            TimestampPattern::Period => "period",
        }
    }

    /// Compile the pattern once for reuse across a whole stage.
    pub fn compile(&self) -> PipelineResult<TimestampMatcher> {
        TimestampMatcher::new(*self)
    }
}

impl std::fmt::Display for TimestampPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
