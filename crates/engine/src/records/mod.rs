//! Records module — multi-line record coalescing and its inverse.
//!
//! A record is one timestamped line plus the wrapped continuation lines that
//! follow it. Intermediate files carry each record on a single physical line,
//! continuation fragments joined by the configured sentinel.

pub mod coalesce;
pub mod expand;

pub use coalesce::{coalesce_lines, coalesce_stream, CoalesceSummary, CoalescedRecord, RecordCoalescer};
pub use expand::{expand_lines, expand_stream, split_sentinel, ContinuationExpander};
