use std::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;

/// Forces the wrapped group onto its own cache line so coalescing workers
/// bumping file counters do not contend with the line counters.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

/// Per-file outcomes of the dispatch stage
#[derive(Debug, Default)]
pub struct FileMetrics {
    pub coalesced: AtomicU64,
    pub failed: AtomicU64,
}

/// Line and record counters (updated per line by workers)
#[derive(Debug, Default)]
pub struct LineMetrics {
    pub read: AtomicU64,
    pub records_written: AtomicU64,
    pub continuations_joined: AtomicU64,
    pub orphans: AtomicU64,
}

/// Counters for the single-threaded stages after the join barrier
#[derive(Debug, Default)]
pub struct StageMetrics {
    pub lines_merged: AtomicU64,
    pub lines_ordered: AtomicU64,
    pub unparsable_timestamps: AtomicU64,
    pub lines_expanded: AtomicU64,
}

/// Counters for one pipeline run.
///
/// All operations use `Ordering::Relaxed`; `snapshot()` is not transactional
/// across fields, which is fine once the run has finished.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub files: CacheAligned<FileMetrics>,
    pub lines: CacheAligned<LineMetrics>,
    pub stages: CacheAligned<StageMetrics>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_file(&self, success: bool) {
        if success {
            self.files.0.coalesced.fetch_add(1, Ordering::Relaxed);
        } else {
            self.files.0.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_line_read(&self) {
        self.lines.0.read.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_record_written(&self) {
        self.lines.0.records_written.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_continuations(&self, count: u64) {
        self.lines.0.continuations_joined.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_orphan(&self) {
        self.lines.0.orphans.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_lines_merged(&self, count: u64) {
        self.stages.0.lines_merged.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_lines_ordered(&self, count: u64) {
        self.stages.0.lines_ordered.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unparsable_timestamp(&self) {
        self.stages.0.unparsable_timestamps.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_lines_expanded(&self, count: u64) {
        self.stages.0.lines_expanded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_coalesced: self.files.0.coalesced.load(Ordering::Relaxed),
            files_failed: self.files.0.failed.load(Ordering::Relaxed),

            lines_read: self.lines.0.read.load(Ordering::Relaxed),
            records_written: self.lines.0.records_written.load(Ordering::Relaxed),
            continuations_joined: self.lines.0.continuations_joined.load(Ordering::Relaxed),
            orphan_lines: self.lines.0.orphans.load(Ordering::Relaxed),

            lines_merged: self.stages.0.lines_merged.load(Ordering::Relaxed),
            lines_ordered: self.stages.0.lines_ordered.load(Ordering::Relaxed),
            unparsable_timestamps: self.stages.0.unparsable_timestamps.load(Ordering::Relaxed),
            lines_expanded: self.stages.0.lines_expanded.load(Ordering::Relaxed),
        }
    }
}

/// A read-only snapshot of run metrics, serializable for the run summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub files_coalesced: u64,
    pub files_failed: u64,

    pub lines_read: u64,
    pub records_written: u64,
    pub continuations_joined: u64,
    pub orphan_lines: u64,

    pub lines_merged: u64,
    pub lines_ordered: u64,
    pub unparsable_timestamps: u64,
    pub lines_expanded: u64,
}
