// Log reconstruction engine: detect, coalesce, merge, order, expand.

// Core infrastructure
pub mod conf;
pub mod error;
pub mod metrics;

// Domain modules
pub mod pattern;
pub mod records;
pub mod stage;
pub mod pipeline;

pub use conf::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use pattern::{TimestampMatcher, TimestampPattern};
pub use pipeline::{FileSummary, Pipeline, RunReport, RunSummary};
pub use stage::ProcessingResult;
