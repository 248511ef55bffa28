//! Pipeline stages after pattern detection: parallel dispatch, then the
//! sequential merge and ordering passes that run once every worker is done.

pub mod dispatch;
pub mod merge;
pub mod order;

pub use dispatch::{dispatch, process_file, reserve_unique_path, CoalescedFile, ProcessingResult};
pub use merge::{merge_files, MergeSummary};
pub use order::{order_file, order_lines, split_lines, LogLine};
