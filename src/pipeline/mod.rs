//! Monitoring pipeline.
//!
//! - `text`: normalization and sentence segmentation
//! - `keywords`: pending/found keyword bookkeeping
//! - `diff`: word-level change extraction per sentence pair
//! - `format`: notification message rendering
//! - `process`: one resource through fetch, evaluate, persist
//! - `cycle`: one pass over every listed resource

pub mod cycle;
pub mod diff;
pub mod format;
pub mod keywords;
pub mod process;
pub mod text;

pub use cycle::{CycleRunner, CycleSummary};
pub use diff::{ChangeAggregator, WordDiffer};
pub use keywords::{KeywordScan, KeywordTracker};
pub use process::{ProcessReport, ResourceProcessor, ResourceState, SkipReason};
