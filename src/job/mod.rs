//! Job orchestration: per-job settings, scratch space, the end-to-end run
//! and its report.

pub mod context;
pub mod pipeline;
pub mod report;

pub use context::{JobContext, JobWorkspace};
pub use pipeline::DubJob;
pub use report::{JobReport, SegmentReport};
