//! Sequential job queue and batch-level progress.

pub mod job;
pub mod progress;
pub mod queue;
