//! Pipeline module.
//!
//! Wires loading, coercion, profiling, resolution, gating, aggregation,
//! insight assembly and export into one synchronous run.

mod builder;
pub mod progress;

pub use builder::{InsightPipeline, InsightPipelineBuilder, InsightResult};
pub use progress::{ClosureProgressReporter, InsightStage, ProgressReporter, ProgressUpdate};
