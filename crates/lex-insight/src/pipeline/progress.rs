//! Progress reporting for the insight pipeline.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_insight::InsightPipeline;
//!
//! let result = InsightPipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .process(df)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightStage {
    /// Validating configuration and starting the run
    Initializing,
    /// Reading the input file
    Loading,
    /// Trimming cells and casting numeric text
    Coercing,
    /// Classifying columns and computing profile statistics
    Profiling,
    /// Resolving the core dimension and auxiliary columns
    Resolving,
    /// Deciding which analyses are worth running
    Gating,
    /// Running the eligible analyses
    Aggregating,
    /// Building insights, narrative and chart plan
    Assembling,
    /// Writing the report and CSV tables
    Exporting,
    /// Run completed successfully
    Complete,
    /// Run failed with an error
    Failed,
}

impl InsightStage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Loading => "Loading Dataset",
            Self::Coercing => "Coercing Types",
            Self::Profiling => "Profiling Fields",
            Self::Resolving => "Resolving Columns",
            Self::Gating => "Gating Analyses",
            Self::Aggregating => "Aggregating",
            Self::Assembling => "Assembling Insights",
            Self::Exporting => "Exporting Reports",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run spent in this stage.
    ///
    /// The working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::Loading => 0.15,
            Self::Coercing => 0.08,
            Self::Profiling => 0.15,
            Self::Resolving => 0.05,
            Self::Gating => 0.05,
            Self::Aggregating => 0.30,
            Self::Assembling => 0.08,
            Self::Exporting => 0.12,
            Self::Complete => 0.0,
            Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Loading => 0.02,
            Self::Coercing => 0.17,
            Self::Profiling => 0.25,
            Self::Resolving => 0.40,
            Self::Gating => 0.45,
            Self::Aggregating => 0.50,
            Self::Assembling => 0.80,
            Self::Exporting => 0.88,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// Progress update with optional sub-stage detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: InsightStage,

    /// e.g. "Column: amount"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: InsightStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    pub fn with_sub_stage(
        stage: InsightStage,
        sub_stage: impl Into<String>,
        stage_progress: f32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sub_stage: Some(sub_stage.into()),
            ..Self::new(stage, stage_progress, message)
        }
    }

    /// Progress derived from `current` of `total` items.
    pub fn with_items(
        stage: InsightStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::with_sub_stage(stage, sub_stage, stage_progress, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: InsightStage::Complete,
            sub_stage: None,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: InsightStage::Failed,
            sub_stage: None,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }
}

/// Receives progress updates during a run.
///
/// Implementations must be `Send + Sync` so a pipeline can run on a
/// background thread while the reporter feeds a UI.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WORKING_STAGES: [InsightStage; 9] = [
        InsightStage::Initializing,
        InsightStage::Loading,
        InsightStage::Coercing,
        InsightStage::Profiling,
        InsightStage::Resolving,
        InsightStage::Gating,
        InsightStage::Aggregating,
        InsightStage::Assembling,
        InsightStage::Exporting,
    ];

    #[test]
    fn test_weights_sum_to_one() {
        let total: f32 = WORKING_STAGES.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_base_progress_is_cumulative() {
        for pair in WORKING_STAGES.windows(2) {
            let expected = pair[0].base_progress() + pair[0].weight();
            assert!((pair[1].base_progress() - expected).abs() < 1e-4, "{:?}", pair[1]);
        }
    }

    #[test]
    fn test_progress_update_new() {
        let update = ProgressUpdate::new(InsightStage::Profiling, 0.5, "Profiling...");
        assert_eq!(update.stage, InsightStage::Profiling);
        assert!(update.sub_stage.is_none());
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.325).abs() < 1e-4);
    }

    #[test]
    fn test_progress_update_with_items() {
        let update = ProgressUpdate::with_items(
            InsightStage::Aggregating,
            "Column: amount",
            3,
            6,
            "Summarizing amount",
        );
        assert_eq!(update.sub_stage.as_deref(), Some("Column: amount"));
        assert_eq!(update.items_processed, Some(3));
        assert_eq!(update.items_total, Some(6));
        assert_eq!(update.stage_progress, 0.5);
    }

    #[test]
    fn test_with_items_zero_total() {
        let update = ProgressUpdate::with_items(InsightStage::Exporting, "csv", 0, 0, "Nothing");
        assert_eq!(update.stage_progress, 0.0);
    }

    #[test]
    fn test_terminal_updates() {
        assert_eq!(ProgressUpdate::complete("done").progress, 1.0);
        let failed = ProgressUpdate::failed("boom");
        assert_eq!(failed.stage, InsightStage::Failed);
        assert_eq!(failed.message, "boom");
    }

    #[test]
    fn test_closure_reporter() {
        let counter = AtomicUsize::new(0);
        let reporter = ClosureProgressReporter::new(|_update| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        reporter.report(ProgressUpdate::new(InsightStage::Loading, 0.0, "a"));
        reporter.report(ProgressUpdate::complete("b"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_serialization() {
        let update = ProgressUpdate::new(InsightStage::Gating, 1.0, "done");
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"gating\""));
        assert!(!json.contains("sub_stage"));
    }
}
