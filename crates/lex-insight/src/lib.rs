//! Rule-gated descriptive analytics for tabular business data.
//!
//! # Overview
//!
//! The library loads a CSV or spreadsheet, profiles every column, decides
//! which analyses are worth computing, runs them and hands structured
//! insights to downstream renderers:
//!
//! - **Field profiling**: numeric, categorical, datetime or identifier
//!   classification with null rate, uniqueness and memory footprint
//! - **Noise-reduction gate**: cardinality, correlation and time-column rules
//!   with a typed reason for every decision
//! - **Statistical aggregation**: numeric summaries, categorical TopN,
//!   Pearson correlation, bucketed trends with period-over-period and YoY deltas
//! - **Core dimension analyses**: concentration, coverage, company position,
//!   segment and coverage-unit opportunity scoring, segment leaders (Top3, CR3)
//!   and price against volume
//! - **Reporting**: insight records, a market narrative, a chart plan, a JSON
//!   report and CSV tables
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_insight::{InsightConfig, InsightPipeline};
//!
//! let config = InsightConfig::builder()
//!     .company("Acme")
//!     .output_dir("outputs")
//!     .build()?;
//!
//! let result = InsightPipeline::builder()
//!     .config(config)
//!     .build()?
//!     .process_file("data/sales.csv")?;
//!
//! for decision in &result.decisions {
//!     println!("{:?}: {}", decision.kind, decision.explanation());
//! }
//! ```
//!
//! # Error Handling
//!
//! Only structural problems are errors ([`InsightError`]). An analysis whose
//! preconditions fail becomes an ineligible [`AnalysisDecision`] or a
//! [`SkippedAnalysis`] and the run continues with a narrower result.

pub mod aggregator;
pub mod coercion;
pub mod config;
pub mod dimension;
pub mod error;
pub mod gate;
pub mod insights;
pub mod loader;
pub mod pipeline;
pub mod profiler;
pub mod reporting;
pub mod types;
pub mod utils;

pub use aggregator::{AggregationOutput, CorrelationMatrix, StatisticalAggregator};
pub use coercion::{CoercionSummary, TypeCoercer};
pub use config::{
    ChartsMode, ConfigValidationError, DimensionSettings, GateThresholds, InferenceThresholds,
    InsightConfig, InsightConfigBuilder,
};
pub use dimension::{ColumnResolver, CoreDimensionResolver};
pub use error::{InsightError, Result, ResultExt};
pub use gate::NoiseGate;
pub use insights::{ChartKind, ChartSpec, FieldOverview, InsightAssembler, MarketNarrative};
pub use loader::DatasetLoader;
pub use pipeline::{
    ClosureProgressReporter, InsightPipeline, InsightPipelineBuilder, InsightResult, InsightStage,
    ProgressReporter, ProgressUpdate,
};
pub use profiler::FieldProfiler;
pub use reporting::{ExportOutcome, InsightReport, ReportGenerator};
pub use types::{
    AnalysisDecision, AnalysisKind, ColumnProfile, ColumnType, CoreDimension, DatasetProfile,
    GateReason, InsightCategory, InsightRecord, ResolvedColumns, SkippedAnalysis,
};
