//! The insight pipeline and its builder.

use crate::aggregator::{AggregationOutput, StatisticalAggregator};
use crate::coercion::{CoercionSummary, TypeCoercer};
use crate::config::{ConfigValidationError, InsightConfig};
use crate::dimension::ColumnResolver;
use crate::error::{InsightError, Result, ResultExt};
use crate::gate::NoiseGate;
use crate::insights::{
    ChartSpec, FieldOverview, InsightAssembler, MarketNarrative, NarrativeContext, field_overview,
    plan_charts,
};
use crate::loader::DatasetLoader;
use crate::pipeline::progress::{
    ClosureProgressReporter, InsightStage, ProgressReporter, ProgressUpdate,
};
use crate::profiler::FieldProfiler;
use crate::reporting::{ExportOutcome, ReportGenerator};
use crate::types::{
    AnalysisDecision, AnalysisKind, DatasetProfile, InsightRecord, ResolvedColumns, find_decision,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightResult {
    pub profile: DatasetProfile,
    pub field_overview: Vec<FieldOverview>,
    pub coercion: CoercionSummary,
    pub resolved: ResolvedColumns,
    /// Final decisions, with the correlation entry already second-phase gated.
    pub decisions: Vec<AnalysisDecision>,
    pub aggregation: AggregationOutput,
    pub insights: Vec<InsightRecord>,
    pub narrative: MarketNarrative,
    /// Empty when the charts decision is ineligible.
    pub charts: Vec<ChartSpec>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exports: Option<ExportOutcome>,
}

impl InsightResult {
    pub fn decision(&self, kind: AnalysisKind, target: Option<&str>) -> Option<&AnalysisDecision> {
        find_decision(&self.decisions, kind, target)
    }

    pub fn is_eligible(&self, kind: AnalysisKind, target: Option<&str>) -> bool {
        self.decision(kind, target).is_some_and(|d| d.eligible)
    }

    pub fn eligible_count(&self) -> usize {
        self.decisions.iter().filter(|d| d.eligible).count()
    }
}

/// Profile, gate, aggregate and report one dataset.
///
/// # Example
///
/// ```rust,ignore
/// use lex_insight::{InsightConfig, InsightPipeline};
///
/// let config = InsightConfig::builder()
///     .core_dimension("brand")
///     .company("Acme")
///     .save_to_disk(false)
///     .build()?;
///
/// let result = InsightPipeline::builder()
///     .config(config)
///     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
///     .build()?
///     .process_file("data/sales.csv")?;
///
/// for insight in &result.insights {
///     println!("{}", insight.summary);
/// }
/// ```
pub struct InsightPipeline {
    config: InsightConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    reporter: ReportGenerator,
}

static_assertions::assert_impl_all!(InsightPipeline: Send);

impl InsightPipeline {
    pub fn builder() -> InsightPipelineBuilder {
        InsightPipelineBuilder::default()
    }

    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    /// Run the pipeline on an already loaded dataset.
    pub fn process(&self, df: DataFrame) -> Result<InsightResult> {
        let start_time = Instant::now();
        self.start();
        self.finish(self.process_internal(df, None, start_time))
    }

    /// Load `path` (honoring the configured sheet) and run the pipeline.
    pub fn process_file(&self, path: impl AsRef<Path>) -> Result<InsightResult> {
        let path = path.as_ref();
        let start_time = Instant::now();
        self.start();
        let outcome = self.load(path).and_then(|df| {
            let input = path.display().to_string();
            self.process_internal(df, Some(&input), start_time)
        });
        self.finish(outcome)
    }

    fn start(&self) {
        info!("Starting insight pipeline...");
        self.report_progress(ProgressUpdate::new(
            InsightStage::Initializing,
            0.0,
            "Starting insight pipeline...",
        ));
    }

    fn finish(&self, outcome: Result<InsightResult>) -> Result<InsightResult> {
        match outcome {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Insight pipeline completed"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn stage(&self, stage: InsightStage, message: &str) {
        info!("{}", message);
        self.report_progress(ProgressUpdate::new(stage, 0.0, message));
    }

    fn load(&self, path: &Path) -> Result<DataFrame> {
        self.stage(InsightStage::Loading, "Loading dataset...");
        let df = DatasetLoader::load(path, self.config.sheet.as_deref())
            .context(format!("Loading {}", path.display()))?;
        info!("Dataset loaded: {} rows x {} columns", df.height(), df.width());
        Ok(df)
    }

    fn process_internal(
        &self,
        df: DataFrame,
        input_file: Option<&str>,
        start_time: Instant,
    ) -> Result<InsightResult> {
        if df.width() == 0 || df.height() == 0 {
            return Err(InsightError::DataFormat(format!(
                "dataset is empty ({} rows x {} columns)",
                df.height(),
                df.width()
            )));
        }

        // Step 1: coercion, the only mutation of the dataset
        self.stage(InsightStage::Coercing, "Step 1: Coercing column types...");
        let (df, coercion) = TypeCoercer::new(self.config.inference.clone())
            .coerce(df)
            .context("Coercing column types")?;

        // Step 2: profile
        self.stage(InsightStage::Profiling, "Step 2: Profiling fields...");
        let profile = FieldProfiler::new(self.config.inference.clone())
            .profile_dataset_with(&df, |done, total, name| {
                self.report_progress(ProgressUpdate::with_items(
                    InsightStage::Profiling,
                    format!("Column: {}", name),
                    done,
                    total,
                    format!("Profiled {} of {} columns", done, total),
                ));
            })
            .context("Profiling dataset")?;

        // Step 3: resolve core dimension and auxiliary columns
        self.stage(InsightStage::Resolving, "Step 3: Resolving core dimension...");
        let resolved = ColumnResolver::new(&self.config).resolve(&profile)?;

        // Step 4: first-phase gate
        self.stage(InsightStage::Gating, "Step 4: Gating analyses...");
        let gate = NoiseGate::new(self.config.gate.clone());
        let mut decisions = gate.evaluate(&profile, &resolved, self.config.company.as_deref());

        // Step 5: aggregation, then the second correlation phase
        self.stage(InsightStage::Aggregating, "Step 5: Running eligible analyses...");
        let aggregation = StatisticalAggregator::new(&self.config).run(&df, &resolved, &decisions)?;
        gate.apply_correlation_gate(
            &mut decisions,
            aggregation.correlation.as_ref(),
            aggregation.numeric_summaries.len(),
        );

        // Step 6: insights, narrative and chart plan
        self.stage(InsightStage::Assembling, "Step 6: Assembling insights...");
        let mut charts = plan_charts(&aggregation, &decisions);
        let charts_decision = gate.charts_decision(self.config.charts_mode, &charts);
        if !charts_decision.eligible {
            charts.clear();
        }
        decisions.push(charts_decision);

        let insights = InsightAssembler::new(&profile, &aggregation, &decisions).assemble();
        let narrative = self.narrative(&resolved, &aggregation);

        let mut result = InsightResult {
            field_overview: field_overview(&profile),
            profile,
            coercion,
            resolved,
            decisions,
            aggregation,
            insights,
            narrative,
            charts,
            duration_ms: 0,
            exports: None,
        };
        result.duration_ms = start_time.elapsed().as_millis() as u64;

        // Step 7: exports
        if self.config.save_to_disk {
            self.stage(InsightStage::Exporting, "Step 7: Exporting report and tables...");
            let report =
                ReportGenerator::build_report(input_file, &result, self.config.enable_screenshot);
            result.exports = Some(self.reporter.export(&report).context("Exporting results")?);
        } else {
            info!("Step 7: Skipping exports (save_to_disk disabled)");
        }

        result.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Pipeline finished in {} ms: {} decisions ({} eligible), {} insights",
            result.duration_ms,
            result.decisions.len(),
            result.eligible_count(),
            result.insights.len()
        );
        Ok(result)
    }

    fn narrative(&self, resolved: &ResolvedColumns, aggregation: &AggregationOutput) -> MarketNarrative {
        MarketNarrative::build(&NarrativeContext {
            dimension: resolved.core_dimension_name().unwrap_or("entity"),
            metric: resolved.value_column.as_deref().unwrap_or("rows"),
            concentration: aggregation.concentration.as_ref(),
            company_position: aggregation.company_position.as_ref(),
            opportunities: aggregation.opportunities.as_ref(),
            trend: aggregation.trend.as_ref(),
            has_price: resolved.price_column.is_some(),
            has_structure: resolved.segment_column.is_some(),
        })
    }
}

/// Builder for [`InsightPipeline`].
#[derive(Default)]
pub struct InsightPipelineBuilder {
    config: Option<InsightConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(InsightPipelineBuilder: Send);

impl InsightPipelineBuilder {
    pub fn config(mut self, config: InsightConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a custom progress reporter.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<InsightPipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let reporter = ReportGenerator::from_config(&config);
        Ok(InsightPipeline {
            config,
            progress_reporter: self.progress_reporter,
            reporter,
        })
    }
}
