//! Statistical aggregation over the analyses the gate allowed.
//!
//! The aggregator never decides eligibility. It reads the decisions, runs
//! the eligible analyses and records a [`SkippedAnalysis`] when an eligible
//! analysis turns out to have no usable input.

pub mod categorical;
pub mod concentration;
pub mod correlation;
pub mod coverage;
pub mod numeric;
pub mod opportunity;
pub mod price;
pub mod segments;
pub mod trend;

pub use categorical::{CategoryCount, TopNResult, category_counts, concentration_at};
pub use concentration::{CompanyPosition, ConcentrationAnalysis, EntityShare};
pub use correlation::{CorrelationMatrix, CorrelationPair};
pub use coverage::{CoverageAnalysis, CoverageRow};
pub use numeric::{NumericSummary, SkewIndicator};
pub use opportunity::{OpportunityAnalysis, PriorityLevel, SegmentOpportunity};
pub use price::{PriceRelation, PriceVolumeAnalysis};
pub use segments::{SegmentLeader, SegmentLeaderRow, SegmentLeadersAnalysis};
pub use trend::{TimeGranularity, TrendAnalysis, TrendDirection, TrendPoint};

use crate::config::InsightConfig;
use crate::error::{Result, ResultExt};
use crate::types::{AnalysisDecision, AnalysisKind, ResolvedColumns, SkippedAnalysis, find_decision};
use crate::utils::{column_series, datetime_values, numeric_values, text_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Everything the aggregator produced for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationOutput {
    pub numeric_summaries: Vec<NumericSummary>,
    pub top_n: Vec<TopNResult>,
    pub correlation: Option<CorrelationMatrix>,
    pub trend: Option<TrendAnalysis>,
    pub concentration: Option<ConcentrationAnalysis>,
    /// Leading core-dimension entities by value share.
    pub dimension_top_n: Vec<EntityShare>,
    pub coverage: Option<CoverageAnalysis>,
    pub company_position: Option<CompanyPosition>,
    pub opportunities: Option<OpportunityAnalysis>,
    pub segment_leaders: Option<SegmentLeadersAnalysis>,
    /// Opportunity scoring per coverage unit instead of per segment.
    pub coverage_opportunities: Option<OpportunityAnalysis>,
    pub price_volume: Option<PriceVolumeAnalysis>,
    pub skipped: Vec<SkippedAnalysis>,
}

impl AggregationOutput {
    pub fn numeric_summary(&self, column: &str) -> Option<&NumericSummary> {
        self.numeric_summaries.iter().find(|s| s.column == column)
    }

    pub fn top_n_for(&self, column: &str) -> Option<&TopNResult> {
        self.top_n.iter().find(|t| t.column == column)
    }
}

/// Runs every eligible analysis against the dataset.
pub struct StatisticalAggregator<'a> {
    config: &'a InsightConfig,
}

impl<'a> StatisticalAggregator<'a> {
    pub fn new(config: &'a InsightConfig) -> Self {
        Self { config }
    }

    pub fn run(
        &self,
        df: &DataFrame,
        resolved: &ResolvedColumns,
        decisions: &[AnalysisDecision],
    ) -> Result<AggregationOutput> {
        let mut output = AggregationOutput::default();

        self.numeric_summaries(df, decisions, &mut output)
            .context("Computing numeric summaries")?;
        self.categorical_top_n(df, decisions, &mut output)
            .context("Computing categorical TopN")?;
        self.correlation(df, decisions, &mut output)
            .context("Computing correlation matrix")?;
        self.trend(df, resolved, decisions, &mut output)
            .context("Computing trend")?;
        self.dimension_analyses(df, resolved, decisions, &mut output)
            .context("Computing core dimension analyses")?;

        info!(
            "Aggregation complete: {} numeric summaries, {} TopN tables, {} skipped",
            output.numeric_summaries.len(),
            output.top_n.len(),
            output.skipped.len()
        );
        Ok(output)
    }

    fn numeric_summaries(
        &self,
        df: &DataFrame,
        decisions: &[AnalysisDecision],
        output: &mut AggregationOutput,
    ) -> Result<()> {
        for decision in eligible(decisions, AnalysisKind::NumericSummary) {
            let Some(column) = decision.target.as_deref() else {
                continue;
            };
            let Some(series) = require_column(df, AnalysisKind::NumericSummary, column, output) else {
                continue;
            };
            match NumericSummary::compute(column, &numeric_values(series)?) {
                Some(summary) => output.numeric_summaries.push(summary),
                None => skip(output, AnalysisKind::NumericSummary, Some(column), "no numeric values"),
            }
        }
        Ok(())
    }

    fn categorical_top_n(
        &self,
        df: &DataFrame,
        decisions: &[AnalysisDecision],
        output: &mut AggregationOutput,
    ) -> Result<()> {
        for decision in eligible(decisions, AnalysisKind::CategoricalTopN) {
            let Some(column) = decision.target.as_deref() else {
                continue;
            };
            let Some(series) = require_column(df, AnalysisKind::CategoricalTopN, column, output)
            else {
                continue;
            };
            match TopNResult::compute(column, &text_values(series)?, self.config.top_n) {
                Some(top) => output.top_n.push(top),
                None => skip(output, AnalysisKind::CategoricalTopN, Some(column), "no non-null values"),
            }
        }
        Ok(())
    }

    /// First phase only: the matrix is computed here and gated afterwards.
    fn correlation(
        &self,
        df: &DataFrame,
        decisions: &[AnalysisDecision],
        output: &mut AggregationOutput,
    ) -> Result<()> {
        if !is_eligible(decisions, AnalysisKind::Correlation, None) {
            return Ok(());
        }

        let mut columns = Vec::new();
        for summary in &output.numeric_summaries {
            if let Some(series) = column_series(df, &summary.column) {
                columns.push((summary.column.clone(), numeric_values(series)?));
            }
        }
        if columns.len() < 2 {
            skip(
                output,
                AnalysisKind::Correlation,
                None,
                "fewer than two summarized numeric columns",
            );
            return Ok(());
        }

        let matrix = CorrelationMatrix::compute(&columns);
        debug!(
            "Correlation matrix over {} columns, max |r| = {:?}",
            matrix.columns.len(),
            matrix.max_abs_off_diagonal()
        );
        output.correlation = Some(matrix);
        Ok(())
    }

    fn trend(
        &self,
        df: &DataFrame,
        resolved: &ResolvedColumns,
        decisions: &[AnalysisDecision],
        output: &mut AggregationOutput,
    ) -> Result<()> {
        let Some(time_column) = resolved.time_column_name() else {
            return Ok(());
        };
        if !is_eligible(decisions, AnalysisKind::Trend, None) {
            return Ok(());
        }
        let Some(series) = require_column(df, AnalysisKind::Trend, time_column, output) else {
            return Ok(());
        };
        let timestamps = datetime_values(series)?;

        let value_column = resolved
            .value_column
            .as_deref()
            .filter(|name| column_series(df, name).is_some());
        let values = match value_column.and_then(|name| column_series(df, name)) {
            Some(values) => Some(numeric_values(values)?),
            None => None,
        };

        match TrendAnalysis::compute(
            time_column,
            value_column,
            &timestamps,
            values.as_deref(),
            &self.config.gate,
        ) {
            Some(trend) => {
                if trend.unparsed_rows > 0 {
                    warn!(
                        "{} row(s) of '{}' could not be read as dates",
                        trend.unparsed_rows, time_column
                    );
                }
                debug!(
                    "Trend over '{}' by {} with {} points",
                    time_column,
                    trend.granularity,
                    trend.points.len()
                );
                output.trend = Some(trend);
            }
            None => skip(
                output,
                AnalysisKind::Trend,
                Some(time_column),
                "no parseable timestamps",
            ),
        }
        Ok(())
    }

    fn dimension_analyses(
        &self,
        df: &DataFrame,
        resolved: &ResolvedColumns,
        decisions: &[AnalysisDecision],
        output: &mut AggregationOutput,
    ) -> Result<()> {
        let Some(dimension) = resolved.core_dimension_name() else {
            return Ok(());
        };
        let wants_concentration = is_eligible(decisions, AnalysisKind::Concentration, None)
            || is_eligible(decisions, AnalysisKind::DimensionTopN, None)
            || is_eligible(decisions, AnalysisKind::CompanyPosition, None);
        let wants_coverage = is_eligible(decisions, AnalysisKind::Coverage, None);
        let wants_opportunity = is_eligible(decisions, AnalysisKind::Opportunity, None);
        let wants_leaders = is_eligible(decisions, AnalysisKind::SegmentLeaders, None);
        let wants_coverage_priority = is_eligible(decisions, AnalysisKind::CoverageOpportunity, None);
        let wants_price = is_eligible(decisions, AnalysisKind::PriceVolume, None);
        if !(wants_concentration
            || wants_coverage
            || wants_opportunity
            || wants_leaders
            || wants_coverage_priority
            || wants_price)
        {
            return Ok(());
        }

        let Some(series) = require_column(df, AnalysisKind::Concentration, dimension, output) else {
            return Ok(());
        };
        let entities = text_values(series)?;
        let value_column = resolved.value_column.as_deref();
        let values = match value_column.and_then(|name| column_series(df, name)) {
            Some(values) => Some(numeric_values(values)?),
            None => None,
        };

        if wants_concentration {
            self.concentration(dimension, value_column, &entities, values.as_deref(), decisions, output);
        }

        if wants_coverage && let Some(coverage_column) = resolved.coverage_column.as_deref() {
            if let Some(units) = require_column(df, AnalysisKind::Coverage, coverage_column, output) {
                let units = text_values(units)?;
                match CoverageAnalysis::compute(
                    dimension,
                    coverage_column,
                    value_column,
                    &entities,
                    &units,
                    values.as_deref(),
                ) {
                    Some(coverage) => output.coverage = Some(coverage),
                    None => skip(
                        output,
                        AnalysisKind::Coverage,
                        Some(coverage_column),
                        "no rows carry both an entity and a coverage unit",
                    ),
                }
            }
        }

        if wants_opportunity
            && let (Some(company), Some(segment_column)) =
                (self.config.company.as_deref(), resolved.segment_column.as_deref())
            && let Some(segments) = require_column(df, AnalysisKind::Opportunity, segment_column, output)
        {
            let segments = text_values(segments)?;
            match OpportunityAnalysis::compute(
                company,
                dimension,
                segment_column,
                &entities,
                &segments,
                values.as_deref(),
                self.config.opportunity_limit,
            ) {
                Some(opportunities) => output.opportunities = Some(opportunities),
                None => skip(
                    output,
                    AnalysisKind::Opportunity,
                    Some(segment_column),
                    "no segment has a positive total",
                ),
            }
        }

        if wants_leaders
            && let Some(segment_column) = resolved.segment_column.as_deref()
            && let Some(segments) = require_column(df, AnalysisKind::SegmentLeaders, segment_column, output)
        {
            let segments = text_values(segments)?;
            match SegmentLeadersAnalysis::compute(
                dimension,
                segment_column,
                value_column,
                &entities,
                &segments,
                values.as_deref(),
            ) {
                Some(leaders) => {
                    debug!(
                        "Leaders of '{}' across {} segments of '{}'",
                        dimension,
                        leaders.segments.len(),
                        segment_column
                    );
                    output.segment_leaders = Some(leaders);
                }
                None => skip(
                    output,
                    AnalysisKind::SegmentLeaders,
                    Some(segment_column),
                    "no segment has a positive total",
                ),
            }
        }

        if wants_coverage_priority
            && let (Some(company), Some(coverage_column)) =
                (self.config.company.as_deref(), resolved.coverage_column.as_deref())
            && let Some(units) =
                require_column(df, AnalysisKind::CoverageOpportunity, coverage_column, output)
        {
            let units = text_values(units)?;
            match OpportunityAnalysis::compute(
                company,
                dimension,
                coverage_column,
                &entities,
                &units,
                values.as_deref(),
                self.config.coverage_opportunity_limit,
            ) {
                Some(opportunities) => output.coverage_opportunities = Some(opportunities),
                None => skip(
                    output,
                    AnalysisKind::CoverageOpportunity,
                    Some(coverage_column),
                    "no coverage unit has a positive total",
                ),
            }
        }

        if wants_price
            && let (Some(price_column), Some(value_column)) =
                (resolved.price_column.as_deref(), value_column)
            && let Some(prices) = require_column(df, AnalysisKind::PriceVolume, price_column, output)
        {
            let prices = numeric_values(prices)?;
            let Some(volumes) = values.as_deref() else {
                skip(
                    output,
                    AnalysisKind::PriceVolume,
                    Some(value_column),
                    format!("column '{}' not found", value_column),
                );
                return Ok(());
            };
            match PriceVolumeAnalysis::compute(
                dimension,
                price_column,
                value_column,
                &entities,
                &prices,
                volumes,
            ) {
                Some(analysis) => {
                    debug!(
                        "Price-volume over {} rows, r = {:?}",
                        analysis.complete_rows, analysis.correlation
                    );
                    output.price_volume = Some(analysis);
                }
                None => skip(
                    output,
                    AnalysisKind::PriceVolume,
                    Some(price_column),
                    "fewer than three rows carry an entity, a price and a value",
                ),
            }
        }

        Ok(())
    }

    fn concentration(
        &self,
        dimension: &str,
        value_column: Option<&str>,
        entities: &[Option<String>],
        values: Option<&[Option<f64>]>,
        decisions: &[AnalysisDecision],
        output: &mut AggregationOutput,
    ) {
        let Some(concentration) =
            ConcentrationAnalysis::compute(dimension, value_column, entities, values)
        else {
            skip(
                output,
                AnalysisKind::Concentration,
                Some(dimension),
                "no entity has a positive total",
            );
            return;
        };

        if is_eligible(decisions, AnalysisKind::DimensionTopN, None) {
            output.dimension_top_n = concentration.top(self.config.top_n).to_vec();
        }

        if is_eligible(decisions, AnalysisKind::CompanyPosition, None)
            && let Some(company) = self.config.company.as_deref()
        {
            match CompanyPosition::locate(&concentration, company) {
                Some(position) => output.company_position = Some(position),
                None => skip(
                    output,
                    AnalysisKind::CompanyPosition,
                    Some(dimension),
                    format!("company '{}' not found in '{}'", company, dimension),
                ),
            }
        }

        if is_eligible(decisions, AnalysisKind::Concentration, None) {
            output.concentration = Some(concentration);
        }
    }
}

fn eligible(
    decisions: &[AnalysisDecision],
    kind: AnalysisKind,
) -> impl Iterator<Item = &AnalysisDecision> {
    decisions.iter().filter(move |d| d.kind == kind && d.eligible)
}

fn is_eligible(decisions: &[AnalysisDecision], kind: AnalysisKind, target: Option<&str>) -> bool {
    find_decision(decisions, kind, target).is_some_and(|d| d.eligible)
}

fn skip(
    output: &mut AggregationOutput,
    kind: AnalysisKind,
    target: Option<&str>,
    reason: impl Into<String>,
) {
    let skipped = SkippedAnalysis::new(kind, target, reason);
    warn!(
        "Skipping {} ({}): {}",
        kind.display_name(),
        target.unwrap_or("-"),
        skipped.reason
    );
    output.skipped.push(skipped);
}

/// Look up a column, recording a skip when the dataset lacks it.
fn require_column<'df>(
    df: &'df DataFrame,
    kind: AnalysisKind,
    column: &str,
    output: &mut AggregationOutput,
) -> Option<&'df Series> {
    let series = column_series(df, column);
    if series.is_none() {
        skip(output, kind, Some(column), format!("column '{}' not found", column));
    }
    series
}
