//! Chart plan handed to downstream renderers.
//!
//! The core never renders. A chart is planned only when its data carries
//! visual value; the plan names the exported table each chart draws from.

use crate::aggregator::AggregationOutput;
use crate::types::{AnalysisDecision, AnalysisKind, find_decision};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    BoxPlot,
    Bar,
    Heatmap,
    Line,
    Pareto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    /// Exported table name, e.g. `numeric_summary`.
    pub table: String,
    pub columns: Vec<String>,
}

impl ChartSpec {
    fn new(kind: ChartKind, title: impl Into<String>, table: &str, columns: Vec<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            table: table.to_string(),
            columns,
        }
    }
}

/// Plan every chart whose data carries visual value.
pub fn plan_charts(output: &AggregationOutput, decisions: &[AnalysisDecision]) -> Vec<ChartSpec> {
    let mut plan = Vec::new();

    if output.numeric_summaries.len() > 1 {
        plan.push(ChartSpec::new(
            ChartKind::BoxPlot,
            "Numeric distributions",
            "numeric_summary",
            output.numeric_summaries.iter().map(|s| s.column.clone()).collect(),
        ));
    }

    for top in output.top_n.iter().filter(|t| t.max_count() > 1) {
        plan.push(ChartSpec::new(
            ChartKind::Bar,
            format!("Top {} of {}", top.entries.len(), top.column),
            "categorical_topn",
            vec![top.column.clone()],
        ));
    }

    let correlation_eligible = find_decision(decisions, AnalysisKind::Correlation, None)
        .is_some_and(|d| d.eligible);
    if correlation_eligible && let Some(matrix) = &output.correlation {
        plan.push(ChartSpec::new(
            ChartKind::Heatmap,
            "Correlation matrix",
            "correlation_matrix",
            matrix.columns.clone(),
        ));
    }

    if let Some(trend) = output.trend.as_ref().filter(|t| t.points.len() > 2) {
        let mut columns = vec![trend.time_column.clone()];
        columns.extend(trend.value_column.clone());
        plan.push(ChartSpec::new(
            ChartKind::Line,
            format!("Trend by {}", trend.granularity),
            "trend",
            columns,
        ));
    }

    if let Some(concentration) = &output.concentration {
        plan.push(ChartSpec::new(
            ChartKind::Pareto,
            format!("Concentration of {}", concentration.dimension),
            "concentration",
            vec![concentration.dimension.clone()],
        ));
    }

    if let Some(coverage) = &output.coverage {
        plan.push(ChartSpec::new(
            ChartKind::Bar,
            format!("{} coverage by {}", coverage.coverage_column, coverage.dimension),
            "coverage",
            vec![coverage.dimension.clone(), coverage.coverage_column.clone()],
        ));
    }

    if let Some(opportunities) = output.opportunities.as_ref().filter(|o| !o.segments.is_empty()) {
        plan.push(ChartSpec::new(
            ChartKind::Bar,
            format!("Opportunity priority by {}", opportunities.segment_column),
            "opportunities",
            vec![opportunities.segment_column.clone()],
        ));
    }

    if let Some(leaders) = output.segment_leaders.as_ref().filter(|l| l.segments.len() > 1) {
        plan.push(ChartSpec::new(
            ChartKind::Bar,
            format!("Top {} by {}", leaders.dimension, leaders.segment_column),
            "segment_leaders",
            vec![leaders.segment_column.clone(), leaders.dimension.clone()],
        ));
    }

    if let Some(units) = output
        .coverage_opportunities
        .as_ref()
        .filter(|o| o.segments.len() > 1)
    {
        plan.push(ChartSpec::new(
            ChartKind::Bar,
            format!("Opportunity priority by {}", units.segment_column),
            "coverage_opportunities",
            vec![units.segment_column.clone()],
        ));
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{CorrelationMatrix, NumericSummary, SegmentLeadersAnalysis, TopNResult};
    use crate::types::GateReason;
    use pretty_assertions::assert_eq;

    fn summary(column: &str) -> NumericSummary {
        NumericSummary::compute(column, &[Some(1.0), Some(2.0), Some(4.0)]).unwrap()
    }

    #[test]
    fn test_empty_output_has_no_charts() {
        assert!(plan_charts(&AggregationOutput::default(), &[]).is_empty());
    }

    #[test]
    fn test_single_numeric_column_is_not_charted() {
        let output = AggregationOutput {
            numeric_summaries: vec![summary("a")],
            ..Default::default()
        };
        assert!(plan_charts(&output, &[]).is_empty());

        let output = AggregationOutput {
            numeric_summaries: vec![summary("a"), summary("b")],
            ..Default::default()
        };
        let plan = plan_charts(&output, &[]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].kind, ChartKind::BoxPlot);
    }

    #[test]
    fn test_flat_topn_is_not_charted() {
        let values: Vec<Option<String>> = ["a", "b", "c"].iter().map(|v| Some(v.to_string())).collect();
        let output = AggregationOutput {
            top_n: vec![TopNResult::compute("c", &values, 5).unwrap()],
            ..Default::default()
        };
        assert!(plan_charts(&output, &[]).is_empty());
    }

    #[test]
    fn test_correlation_chart_requires_eligibility() {
        let matrix = CorrelationMatrix {
            columns: vec!["a".to_string(), "b".to_string()],
            values: vec![vec![Some(1.0), Some(0.1)], vec![Some(0.1), Some(1.0)]],
        };
        let output = AggregationOutput {
            correlation: Some(matrix),
            ..Default::default()
        };
        let rejected = vec![AnalysisDecision::ineligible(
            AnalysisKind::Correlation,
            None,
            GateReason::NoValidCorrelation,
        )];
        assert!(plan_charts(&output, &rejected).is_empty());

        let accepted = vec![AnalysisDecision::eligible(
            AnalysisKind::Correlation,
            None,
            GateReason::Eligible,
        )];
        assert_eq!(plan_charts(&output, &accepted)[0].kind, ChartKind::Heatmap);
    }

    #[test]
    fn test_segment_leaders_need_two_segments() {
        let texts = |values: &[&str]| -> Vec<Option<String>> {
            values.iter().map(|v| Some(v.to_string())).collect()
        };
        let brands = texts(&["A", "B", "A"]);
        let one_city = SegmentLeadersAnalysis::compute(
            "brand",
            "city",
            None,
            &brands,
            &texts(&["X", "X", "X"]),
            None,
        );
        let output = AggregationOutput {
            segment_leaders: one_city,
            ..Default::default()
        };
        assert!(plan_charts(&output, &[]).is_empty());

        let two_cities = SegmentLeadersAnalysis::compute(
            "brand",
            "city",
            None,
            &brands,
            &texts(&["X", "Y", "X"]),
            None,
        );
        let output = AggregationOutput {
            segment_leaders: two_cities,
            ..Default::default()
        };
        let plan = plan_charts(&output, &[]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].table, "segment_leaders");
    }
}
