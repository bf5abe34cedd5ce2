//! Flat tables exported as CSV, one per analysis.
//!
//! Each builder returns `None` when the analysis produced no rows, so empty
//! CSV files are never written.

use crate::aggregator::segments::LEADER_COUNT;
use crate::aggregator::{AggregationOutput, NumericSummary, OpportunityAnalysis, SegmentLeaderRow};
use crate::insights::FieldOverview;
use polars::prelude::*;

/// A named table ready for export.
pub struct ExportTable {
    pub name: &'static str,
    pub frame: DataFrame,
}

/// Build every non-empty table, in export order.
pub fn build_tables(
    overview: &[FieldOverview],
    output: &AggregationOutput,
) -> PolarsResult<Vec<ExportTable>> {
    let candidates = [
        ("field_overview", field_overview_frame(overview)?),
        ("numeric_summary", numeric_summary_frame(output)?),
        ("categorical_topn", categorical_topn_frame(output)?),
        ("correlation_matrix", correlation_frame(output)?),
        ("trend", trend_frame(output)?),
        ("concentration", concentration_frame(output)?),
        ("coverage", coverage_frame(output)?),
        ("opportunities", opportunity_frame(output.opportunities.as_ref(), "segment")?),
        ("segment_leaders", segment_leaders_frame(output)?),
        (
            "coverage_opportunities",
            opportunity_frame(output.coverage_opportunities.as_ref(), "unit")?,
        ),
        ("price_volume", price_volume_frame(output)?),
    ];

    Ok(candidates
        .into_iter()
        .filter_map(|(name, frame)| frame.map(|frame| ExportTable { name, frame }))
        .collect())
}

fn first_row_only<T: Clone>(value: Option<T>, height: usize) -> Vec<Option<T>> {
    let mut column = vec![value];
    column.resize(height, None);
    column
}

fn counts(values: impl Iterator<Item = usize>) -> Vec<u64> {
    values.map(|v| v as u64).collect()
}

fn field_overview_frame(overview: &[FieldOverview]) -> PolarsResult<Option<DataFrame>> {
    if overview.is_empty() {
        return Ok(None);
    }
    let df = DataFrame::new(vec![
        Column::new(
            "field".into(),
            overview.iter().map(|f| f.name.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "type".into(),
            overview
                .iter()
                .map(|f| f.inferred_type.as_str().to_string())
                .collect::<Vec<_>>(),
        ),
        Column::new("null_count".into(), counts(overview.iter().map(|f| f.null_count))),
        Column::new(
            "null_rate".into(),
            overview.iter().map(|f| f.null_rate).collect::<Vec<_>>(),
        ),
        Column::new("unique_count".into(), counts(overview.iter().map(|f| f.unique_count))),
        Column::new(
            "unique_ratio".into(),
            overview.iter().map(|f| f.unique_ratio).collect::<Vec<_>>(),
        ),
        Column::new(
            "memory_mb".into(),
            overview.iter().map(|f| f.memory_mb).collect::<Vec<_>>(),
        ),
        Column::new(
            "sample_value".into(),
            overview
                .iter()
                .map(|f| f.sample_value.clone())
                .collect::<Vec<_>>(),
        ),
    ])?;
    Ok(Some(df))
}

fn numeric_summary_frame(output: &AggregationOutput) -> PolarsResult<Option<DataFrame>> {
    let rows = &output.numeric_summaries;
    if rows.is_empty() {
        return Ok(None);
    }
    let stat = |f: fn(&NumericSummary) -> f64| rows.iter().map(f).collect::<Vec<_>>();
    let df = DataFrame::new(vec![
        Column::new("column".into(), rows.iter().map(|s| s.column.clone()).collect::<Vec<_>>()),
        Column::new("count".into(), counts(rows.iter().map(|s| s.count))),
        Column::new("mean".into(), stat(|s| s.mean)),
        Column::new("median".into(), stat(|s| s.median)),
        Column::new("std".into(), rows.iter().map(|s| s.std).collect::<Vec<_>>()),
        Column::new("min".into(), stat(|s| s.min)),
        Column::new("q1".into(), stat(|s| s.q1)),
        Column::new("q3".into(), stat(|s| s.q3)),
        Column::new("iqr".into(), stat(NumericSummary::iqr)),
        Column::new("max".into(), stat(|s| s.max)),
        Column::new(
            "skew".into(),
            rows.iter()
                .map(|s| s.skew.as_str().to_string())
                .collect::<Vec<_>>(),
        ),
    ])?;
    Ok(Some(df))
}

fn categorical_topn_frame(output: &AggregationOutput) -> PolarsResult<Option<DataFrame>> {
    let mut column = Vec::new();
    let mut rank = Vec::new();
    let mut value = Vec::new();
    let mut count = Vec::new();
    let mut share = Vec::new();
    for top in &output.top_n {
        for (idx, entry) in top.entries.iter().enumerate() {
            column.push(top.column.clone());
            rank.push(idx as u64 + 1);
            value.push(entry.value.clone());
            count.push(entry.count as u64);
            share.push(entry.share);
        }
    }
    if column.is_empty() {
        return Ok(None);
    }
    let df = DataFrame::new(vec![
        Column::new("column".into(), column),
        Column::new("rank".into(), rank),
        Column::new("value".into(), value),
        Column::new("count".into(), count),
        Column::new("share".into(), share),
    ])?;
    Ok(Some(df))
}

/// Square matrix with a leading `column` label.
fn correlation_frame(output: &AggregationOutput) -> PolarsResult<Option<DataFrame>> {
    let Some(matrix) = output.correlation.as_ref().filter(|m| !m.columns.is_empty()) else {
        return Ok(None);
    };
    let mut columns = vec![Column::new("column".into(), matrix.columns.clone())];
    for (j, name) in matrix.columns.iter().enumerate() {
        let values: Vec<Option<f64>> = matrix.values.iter().map(|row| row[j]).collect();
        columns.push(Column::new(name.as_str().into(), values));
    }
    Ok(Some(DataFrame::new(columns)?))
}

fn trend_frame(output: &AggregationOutput) -> PolarsResult<Option<DataFrame>> {
    let Some(trend) = output.trend.as_ref().filter(|t| !t.points.is_empty()) else {
        return Ok(None);
    };
    let points = &trend.points;
    let df = DataFrame::new(vec![
        Column::new("period".into(), points.iter().map(|p| p.period.clone()).collect::<Vec<_>>()),
        Column::new(
            "period_start".into(),
            points
                .iter()
                .map(|p| p.period_start.format("%Y-%m-%d").to_string())
                .collect::<Vec<_>>(),
        ),
        Column::new("value".into(), points.iter().map(|p| p.value).collect::<Vec<_>>()),
        Column::new("row_count".into(), counts(points.iter().map(|p| p.row_count))),
        Column::new("pop_delta".into(), points.iter().map(|p| p.pop_delta).collect::<Vec<_>>()),
        Column::new("pop_pct".into(), points.iter().map(|p| p.pop_pct).collect::<Vec<_>>()),
        Column::new("yoy_delta".into(), points.iter().map(|p| p.yoy_delta).collect::<Vec<_>>()),
        Column::new("yoy_pct".into(), points.iter().map(|p| p.yoy_pct).collect::<Vec<_>>()),
    ])?;
    Ok(Some(df))
}

fn concentration_frame(output: &AggregationOutput) -> PolarsResult<Option<DataFrame>> {
    let Some(conc) = output.concentration.as_ref().filter(|c| !c.ranking.is_empty()) else {
        return Ok(None);
    };
    let ranking = &conc.ranking;
    let df = DataFrame::new(vec![
        Column::new("rank".into(), counts(ranking.iter().map(|e| e.rank))),
        Column::new(
            "entity".into(),
            ranking.iter().map(|e| e.entity.clone()).collect::<Vec<_>>(),
        ),
        Column::new("value".into(), ranking.iter().map(|e| e.value).collect::<Vec<_>>()),
        Column::new("share".into(), ranking.iter().map(|e| e.share).collect::<Vec<_>>()),
        Column::new(
            "cumulative_share".into(),
            ranking.iter().map(|e| e.cumulative_share).collect::<Vec<_>>(),
        ),
    ])?;
    Ok(Some(df))
}

fn coverage_frame(output: &AggregationOutput) -> PolarsResult<Option<DataFrame>> {
    let Some(coverage) = output.coverage.as_ref().filter(|c| !c.rows.is_empty()) else {
        return Ok(None);
    };
    let rows = &coverage.rows;
    let df = DataFrame::new(vec![
        Column::new(
            "entity".into(),
            rows.iter().map(|r| r.entity.clone()).collect::<Vec<_>>(),
        ),
        Column::new("total_value".into(), rows.iter().map(|r| r.total_value).collect::<Vec<_>>()),
        Column::new("covered_units".into(), counts(rows.iter().map(|r| r.covered_units))),
        Column::new(
            "value_per_unit".into(),
            rows.iter().map(|r| r.value_per_unit).collect::<Vec<_>>(),
        ),
        Column::new("share".into(), rows.iter().map(|r| r.share).collect::<Vec<_>>()),
    ])?;
    Ok(Some(df))
}

/// Shared by segment and coverage-unit scoring; `label` names the scored column.
fn opportunity_frame(
    analysis: Option<&OpportunityAnalysis>,
    label: &str,
) -> PolarsResult<Option<DataFrame>> {
    let Some(analysis) = analysis.filter(|o| !o.segments.is_empty()) else {
        return Ok(None);
    };
    let segments = &analysis.segments;
    let df = DataFrame::new(vec![
        Column::new("rank".into(), (1..=segments.len() as u64).collect::<Vec<_>>()),
        Column::new(
            label.into(),
            segments.iter().map(|s| s.segment.clone()).collect::<Vec<_>>(),
        ),
        Column::new("total".into(), segments.iter().map(|s| s.total).collect::<Vec<_>>()),
        Column::new(
            "company_volume".into(),
            segments.iter().map(|s| s.company_volume).collect::<Vec<_>>(),
        ),
        Column::new(
            "company_share".into(),
            segments.iter().map(|s| s.company_share).collect::<Vec<_>>(),
        ),
        Column::new("impact".into(), segments.iter().map(|s| s.impact_score).collect::<Vec<_>>()),
        Column::new(
            "feasibility".into(),
            segments.iter().map(|s| s.feasibility_score).collect::<Vec<_>>(),
        ),
        Column::new(
            "efficiency".into(),
            segments.iter().map(|s| s.efficiency_score).collect::<Vec<_>>(),
        ),
        Column::new(
            "composite".into(),
            segments.iter().map(|s| s.composite_score).collect::<Vec<_>>(),
        ),
        Column::new(
            "level".into(),
            segments.iter().map(|s| s.level.to_string()).collect::<Vec<_>>(),
        ),
        Column::new("reason".into(), segments.iter().map(|s| s.reason.clone()).collect::<Vec<_>>()),
    ])?;
    Ok(Some(df))
}

/// One row per segment with the top entities spread across columns.
fn segment_leaders_frame(output: &AggregationOutput) -> PolarsResult<Option<DataFrame>> {
    let Some(analysis) = output.segment_leaders.as_ref().filter(|a| !a.segments.is_empty()) else {
        return Ok(None);
    };
    let rows = &analysis.segments;
    let mut columns = vec![
        Column::new("segment".into(), rows.iter().map(|r| r.segment.clone()).collect::<Vec<_>>()),
        Column::new(
            "segment_total".into(),
            rows.iter().map(|r| r.segment_total).collect::<Vec<_>>(),
        ),
    ];
    for slot in 0..LEADER_COUNT {
        let leader = |r: &SegmentLeaderRow| r.leaders.get(slot).cloned();
        columns.push(Column::new(
            format!("top{}_entity", slot + 1).into(),
            rows.iter()
                .map(|r| leader(r).map(|l| l.entity))
                .collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            format!("top{}_value", slot + 1).into(),
            rows.iter().map(|r| leader(r).map(|l| l.value)).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            format!("top{}_share", slot + 1).into(),
            rows.iter().map(|r| leader(r).map(|l| l.share)).collect::<Vec<_>>(),
        ));
    }
    columns.push(Column::new("cr3".into(), rows.iter().map(|r| r.cr3).collect::<Vec<_>>()));
    Ok(Some(DataFrame::new(columns)?))
}

/// An `overall` row with the coefficient and medians, then one row per
/// quadrant entity.
fn price_volume_frame(output: &AggregationOutput) -> PolarsResult<Option<DataFrame>> {
    let Some(analysis) = output.price_volume.as_ref() else {
        return Ok(None);
    };
    let mut group = vec!["overall".to_string()];
    let mut entity: Vec<Option<String>> = vec![None];
    let quadrants = [
        ("low_price_high_volume", &analysis.low_price_high_volume),
        ("high_price_low_volume", &analysis.high_price_low_volume),
    ];
    for (name, entities) in quadrants {
        for e in entities {
            group.push(name.to_string());
            entity.push(Some(e.clone()));
        }
    }
    let height = group.len();
    let df = DataFrame::new(vec![
        Column::new("group".into(), group),
        Column::new("entity".into(), entity),
        Column::new("correlation".into(), first_row_only(analysis.correlation, height)),
        Column::new(
            "relation".into(),
            first_row_only(analysis.relation.map(|r| r.as_str().to_string()), height),
        ),
        Column::new(
            "complete_rows".into(),
            first_row_only(Some(analysis.complete_rows as u64), height),
        ),
        Column::new("price_median".into(), first_row_only(Some(analysis.price_median), height)),
        Column::new("value_median".into(), first_row_only(Some(analysis.value_median), height)),
    ])?;
    Ok(Some(df))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{CorrelationMatrix, PriceVolumeAnalysis, SegmentLeadersAnalysis};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_inputs_produce_no_tables() {
        let tables = build_tables(&[], &AggregationOutput::default()).unwrap();
        assert!(tables.is_empty());
    }

    #[test]
    fn test_numeric_summary_table() {
        let output = AggregationOutput {
            numeric_summaries: vec![
                NumericSummary::compute("units", &[Some(1.0), Some(3.0)]).unwrap(),
                NumericSummary::compute("amount", &[Some(5.0)]).unwrap(),
            ],
            ..Default::default()
        };
        let tables = build_tables(&[], &output).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "numeric_summary");
        let df = &tables[0].frame;
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("std").unwrap().null_count(), 1);
        let iqr = df.column("iqr").unwrap().as_materialized_series().f64().unwrap().get(0);
        assert_eq!(iqr, Some(1.0));
    }

    #[test]
    fn test_correlation_table_is_square() {
        let output = AggregationOutput {
            correlation: Some(CorrelationMatrix {
                columns: vec!["a".to_string(), "b".to_string()],
                values: vec![vec![Some(1.0), Some(0.5)], vec![Some(0.5), Some(1.0)]],
            }),
            ..Default::default()
        };
        let tables = build_tables(&[], &output).unwrap();
        let df = &tables[0].frame;
        assert_eq!(df.shape(), (2, 3));
        assert_eq!(df.column("b").unwrap().as_materialized_series().f64().unwrap().get(0), Some(0.5));
    }

    fn texts(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_segment_leaders_table_spreads_top_three() {
        let leaders = SegmentLeadersAnalysis::compute(
            "brand",
            "city",
            Some("units"),
            &texts(&["A", "B", "C", "D", "A"]),
            &texts(&["X", "X", "X", "X", "Y"]),
            Some([Some(4.0), Some(3.0), Some(2.0), Some(1.0), Some(5.0)].as_slice()),
        );
        let output = AggregationOutput {
            segment_leaders: leaders,
            ..Default::default()
        };
        let tables = build_tables(&[], &output).unwrap();
        assert_eq!(tables[0].name, "segment_leaders");
        let df = &tables[0].frame;
        assert_eq!(df.shape(), (2, 12));
        let top2 = df.column("top2_entity").unwrap().as_materialized_series().str().unwrap().clone();
        assert_eq!(top2.get(0), Some("B"));
        assert_eq!(top2.get(1), None);
        let cr3 = df.column("cr3").unwrap().as_materialized_series().f64().unwrap().get(0);
        assert_eq!(cr3, Some(90.0));
    }

    #[test]
    fn test_price_volume_table_leads_with_overall_row() {
        let analysis = PriceVolumeAnalysis::compute(
            "brand",
            "unit_price",
            "units",
            &texts(&["A", "B", "C", "D"]),
            &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
            &[Some(40.0), Some(30.0), Some(20.0), Some(10.0)],
        );
        let output = AggregationOutput {
            price_volume: analysis,
            ..Default::default()
        };
        let tables = build_tables(&[], &output).unwrap();
        let df = &tables[0].frame;
        assert_eq!(tables[0].name, "price_volume");
        assert_eq!(df.height(), 5);
        let group = df.column("group").unwrap().as_materialized_series().str().unwrap().clone();
        assert_eq!(group.get(0), Some("overall"));
        assert_eq!(group.get(1), Some("low_price_high_volume"));
        let relation = df.column("relation").unwrap().as_materialized_series().str().unwrap().clone();
        assert_eq!(relation.get(0), Some("strong"));
        assert_eq!(relation.get(1), None);
    }

    #[test]
    fn test_coverage_priority_table_labels_units() {
        let analysis = OpportunityAnalysis::compute(
            "A",
            "brand",
            "hospital",
            &texts(&["A", "B", "A", "B"]),
            &texts(&["H1", "H1", "H2", "H2"]),
            Some([Some(1.0), Some(9.0), Some(5.0), Some(5.0)].as_slice()),
            10,
        );
        let output = AggregationOutput {
            coverage_opportunities: analysis,
            ..Default::default()
        };
        let tables = build_tables(&[], &output).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "coverage_opportunities");
        assert!(tables[0].frame.column("unit").is_ok());
        assert!(tables[0].frame.column("segment").is_err());
    }
}
