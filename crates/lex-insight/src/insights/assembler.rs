//! Turns aggregation output into structured insight records.

use crate::aggregator::{AggregationOutput, SkewIndicator};
use crate::types::{
    AnalysisDecision, AnalysisKind, ColumnType, DatasetProfile, InsightCategory, InsightRecord,
    find_decision,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One row of the field overview table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOverview {
    pub name: String,
    pub inferred_type: ColumnType,
    pub null_count: usize,
    pub null_rate: f64,
    pub unique_count: usize,
    pub unique_ratio: f64,
    pub memory_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_value: Option<String>,
}

pub fn field_overview(profile: &DatasetProfile) -> Vec<FieldOverview> {
    profile
        .columns
        .iter()
        .map(|c| FieldOverview {
            name: c.name.clone(),
            inferred_type: c.inferred_type,
            null_count: c.null_count,
            null_rate: c.null_rate,
            unique_count: c.unique_count,
            unique_ratio: c.unique_ratio,
            memory_mb: c.memory_mb(),
            sample_value: c.sample_value.clone(),
        })
        .collect()
}

/// Builds insight records in a fixed category order.
pub struct InsightAssembler<'a> {
    profile: &'a DatasetProfile,
    output: &'a AggregationOutput,
    decisions: &'a [AnalysisDecision],
}

impl<'a> InsightAssembler<'a> {
    pub fn new(
        profile: &'a DatasetProfile,
        output: &'a AggregationOutput,
        decisions: &'a [AnalysisDecision],
    ) -> Self {
        Self {
            profile,
            output,
            decisions,
        }
    }

    pub fn assemble(&self) -> Vec<InsightRecord> {
        let mut records = vec![self.overview()];
        records.extend(self.numeric());
        records.extend(self.distribution());
        records.extend(self.correlation());
        records.extend(self.trend());
        records.extend(self.concentration());
        records.extend(self.coverage());
        records.extend(self.company());
        records.extend(self.opportunity());
        records.extend(self.segment_leaders());
        records.extend(self.coverage_opportunity());
        records.extend(self.price_volume());
        records
    }

    fn overview(&self) -> InsightRecord {
        let count = |t: ColumnType| self.profile.columns_of(t).count();
        let (numeric, categorical, datetime, identifier) = (
            count(ColumnType::Numeric),
            count(ColumnType::Categorical),
            count(ColumnType::Datetime),
            count(ColumnType::Identifier),
        );
        InsightRecord::new(
            InsightCategory::Overview,
            "dataset_shape",
            json!({
                "rows": self.profile.row_count,
                "columns": self.profile.column_count,
                "numeric": numeric,
                "categorical": categorical,
                "datetime": datetime,
                "identifier": identifier,
                "duplicate_rows": self.profile.duplicate_rows,
            }),
            format!(
                "{} rows x {} columns ({} numeric, {} categorical, {} datetime, {} identifier), {} duplicate row(s)",
                self.profile.row_count,
                self.profile.column_count,
                numeric,
                categorical,
                datetime,
                identifier,
                self.profile.duplicate_rows
            ),
        )
    }

    fn numeric(&self) -> Vec<InsightRecord> {
        let summaries = &self.output.numeric_summaries;
        let mut records = Vec::new();

        if let Some(top) = summaries
            .iter()
            .max_by(|a, b| a.mean.total_cmp(&b.mean))
        {
            records.push(
                InsightRecord::new(
                    InsightCategory::Numeric,
                    "highest_mean",
                    json!({ "column": top.column, "mean": top.mean }),
                    format!("{} has the highest average ({:.2})", top.column, top.mean),
                )
                .with_columns([top.column.as_str()]),
            );
        }

        if summaries.len() > 1
            && let Some(volatile) = summaries
                .iter()
                .filter(|s| s.std.is_some())
                .max_by(|a, b| a.std.unwrap_or(0.0).total_cmp(&b.std.unwrap_or(0.0)))
        {
            let std = volatile.std.unwrap_or(0.0);
            records.push(
                InsightRecord::new(
                    InsightCategory::Numeric,
                    "most_volatile",
                    json!({ "column": volatile.column, "std": std }),
                    format!(
                        "{} varies the most (std {:.2}); check where the swings come from",
                        volatile.column, std
                    ),
                )
                .with_columns([volatile.column.as_str()]),
            );
        }

        let skewed: Vec<_> = summaries
            .iter()
            .filter(|s| s.skew != SkewIndicator::Symmetric)
            .collect();
        if !skewed.is_empty() {
            let listed: Vec<String> = skewed
                .iter()
                .map(|s| format!("{} ({})", s.column, s.skew.as_str()))
                .collect();
            records.push(
                InsightRecord::new(
                    InsightCategory::Numeric,
                    "skewed_metrics",
                    json!(skewed
                        .iter()
                        .map(|s| json!({ "column": s.column, "skew": s.skew }))
                        .collect::<Vec<_>>()),
                    format!("Skewed metrics: {}", listed.join(", ")),
                )
                .with_columns(skewed.iter().map(|s| s.column.as_str())),
            );
        }

        records
    }

    fn distribution(&self) -> Vec<InsightRecord> {
        let leader = self
            .output
            .top_n
            .iter()
            .filter_map(|t| t.leader().map(|l| (t, l)))
            .max_by(|a, b| a.1.share.total_cmp(&b.1.share));

        leader
            .map(|(top, entry)| {
                InsightRecord::new(
                    InsightCategory::Distribution,
                    "top_category_share",
                    json!({
                        "column": top.column,
                        "category": entry.value,
                        "share_pct": entry.share * 100.0,
                        "concentration_pct": top.concentration * 100.0,
                    }),
                    format!(
                        "'{}' makes up {:.2}% of {}",
                        entry.value,
                        entry.share * 100.0,
                        top.column
                    ),
                )
                .with_columns([top.column.as_str()])
            })
            .into_iter()
            .collect()
    }

    fn correlation(&self) -> Option<InsightRecord> {
        let eligible = find_decision(self.decisions, AnalysisKind::Correlation, None)
            .is_some_and(|d| d.eligible);
        if !eligible {
            return None;
        }
        let pair = self.output.correlation.as_ref()?.strongest_pair()?;
        Some(
            InsightRecord::new(
                InsightCategory::Correlation,
                "strongest_correlation",
                json!({ "left": pair.left, "right": pair.right, "r": pair.coefficient }),
                format!(
                    "{} and {} correlate at r = {:.2}",
                    pair.left, pair.right, pair.coefficient
                ),
            )
            .with_columns([pair.left.as_str(), pair.right.as_str()]),
        )
    }

    fn trend(&self) -> Vec<InsightRecord> {
        let Some(trend) = &self.output.trend else {
            return Vec::new();
        };
        let mut columns = vec![trend.time_column.clone()];
        columns.extend(trend.value_column.clone());

        let mut records = vec![
            InsightRecord::new(
                InsightCategory::Trend,
                "trend_direction",
                json!({
                    "granularity": trend.granularity,
                    "direction": trend.summary.direction,
                    "start": trend.summary.start_value,
                    "end": trend.summary.end_value,
                    "change_pct": trend.summary.change_pct,
                }),
                format!(
                    "Trend by {} is {}: {:.2} -> {:.2}",
                    trend.granularity,
                    trend.summary.direction.as_str(),
                    trend.summary.start_value,
                    trend.summary.end_value
                ),
            )
            .with_columns(columns.clone()),
        ];

        if let Some(latest) = trend.latest().filter(|p| p.pop_delta.is_some()) {
            let mut summary = format!(
                "{}: {:+.2} vs previous period",
                latest.period,
                latest.pop_delta.unwrap_or(0.0)
            );
            if let Some(yoy) = latest.yoy_delta {
                summary.push_str(&format!(", {:+.2} year over year", yoy));
            }
            records.push(
                InsightRecord::new(
                    InsightCategory::Trend,
                    "latest_change",
                    json!({
                        "period": latest.period,
                        "pop_delta": latest.pop_delta,
                        "pop_pct": latest.pop_pct,
                        "yoy_delta": latest.yoy_delta,
                        "yoy_pct": latest.yoy_pct,
                    }),
                    summary,
                )
                .with_columns(columns),
            );
        }
        records
    }

    fn concentration(&self) -> Vec<InsightRecord> {
        let Some(c) = &self.output.concentration else {
            return Vec::new();
        };
        let mut records = vec![
            InsightRecord::new(
                InsightCategory::Concentration,
                "concentration",
                json!({
                    "entity_count": c.entity_count,
                    "top1_share": c.top1_share,
                    "top3_share": c.top3_share,
                    "top5_share": c.top5_share,
                    "entities_for_80": c.entities_for_80,
                    "entities_for_90": c.entities_for_90,
                }),
                format!(
                    "Top 3 of {} {} entries hold {:.1}%; {} entries cover 80%",
                    c.entity_count, c.dimension, c.top3_share, c.entities_for_80
                ),
            )
            .with_columns([c.dimension.as_str()]),
        ];

        if c.entity_count > c.head.len() {
            let tail: Vec<&str> = c.tail.iter().map(|e| e.entity.as_str()).collect();
            records.push(
                InsightRecord::new(
                    InsightCategory::Concentration,
                    "tail_entities",
                    json!(tail),
                    format!("Smallest {} entries: {}", c.dimension, tail.join(", ")),
                )
                .with_columns([c.dimension.as_str()]),
            );
        }
        records
    }

    fn coverage(&self) -> Option<InsightRecord> {
        let coverage = self.output.coverage.as_ref()?;
        let widest = coverage.widest()?;
        Some(
            InsightRecord::new(
                InsightCategory::Coverage,
                "widest_coverage",
                json!({
                    "entity": widest.entity,
                    "covered_units": widest.covered_units,
                    "total_units": coverage.total_units,
                    "value_per_unit": widest.value_per_unit,
                }),
                format!(
                    "{} reaches {} of {} {} values",
                    widest.entity, widest.covered_units, coverage.total_units, coverage.coverage_column
                ),
            )
            .with_columns([coverage.dimension.as_str(), coverage.coverage_column.as_str()]),
        )
    }

    fn company(&self) -> Option<InsightRecord> {
        let position = self.output.company_position.as_ref()?;
        let summary = if position.is_leader() {
            format!(
                "{} leads with {:.2}% share",
                position.company, position.share
            )
        } else {
            format!(
                "{} ranks #{} with {:.2}% share, {:.2} points behind {}",
                position.company, position.rank, position.share, position.share_gap, position.leader
            )
        };
        Some(InsightRecord::new(
            InsightCategory::Company,
            "company_position",
            json!(position),
            summary,
        ))
    }

    fn opportunity(&self) -> Option<InsightRecord> {
        let opportunities = self.output.opportunities.as_ref()?;
        let top = opportunities.top()?;
        Some(
            InsightRecord::new(
                InsightCategory::Opportunity,
                "top_opportunity",
                json!({
                    "segment": top.segment,
                    "composite_score": top.composite_score,
                    "level": top.level,
                    "company_share": top.company_share,
                }),
                format!(
                    "{} is the top {} (score {:.1}, {} priority): {}",
                    top.segment,
                    opportunities.segment_column,
                    top.composite_score,
                    top.level,
                    top.reason
                ),
            )
            .with_columns([opportunities.segment_column.as_str()]),
        )
    }

    /// The most concentrated segment by CR3; ties keep the first.
    fn segment_leaders(&self) -> Option<InsightRecord> {
        let analysis = self.output.segment_leaders.as_ref()?;
        let tightest = analysis
            .segments
            .iter()
            .min_by(|a, b| b.cr3.partial_cmp(&a.cr3).unwrap_or(std::cmp::Ordering::Equal))?;
        let leader = tightest.leaders.first()?;
        Some(
            InsightRecord::new(
                InsightCategory::Segment,
                "segment_leaders",
                json!({
                    "segments": analysis.segments.len(),
                    "most_concentrated": tightest.segment,
                    "cr3": tightest.cr3,
                    "leader": leader.entity,
                    "leader_share": leader.share,
                }),
                format!(
                    "{} {} is the most concentrated (CR3 {:.1}%), led by {} at {:.1}%",
                    analysis.segment_column, tightest.segment, tightest.cr3, leader.entity, leader.share
                ),
            )
            .with_columns([analysis.segment_column.as_str(), analysis.dimension.as_str()]),
        )
    }

    fn coverage_opportunity(&self) -> Option<InsightRecord> {
        let opportunities = self.output.coverage_opportunities.as_ref()?;
        let top = opportunities.top()?;
        Some(
            InsightRecord::new(
                InsightCategory::Opportunity,
                "top_coverage_opportunity",
                json!({
                    "unit": top.segment,
                    "composite_score": top.composite_score,
                    "level": top.level,
                    "company_share": top.company_share,
                    "evaluated_units": opportunities.evaluated_segments,
                }),
                format!(
                    "{} is the top {} for {} (score {:.1}, {} priority): {}",
                    top.segment,
                    opportunities.segment_column,
                    opportunities.company,
                    top.composite_score,
                    top.level,
                    top.reason
                ),
            )
            .with_columns([opportunities.segment_column.as_str()]),
        )
    }

    fn price_volume(&self) -> Option<InsightRecord> {
        let analysis = self.output.price_volume.as_ref()?;
        let relation = match (analysis.correlation, analysis.relation) {
            (Some(r), Some(relation)) => format!("r = {:.2}, {} relation", r, relation),
            _ => "no defined correlation".to_string(),
        };
        let mut summary = format!(
            "{} vs {} over {} rows: {}",
            analysis.price_column, analysis.value_column, analysis.complete_rows, relation
        );
        if !analysis.low_price_high_volume.is_empty() {
            summary.push_str(&format!(
                "; low price, high volume: {}",
                analysis.low_price_high_volume.join(", ")
            ));
        }
        if !analysis.high_price_low_volume.is_empty() {
            summary.push_str(&format!(
                "; high price, low volume: {}",
                analysis.high_price_low_volume.join(", ")
            ));
        }
        Some(
            InsightRecord::new(InsightCategory::Price, "price_volume", json!(analysis), summary)
                .with_columns([
                    analysis.price_column.as_str(),
                    analysis.value_column.as_str(),
                    analysis.dimension.as_str(),
                ]),
        )
    }
}
