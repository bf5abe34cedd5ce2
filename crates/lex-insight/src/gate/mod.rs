//! Noise-reduction gate.
//!
//! Decides which analyses are worth running from the column profiles and the
//! resolved columns alone. Correlation is gated in two phases: the first
//! phase only checks that two numeric columns exist, the second phase runs
//! on the computed matrix through [`NoiseGate::gate_correlation`].
//!
//! Every decision carries a typed [`GateReason`] and is logged at debug level.

use crate::aggregator::CorrelationMatrix;
use crate::config::{ChartsMode, GateThresholds};
use crate::insights::ChartSpec;
use crate::types::{
    AnalysisDecision, AnalysisKind, ColumnProfile, ColumnType, DatasetProfile, GateReason,
    ResolutionSource, ResolvedColumns,
};
use tracing::{debug, info};

/// Applies the fixed threshold table to a profiled dataset.
pub struct NoiseGate {
    thresholds: GateThresholds,
}

impl Default for NoiseGate {
    fn default() -> Self {
        Self::new(GateThresholds::default())
    }
}

impl NoiseGate {
    pub fn new(thresholds: GateThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &GateThresholds {
        &self.thresholds
    }

    /// Evaluate every rule that does not need computed results.
    ///
    /// Decisions come out in a fixed order: numeric summaries and TopN per
    /// column, then correlation, trend and the core-dimension analyses.
    pub fn evaluate(
        &self,
        profile: &DatasetProfile,
        resolved: &ResolvedColumns,
        company: Option<&str>,
    ) -> Vec<AnalysisDecision> {
        let mut decisions = Vec::new();

        for column in &profile.columns {
            if column.inferred_type == ColumnType::Numeric {
                decisions.push(self.numeric_summary(column));
            }
        }
        for column in &profile.columns {
            decisions.push(self.categorical_top_n(column));
        }
        decisions.push(self.correlation_precondition(profile));
        decisions.push(self.trend(resolved));
        decisions.extend(self.dimension_scoped(resolved, company));

        for decision in &decisions {
            log_decision(decision);
        }
        info!(
            "Gate: {} of {} analyses eligible",
            decisions.iter().filter(|d| d.eligible).count(),
            decisions.len()
        );
        decisions
    }

    /// TopN cardinality rule: `min <= unique_count <= max` and
    /// `unique_ratio < max_ratio`.
    pub fn topn_eligible(&self, unique_count: usize, unique_ratio: f64) -> bool {
        self.topn_reason(unique_count, unique_ratio).is_none()
    }

    fn topn_reason(&self, unique_count: usize, unique_ratio: f64) -> Option<GateReason> {
        let t = &self.thresholds;
        if unique_ratio >= t.topn_max_unique_ratio {
            Some(GateReason::NearUniqueValues {
                unique_ratio,
                max: t.topn_max_unique_ratio,
            })
        } else if unique_count < t.topn_min_unique {
            Some(GateReason::TooFewCategories {
                unique_count,
                min: t.topn_min_unique,
            })
        } else if unique_count > t.topn_max_unique {
            Some(GateReason::TooManyCategories {
                unique_count,
                max: t.topn_max_unique,
            })
        } else {
            None
        }
    }

    fn numeric_summary(&self, column: &ColumnProfile) -> AnalysisDecision {
        let target = Some(column.name.as_str());
        if column.non_null_count() == 0 {
            AnalysisDecision::ineligible(AnalysisKind::NumericSummary, target, GateReason::NoNonNullValues)
        } else {
            AnalysisDecision::eligible(AnalysisKind::NumericSummary, target, GateReason::Eligible)
        }
    }

    fn categorical_top_n(&self, column: &ColumnProfile) -> AnalysisDecision {
        let target = Some(column.name.as_str());
        let kind = AnalysisKind::CategoricalTopN;

        if !column.inferred_type.is_dimension_like() {
            return AnalysisDecision::ineligible(
                kind,
                target,
                GateReason::NotCategorical {
                    inferred_type: column.inferred_type,
                },
            );
        }
        match self.topn_reason(column.unique_count, column.unique_ratio) {
            Some(reason) => AnalysisDecision::ineligible(kind, target, reason),
            None => AnalysisDecision::eligible(kind, target, GateReason::Eligible),
        }
    }

    fn correlation_precondition(&self, profile: &DatasetProfile) -> AnalysisDecision {
        let found = profile
            .columns_of(ColumnType::Numeric)
            .filter(|c| c.non_null_count() > 0)
            .count();
        if found >= 2 {
            AnalysisDecision::eligible(AnalysisKind::Correlation, None, GateReason::Eligible)
        } else {
            AnalysisDecision::ineligible(
                AnalysisKind::Correlation,
                None,
                GateReason::InsufficientNumericColumns { found },
            )
        }
    }

    /// Second phase of the correlation rule, applied to the computed matrix.
    pub fn gate_correlation(&self, matrix: &CorrelationMatrix) -> AnalysisDecision {
        let kind = AnalysisKind::Correlation;
        let decision = match matrix.max_abs_off_diagonal() {
            None => AnalysisDecision::ineligible(kind, None, GateReason::NoValidCorrelation),
            Some(max_abs) if max_abs >= self.thresholds.correlation_min_abs => {
                AnalysisDecision::eligible(kind, None, GateReason::Eligible)
            }
            Some(max_abs) => AnalysisDecision::ineligible(
                kind,
                None,
                GateReason::BelowCorrelationThreshold {
                    max_abs,
                    threshold: self.thresholds.correlation_min_abs,
                },
            ),
        };
        log_decision(&decision);
        decision
    }

    /// Settle an eligible first-phase correlation decision.
    ///
    /// With a matrix the second phase replaces it. Without one, fewer than two
    /// numeric columns survived summarization and the decision turns
    /// ineligible with the surviving count.
    pub fn apply_correlation_gate(
        &self,
        decisions: &mut Vec<AnalysisDecision>,
        matrix: Option<&CorrelationMatrix>,
        summarized_columns: usize,
    ) -> Option<AnalysisDecision> {
        let slot = decisions
            .iter_mut()
            .find(|d| d.kind == AnalysisKind::Correlation && d.eligible)?;
        let decision = match matrix {
            Some(matrix) => self.gate_correlation(matrix),
            None => {
                let decision = AnalysisDecision::ineligible(
                    AnalysisKind::Correlation,
                    None,
                    GateReason::InsufficientNumericColumns {
                        found: summarized_columns,
                    },
                );
                log_decision(&decision);
                decision
            }
        };
        *slot = decision.clone();
        Some(decision)
    }

    fn trend(&self, resolved: &ResolvedColumns) -> AnalysisDecision {
        let kind = AnalysisKind::Trend;
        match (&resolved.time_column, &resolved.missing_time_column) {
            (Some(time), _) => {
                let column = time.column.clone();
                let reason = match time.source {
                    ResolutionSource::Explicit => GateReason::TimeColumnSupplied { column },
                    ResolutionSource::Inferred => GateReason::TimeColumnDetected { column },
                };
                AnalysisDecision::eligible(kind, Some(time.column.as_str()), reason)
            }
            (None, Some(missing)) => AnalysisDecision::ineligible(
                kind,
                Some(missing.as_str()),
                GateReason::TimeColumnNotFound {
                    column: missing.clone(),
                },
            ),
            (None, None) => AnalysisDecision::ineligible(kind, None, GateReason::NoTimeColumn),
        }
    }

    fn dimension_scoped(
        &self,
        resolved: &ResolvedColumns,
        company: Option<&str>,
    ) -> Vec<AnalysisDecision> {
        let scoped = [
            AnalysisKind::Concentration,
            AnalysisKind::DimensionTopN,
            AnalysisKind::Coverage,
            AnalysisKind::CompanyPosition,
            AnalysisKind::Opportunity,
            AnalysisKind::SegmentLeaders,
            AnalysisKind::CoverageOpportunity,
            AnalysisKind::PriceVolume,
        ];

        let Some(dimension) = resolved.core_dimension_name() else {
            return scoped
                .into_iter()
                .map(|kind| AnalysisDecision::ineligible(kind, None, GateReason::NoCoreDimension))
                .collect();
        };
        let target = Some(dimension);
        let resolved_reason = || GateReason::CoreDimensionResolved {
            column: dimension.to_string(),
        };
        let company = company.map(str::trim).filter(|c| !c.is_empty());

        scoped
            .into_iter()
            .map(|kind| {
                let missing = match kind {
                    AnalysisKind::Coverage if resolved.coverage_column.is_none() => {
                        Some(GateReason::NoCoverageColumn)
                    }
                    AnalysisKind::CompanyPosition if company.is_none() => Some(GateReason::NoCompany),
                    AnalysisKind::Opportunity if company.is_none() => Some(GateReason::NoCompany),
                    AnalysisKind::Opportunity | AnalysisKind::SegmentLeaders
                        if resolved.segment_column.is_none() =>
                    {
                        Some(GateReason::NoSegmentColumn)
                    }
                    AnalysisKind::CoverageOpportunity if company.is_none() => {
                        Some(GateReason::NoCompany)
                    }
                    AnalysisKind::CoverageOpportunity if resolved.coverage_column.is_none() => {
                        Some(GateReason::NoCoverageColumn)
                    }
                    AnalysisKind::PriceVolume if resolved.price_column.is_none() => {
                        Some(GateReason::NoPriceColumn)
                    }
                    AnalysisKind::PriceVolume if resolved.value_column.is_none() => {
                        Some(GateReason::NoValueColumn)
                    }
                    _ => None,
                };
                match missing {
                    Some(reason) => AnalysisDecision::ineligible(kind, target, reason),
                    None => AnalysisDecision::eligible(kind, target, resolved_reason()),
                }
            })
            .collect()
    }

    /// Chart decision from the configured mode and the planned charts.
    pub fn charts_decision(&self, mode: ChartsMode, plan: &[ChartSpec]) -> AnalysisDecision {
        let kind = AnalysisKind::Charts;
        let decision = match mode {
            ChartsMode::Off => AnalysisDecision::ineligible(kind, None, GateReason::ChartsDisabled),
            ChartsMode::On => AnalysisDecision::eligible(kind, None, GateReason::ChartsForced),
            ChartsMode::Auto if plan.is_empty() => {
                AnalysisDecision::ineligible(kind, None, GateReason::NoVisualContent)
            }
            ChartsMode::Auto => AnalysisDecision::eligible(
                kind,
                None,
                GateReason::VisualContent { charts: plan.len() },
            ),
        };
        log_decision(&decision);
        decision
    }
}

fn log_decision(decision: &AnalysisDecision) {
    debug!(
        "{} [{}]: {} ({})",
        decision.kind.display_name(),
        decision.target.as_deref().unwrap_or("-"),
        if decision.eligible { "eligible" } else { "skipped" },
        decision.reason
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CoreDimension, TimeColumn, find_decision};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn column(name: &str, inferred_type: ColumnType, unique: usize, rows: usize) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            inferred_type,
            row_count: rows,
            null_count: 0,
            null_rate: 0.0,
            unique_count: unique,
            unique_ratio: unique as f64 / rows as f64,
            memory_bytes: 0,
            sample_value: None,
        }
    }

    fn profile(columns: Vec<ColumnProfile>) -> DatasetProfile {
        DatasetProfile {
            row_count: columns.first().map(|c| c.row_count).unwrap_or(0),
            column_count: columns.len(),
            memory_bytes: 0,
            duplicate_rows: 0,
            columns,
        }
    }

    fn matrix(r: f64) -> CorrelationMatrix {
        CorrelationMatrix {
            columns: vec!["a".to_string(), "b".to_string()],
            values: vec![vec![Some(1.0), Some(r)], vec![Some(r), Some(1.0)]],
        }
    }

    #[test]
    fn test_topn_boundaries() {
        let gate = NoiseGate::default();
        assert!(!gate.topn_eligible(1, 0.01));
        assert!(gate.topn_eligible(2, 0.01));
        assert!(gate.topn_eligible(50, 0.5));
        assert!(!gate.topn_eligible(51, 0.5));
        assert!(gate.topn_eligible(10, 0.89));
        assert!(!gate.topn_eligible(10, 0.9));
    }

    #[test]
    fn test_id_category_amount_scenario() {
        let gate = NoiseGate::default();
        let profile = profile(vec![
            column("id", ColumnType::Identifier, 1000, 1000),
            column("category", ColumnType::Categorical, 5, 1000),
            column("amount", ColumnType::Numeric, 800, 1000),
        ]);
        let decisions = gate.evaluate(&profile, &ResolvedColumns::default(), None);

        let category = find_decision(&decisions, AnalysisKind::CategoricalTopN, Some("category")).unwrap();
        assert!(category.eligible);

        let id = find_decision(&decisions, AnalysisKind::CategoricalTopN, Some("id")).unwrap();
        assert!(!id.eligible);
        assert!(matches!(id.reason, GateReason::NearUniqueValues { .. }));

        let amount = find_decision(&decisions, AnalysisKind::CategoricalTopN, Some("amount")).unwrap();
        assert!(matches!(amount.reason, GateReason::NotCategorical { .. }));

        let summary = find_decision(&decisions, AnalysisKind::NumericSummary, Some("amount")).unwrap();
        assert!(summary.eligible);
    }

    #[test]
    fn test_correlation_two_phase() {
        let gate = NoiseGate::default();
        let one_numeric = profile(vec![column("amount", ColumnType::Numeric, 10, 10)]);
        let decisions = gate.evaluate(&one_numeric, &ResolvedColumns::default(), None);
        let corr = find_decision(&decisions, AnalysisKind::Correlation, None).unwrap();
        assert_eq!(corr.reason, GateReason::InsufficientNumericColumns { found: 1 });

        let weak = gate.gate_correlation(&matrix(0.15));
        assert!(!weak.eligible);
        assert!(weak.explanation().contains("below correlation threshold"));

        assert!(gate.gate_correlation(&matrix(-0.3)).eligible);
        assert_eq!(
            gate.gate_correlation(&CorrelationMatrix {
                columns: vec!["a".to_string(), "b".to_string()],
                values: vec![vec![Some(1.0), None], vec![None, None]],
            })
            .reason,
            GateReason::NoValidCorrelation
        );
    }

    #[test]
    fn test_apply_correlation_gate_replaces_first_phase() {
        let gate = NoiseGate::default();
        let two_numeric = profile(vec![
            column("a", ColumnType::Numeric, 10, 10),
            column("b", ColumnType::Numeric, 10, 10),
        ]);
        let mut decisions = gate.evaluate(&two_numeric, &ResolvedColumns::default(), None);
        assert!(find_decision(&decisions, AnalysisKind::Correlation, None).unwrap().eligible);

        gate.apply_correlation_gate(&mut decisions, Some(&matrix(0.1)), 2);
        let corr: Vec<_> = decisions
            .iter()
            .filter(|d| d.kind == AnalysisKind::Correlation)
            .collect();
        assert_eq!(corr.len(), 1);
        assert!(!corr[0].eligible);
    }

    #[test]
    fn test_correlation_without_matrix_turns_ineligible() {
        let gate = NoiseGate::default();
        let two_numeric = profile(vec![
            column("a", ColumnType::Numeric, 10, 10),
            column("b", ColumnType::Numeric, 10, 10),
        ]);
        let mut decisions = gate.evaluate(&two_numeric, &ResolvedColumns::default(), None);

        let settled = gate.apply_correlation_gate(&mut decisions, None, 1).unwrap();
        assert_eq!(settled.reason, GateReason::InsufficientNumericColumns { found: 1 });
        let corr = find_decision(&decisions, AnalysisKind::Correlation, None).unwrap();
        assert!(!corr.eligible);

        // Already ineligible decisions are left alone.
        assert!(gate.apply_correlation_gate(&mut decisions, None, 0).is_none());
        let corr = find_decision(&decisions, AnalysisKind::Correlation, None).unwrap();
        assert_eq!(corr.reason, GateReason::InsufficientNumericColumns { found: 1 });
    }

    #[test]
    fn test_trend_reasons() {
        let gate = NoiseGate::default();
        let p = profile(vec![column("amount", ColumnType::Numeric, 10, 10)]);

        let decisions = gate.evaluate(&p, &ResolvedColumns::default(), None);
        let trend = find_decision(&decisions, AnalysisKind::Trend, None).unwrap();
        assert!(!trend.eligible);
        assert_eq!(trend.explanation(), "no time column detected");

        let missing = ResolvedColumns {
            missing_time_column: Some("month".to_string()),
            ..Default::default()
        };
        let decisions = gate.evaluate(&p, &missing, None);
        let trend = find_decision(&decisions, AnalysisKind::Trend, None).unwrap();
        assert!(trend.explanation().contains("not found"));

        let supplied = ResolvedColumns {
            time_column: Some(TimeColumn {
                column: "date".to_string(),
                source: ResolutionSource::Explicit,
            }),
            ..Default::default()
        };
        let decisions = gate.evaluate(&p, &supplied, None);
        let trend = find_decision(&decisions, AnalysisKind::Trend, None).unwrap();
        assert!(trend.eligible);
        assert_eq!(
            trend.reason,
            GateReason::TimeColumnSupplied {
                column: "date".to_string()
            }
        );
    }

    #[test]
    fn test_dimension_scoped_requirements() {
        let gate = NoiseGate::default();
        let p = profile(vec![column("brand", ColumnType::Categorical, 5, 100)]);

        let decisions = gate.evaluate(&p, &ResolvedColumns::default(), Some("Acme"));
        for kind in [AnalysisKind::Concentration, AnalysisKind::Coverage, AnalysisKind::Opportunity] {
            let d = find_decision(&decisions, kind, None).unwrap();
            assert_eq!(d.reason, GateReason::NoCoreDimension);
        }

        let resolved = ResolvedColumns {
            core_dimension: Some(CoreDimension {
                column: "brand".to_string(),
                source: ResolutionSource::Inferred,
                score: Some(4.0),
            }),
            segment_column: Some("city".to_string()),
            ..Default::default()
        };
        let decisions = gate.evaluate(&p, &resolved, None);
        assert!(find_decision(&decisions, AnalysisKind::Concentration, None).unwrap().eligible);
        assert!(find_decision(&decisions, AnalysisKind::DimensionTopN, None).unwrap().eligible);
        assert_eq!(
            find_decision(&decisions, AnalysisKind::Coverage, None).unwrap().reason,
            GateReason::NoCoverageColumn
        );
        assert_eq!(
            find_decision(&decisions, AnalysisKind::CompanyPosition, None).unwrap().reason,
            GateReason::NoCompany
        );

        let decisions = gate.evaluate(&p, &resolved, Some("Acme"));
        assert!(find_decision(&decisions, AnalysisKind::Opportunity, None).unwrap().eligible);
    }

    #[test]
    fn test_leaders_coverage_priority_and_price_requirements() {
        let gate = NoiseGate::default();
        let p = profile(vec![column("brand", ColumnType::Categorical, 5, 100)]);
        let mut resolved = ResolvedColumns {
            core_dimension: Some(CoreDimension {
                column: "brand".to_string(),
                source: ResolutionSource::Explicit,
                score: None,
            }),
            coverage_column: Some("hospital".to_string()),
            price_column: Some("unit_price".to_string()),
            ..Default::default()
        };
        let reason = |decisions: &[AnalysisDecision], kind| {
            find_decision(decisions, kind, None).unwrap().reason.clone()
        };

        let decisions = gate.evaluate(&p, &resolved, None);
        assert_eq!(reason(&decisions, AnalysisKind::SegmentLeaders), GateReason::NoSegmentColumn);
        assert_eq!(reason(&decisions, AnalysisKind::CoverageOpportunity), GateReason::NoCompany);
        assert_eq!(reason(&decisions, AnalysisKind::PriceVolume), GateReason::NoValueColumn);

        resolved.segment_column = Some("city".to_string());
        resolved.value_column = Some("units".to_string());
        let decisions = gate.evaluate(&p, &resolved, Some("Acme"));
        for kind in [
            AnalysisKind::SegmentLeaders,
            AnalysisKind::CoverageOpportunity,
            AnalysisKind::PriceVolume,
        ] {
            assert!(find_decision(&decisions, kind, None).unwrap().eligible);
        }

        resolved.price_column = None;
        resolved.coverage_column = None;
        let decisions = gate.evaluate(&p, &resolved, Some("Acme"));
        assert_eq!(reason(&decisions, AnalysisKind::PriceVolume), GateReason::NoPriceColumn);
        assert_eq!(
            reason(&decisions, AnalysisKind::CoverageOpportunity),
            GateReason::NoCoverageColumn
        );
    }

    #[test]
    fn test_charts_decision() {
        let gate = NoiseGate::default();
        let off = gate.charts_decision(ChartsMode::Off, &[]);
        assert!(!off.eligible);
        assert_eq!(off.explanation(), "charts disabled");

        assert!(gate.charts_decision(ChartsMode::On, &[]).eligible);
        assert_eq!(
            gate.charts_decision(ChartsMode::Auto, &[]).reason,
            GateReason::NoVisualContent
        );
    }

    proptest! {
        #[test]
        fn prop_topn_rule_matches_definition(unique in 0usize..200, ratio in 0.0f64..1.0) {
            let gate = NoiseGate::default();
            let expected = (2..=50).contains(&unique) && ratio < 0.9;
            prop_assert_eq!(gate.topn_eligible(unique, ratio), expected);
        }

        #[test]
        fn prop_topn_decision_consistent_with_profile(unique in 1usize..120, rows in 1usize..500) {
            prop_assume!(unique <= rows);
            let gate = NoiseGate::default();
            let p = profile(vec![column("c", ColumnType::Categorical, unique, rows)]);
            let decisions = gate.evaluate(&p, &ResolvedColumns::default(), None);
            let d = find_decision(&decisions, AnalysisKind::CategoricalTopN, Some("c")).unwrap();
            let ratio = unique as f64 / rows as f64;
            prop_assert_eq!(d.eligible, (2..=50).contains(&unique) && ratio < 0.9);
        }
    }
}
