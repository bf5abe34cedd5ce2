//! Segment opportunity scoring for a target company.
//!
//! Each segment gets three 0..100 scores:
//! - impact: headroom, `total * (100 - company share) / 100`
//! - feasibility: existing footing, `ln(1 + company volume)`
//! - efficiency: inverse of market size, `100 - norm(ln(1 + total))`
//!
//! The composite is the cube root of their product; a zero on any axis gives
//! a zero composite.
//!
//! Coverage units (hospitals, stores) are scored the same way, with the
//! coverage column standing in for the segment column.

use crate::utils::clean_entity_name;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    High,
    MediumHigh,
    Medium,
    Watch,
}

impl PriorityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            Self::High
        } else if score >= 55.0 {
            Self::MediumHigh
        } else if score >= 40.0 {
            Self::Medium
        } else {
            Self::Watch
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::High => "high",
            Self::MediumHigh => "medium-high",
            Self::Medium => "medium",
            Self::Watch => "watch",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentOpportunity {
    pub segment: String,
    pub total: f64,
    pub company_volume: f64,
    /// Company percent of the segment total.
    pub company_share: f64,
    pub impact_score: f64,
    pub feasibility_score: f64,
    pub efficiency_score: f64,
    pub composite_score: f64,
    pub level: PriorityLevel,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityAnalysis {
    pub company: String,
    pub segment_column: String,
    pub dimension: String,
    /// Best first, at most the configured limit.
    pub segments: Vec<SegmentOpportunity>,
    /// Segments scored before the limit was applied.
    pub evaluated_segments: usize,
}

impl OpportunityAnalysis {
    /// Score every segment with a positive total.
    ///
    /// `None` when no segment qualifies.
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        company: &str,
        dimension: &str,
        segment_column: &str,
        entities: &[Option<String>],
        segments: &[Option<String>],
        values: Option<&[Option<f64>]>,
        limit: usize,
    ) -> Option<Self> {
        let target = company.trim().to_lowercase();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut totals: Vec<(String, f64, f64)> = Vec::new();

        for (row, raw) in segments.iter().enumerate() {
            let Some(segment) = raw.as_deref().and_then(clean_entity_name) else {
                continue;
            };
            let amount = match values {
                Some(values) => values.get(row).copied().flatten().unwrap_or(0.0),
                None => 1.0,
            };
            let is_company = entities
                .get(row)
                .and_then(|e| e.as_deref())
                .is_some_and(|e| e.trim().to_lowercase() == target);

            let slot = *index.entry(segment.clone()).or_insert_with(|| {
                totals.push((segment, 0.0, 0.0));
                totals.len() - 1
            });
            totals[slot].1 += amount;
            if is_company {
                totals[slot].2 += amount;
            }
        }

        totals.retain(|(_, total, _)| *total > 0.0);
        if totals.is_empty() {
            return None;
        }

        let shares: Vec<f64> = totals
            .iter()
            .map(|(_, total, volume)| (volume / total * 100.0).clamp(0.0, 100.0))
            .collect();
        let impact_raw: Vec<f64> = totals
            .iter()
            .zip(&shares)
            .map(|((_, total, _), share)| total * (100.0 - share) / 100.0)
            .collect();
        let feasibility_raw: Vec<f64> = totals
            .iter()
            .map(|(_, _, volume)| volume.max(0.0).ln_1p())
            .collect();
        let investment_raw: Vec<f64> = totals.iter().map(|(_, total, _)| total.ln_1p()).collect();

        let impact = normalize_scores(&impact_raw);
        let feasibility = normalize_scores(&feasibility_raw);
        let efficiency: Vec<f64> = normalize_scores(&investment_raw)
            .into_iter()
            .map(|s| (100.0 - s).clamp(0.0, 100.0))
            .collect();

        let mut scored: Vec<SegmentOpportunity> = totals
            .into_iter()
            .enumerate()
            .map(|(i, (segment, total, company_volume))| {
                let composite = (impact[i] * feasibility[i] * efficiency[i]).max(0.0).cbrt();
                SegmentOpportunity {
                    segment,
                    total,
                    company_volume,
                    company_share: shares[i],
                    impact_score: impact[i],
                    feasibility_score: feasibility[i],
                    efficiency_score: efficiency[i],
                    composite_score: composite,
                    level: PriorityLevel::from_score(composite),
                    reason: priority_reason(impact[i], feasibility[i], efficiency[i]),
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            desc(a.composite_score, b.composite_score)
                .then_with(|| desc(a.impact_score, b.impact_score))
                .then_with(|| desc(a.feasibility_score, b.feasibility_score))
        });
        let evaluated_segments = scored.len();
        scored.truncate(limit);

        Some(Self {
            company: company.trim().to_string(),
            segment_column: segment_column.to_string(),
            dimension: dimension.to_string(),
            segments: scored,
            evaluated_segments,
        })
    }

    pub fn top(&self) -> Option<&SegmentOpportunity> {
        self.segments.first()
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Min-max scale to 0..100; a constant input maps to 50.
pub fn normalize_scores(values: &[f64]) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);

    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f64::EPSILON {
        return vec![50.0; values.len()];
    }
    values
        .iter()
        .map(|v| {
            if v.is_finite() {
                ((v - min) / (max - min) * 100.0).clamp(0.0, 100.0)
            } else {
                0.0
            }
        })
        .collect()
}

fn priority_reason(impact: f64, feasibility: f64, efficiency: f64) -> String {
    let base = match (impact >= 70.0, feasibility >= 60.0) {
        (true, true) => "large headroom with an existing footing, push first",
        (true, false) => "large headroom but a thin footing, pilot on a small scale first",
        (false, true) => "moderate headroom that lands quickly, a steady complement",
        (false, false) => "modest headroom and feasibility, track at low cost",
    };
    if efficiency < 40.0 {
        format!("{}; expect high investment", base)
    } else if efficiency >= 70.0 {
        format!("{}; efficient use of investment", base)
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Four cities; the company row carries the company volume of each.
    fn city_rows() -> (Vec<Option<String>>, Vec<Option<String>>, Vec<Option<f64>>) {
        let cities = [
            ("A", 1_000_000.0, 50_000.0),
            ("B", 650_000.0, 117_000.0),
            ("C", 220_000.0, 4_400.0),
            ("D", 450_000.0, 157_500.0),
        ];
        let mut entities = Vec::new();
        let mut segments = Vec::new();
        let mut values = Vec::new();
        for (city, total, company) in cities {
            entities.push(Some("Acme".to_string()));
            segments.push(Some(city.to_string()));
            values.push(Some(company));
            entities.push(Some("Others".to_string()));
            segments.push(Some(city.to_string()));
            values.push(Some(total - company));
        }
        (entities, segments, values)
    }

    #[test]
    fn test_ranking_balances_all_three_axes() {
        let (entities, segments, values) = city_rows();
        let result = OpportunityAnalysis::compute(
            "acme",
            "brand",
            "city",
            &entities,
            &segments,
            Some(values.as_slice()),
            20,
        )
        .unwrap();

        assert_eq!(result.evaluated_segments, 4);
        let order: Vec<&str> = result.segments.iter().map(|s| s.segment.as_str()).collect();
        assert_eq!(order[0], "B");
        assert_ne!(order[0], "D");

        let b = &result.segments[0];
        assert!((b.company_share - 18.0).abs() < 1e-9);
        assert_eq!(b.level, PriorityLevel::Medium);

        // largest market scores zero efficiency, smallest scores zero impact
        let a = result.segments.iter().find(|s| s.segment == "A").unwrap();
        assert_eq!(a.efficiency_score, 0.0);
        assert_eq!(a.composite_score, 0.0);
        let c = result.segments.iter().find(|s| s.segment == "C").unwrap();
        assert_eq!(c.impact_score, 0.0);
    }

    #[test]
    fn test_limit_applies_after_scoring() {
        let (entities, segments, values) = city_rows();
        let result = OpportunityAnalysis::compute(
            "Acme",
            "brand",
            "city",
            &entities,
            &segments,
            Some(values.as_slice()),
            2,
        )
        .unwrap();
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.evaluated_segments, 4);
    }

    #[test]
    fn test_normalize_constant_is_fifty() {
        assert_eq!(normalize_scores(&[3.0, 3.0]), vec![50.0, 50.0]);
        assert_eq!(normalize_scores(&[1.0, 2.0, 3.0]), vec![0.0, 50.0, 100.0]);
    }

    #[test]
    fn test_priority_levels() {
        assert_eq!(PriorityLevel::from_score(70.0), PriorityLevel::High);
        assert_eq!(PriorityLevel::from_score(55.0), PriorityLevel::MediumHigh);
        assert_eq!(PriorityLevel::from_score(40.0), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::from_score(39.9), PriorityLevel::Watch);
    }

    #[test]
    fn test_reason_text() {
        assert!(priority_reason(80.0, 70.0, 75.0).starts_with("large headroom with"));
        assert!(priority_reason(10.0, 10.0, 10.0).ends_with("expect high investment"));
    }
}
