//! Concentration of the metric across core-dimension entities.

use crate::utils::{clean_entity_name, quantile_sorted, sample_std, sorted_copy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Head list stops at this cumulative share.
const HEAD_SHARE_LIMIT: f64 = 80.0;
const HEAD_MAX: usize = 5;
const TAIL_SIZE: usize = 5;
/// Outlier band half-width in standard deviations.
const OUTLIER_STD_FACTOR: f64 = 1.5;
const SHARE_EPSILON: f64 = 1e-9;

/// One entity in the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityShare {
    pub rank: usize,
    pub entity: String,
    pub value: f64,
    /// Percent of the total.
    pub share: f64,
    pub cumulative_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationAnalysis {
    pub dimension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_column: Option<String>,
    pub entity_count: usize,
    pub total: f64,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub std: Option<f64>,
    pub max_to_median: Option<f64>,
    pub top1_share: f64,
    pub top3_share: f64,
    pub top5_share: f64,
    pub entities_for_80: usize,
    pub entities_for_90: usize,
    pub upper_outlier_threshold: Option<f64>,
    pub lower_outlier_threshold: Option<f64>,
    pub upper_outliers: Vec<String>,
    pub lower_outliers: Vec<String>,
    pub head: Vec<EntityShare>,
    /// Smallest entities, smallest first.
    pub tail: Vec<EntityShare>,
    /// Every entity, largest first.
    pub ranking: Vec<EntityShare>,
}

impl ConcentrationAnalysis {
    /// Aggregate `values` (or row counts) per entity.
    ///
    /// `None` when no entity has a positive total.
    pub fn compute(
        dimension: &str,
        value_column: Option<&str>,
        entities: &[Option<String>],
        values: Option<&[Option<f64>]>,
    ) -> Option<Self> {
        let totals = entity_totals(entities, values);
        if totals.is_empty() {
            return None;
        }

        let total: f64 = totals.iter().map(|(_, v)| v).sum();
        let mut cumulative = 0.0;
        let ranking: Vec<EntityShare> = totals
            .into_iter()
            .enumerate()
            .map(|(idx, (entity, value))| {
                let share = value / total * 100.0;
                cumulative += share;
                EntityShare {
                    rank: idx + 1,
                    entity,
                    value,
                    share,
                    cumulative_share: cumulative,
                }
            })
            .collect();

        let amounts: Vec<f64> = ranking.iter().map(|e| e.value).collect();
        let sorted = sorted_copy(&amounts);
        let entity_count = ranking.len();
        let mean = total / entity_count as f64;
        let median = quantile_sorted(&sorted, 0.5);
        let max = amounts[0];
        let std = sample_std(&amounts);

        let (upper_outlier_threshold, lower_outlier_threshold) = match std {
            Some(std) => (
                Some(mean + OUTLIER_STD_FACTOR * std),
                Some(mean - OUTLIER_STD_FACTOR * std),
            ),
            None => (None, None),
        };
        let upper_outliers = upper_outlier_threshold
            .map(|t| names_where(&ranking, |v| v > t))
            .unwrap_or_default();
        let lower_outliers = lower_outlier_threshold
            .map(|t| names_where(&ranking, |v| v < t))
            .unwrap_or_default();

        let mut head: Vec<EntityShare> = ranking
            .iter()
            .take_while(|e| e.cumulative_share <= HEAD_SHARE_LIMIT + SHARE_EPSILON)
            .take(HEAD_MAX)
            .cloned()
            .collect();
        if head.is_empty() {
            head.push(ranking[0].clone());
        }
        let tail: Vec<EntityShare> = ranking.iter().rev().take(TAIL_SIZE).cloned().collect();

        Some(Self {
            dimension: dimension.to_string(),
            value_column: value_column.map(str::to_string),
            entity_count,
            total,
            mean,
            median,
            max,
            std,
            max_to_median: (median > 0.0).then(|| max / median),
            top1_share: top_share(&ranking, 1),
            top3_share: top_share(&ranking, 3),
            top5_share: top_share(&ranking, 5),
            entities_for_80: entities_to_cover(&ranking, 80.0),
            entities_for_90: entities_to_cover(&ranking, 90.0),
            upper_outlier_threshold,
            lower_outlier_threshold,
            upper_outliers,
            lower_outliers,
            head,
            tail,
            ranking,
        })
    }

    /// The first `n` entities of the ranking.
    pub fn top(&self, n: usize) -> &[EntityShare] {
        &self.ranking[..n.min(self.ranking.len())]
    }

    /// Case-insensitive lookup by entity name.
    pub fn find(&self, entity: &str) -> Option<&EntityShare> {
        let needle = entity.trim().to_lowercase();
        self.ranking
            .iter()
            .find(|e| e.entity.to_lowercase() == needle)
    }
}

/// Where the company stands within the core dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyPosition {
    pub company: String,
    pub rank: usize,
    pub entity_count: usize,
    pub value: f64,
    pub share: f64,
    pub leader: String,
    pub leader_share: f64,
    pub gap_to_leader: f64,
    /// Percentage points behind the leader.
    pub share_gap: f64,
}

impl CompanyPosition {
    /// `None` when the company is not among the ranked entities.
    pub fn locate(concentration: &ConcentrationAnalysis, company: &str) -> Option<Self> {
        let entry = concentration.find(company)?;
        let leader = concentration.ranking.first()?;
        Some(Self {
            company: entry.entity.clone(),
            rank: entry.rank,
            entity_count: concentration.entity_count,
            value: entry.value,
            share: entry.share,
            leader: leader.entity.clone(),
            leader_share: leader.share,
            gap_to_leader: leader.value - entry.value,
            share_gap: leader.share - entry.share,
        })
    }

    pub fn is_leader(&self) -> bool {
        self.rank == 1
    }
}

/// Positive per-entity totals, largest first; ties keep first-seen order.
pub fn entity_totals(entities: &[Option<String>], values: Option<&[Option<f64>]>) -> Vec<(String, f64)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut totals: Vec<(String, f64)> = Vec::new();

    for (row, raw) in entities.iter().enumerate() {
        let Some(entity) = raw.as_deref().and_then(clean_entity_name) else {
            continue;
        };
        let amount = match values {
            Some(values) => match values.get(row).copied().flatten() {
                Some(v) => v,
                None => continue,
            },
            None => 1.0,
        };
        match index.get(&entity) {
            Some(&slot) => totals[slot].1 += amount,
            None => {
                index.insert(entity.clone(), totals.len());
                totals.push((entity, amount));
            }
        }
    }

    totals.retain(|(_, v)| *v > 0.0);
    totals.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    totals
}

fn top_share(ranking: &[EntityShare], n: usize) -> f64 {
    ranking.iter().take(n).map(|e| e.share).sum()
}

/// Smallest number of leading entities whose cumulative share reaches `pct`.
fn entities_to_cover(ranking: &[EntityShare], pct: f64) -> usize {
    ranking
        .iter()
        .position(|e| e.cumulative_share + SHARE_EPSILON >= pct)
        .map(|idx| idx + 1)
        .unwrap_or(ranking.len())
}

fn names_where(ranking: &[EntityShare], predicate: impl Fn(f64) -> bool) -> Vec<String> {
    ranking
        .iter()
        .filter(|e| predicate(e.value))
        .map(|e| e.entity.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entities(raw: &[&str]) -> Vec<Option<String>> {
        raw.iter().map(|v| Some(v.to_string())).collect()
    }

    fn sample() -> ConcentrationAnalysis {
        let names = entities(&["A", "B", "C", "A", "D", "E", "F", "nan", "G"]);
        let values = vec![
            Some(300.0),
            Some(200.0),
            Some(100.0),
            Some(200.0),
            Some(80.0),
            Some(60.0),
            Some(40.0),
            Some(999.0),
            Some(20.0),
        ];
        ConcentrationAnalysis::compute("brand", Some("sales"), &names, Some(values.as_slice())).unwrap()
    }

    #[test]
    fn test_ranking_and_shares() {
        let c = sample();
        assert_eq!(c.entity_count, 7);
        assert_eq!(c.total, 1000.0);
        assert_eq!(c.ranking[0].entity, "A");
        assert_eq!(c.ranking[0].value, 500.0);
        assert_eq!(c.top1_share, 50.0);
        assert_eq!(c.top3_share, 80.0);
        assert_eq!(c.entities_for_80, 3);
        assert_eq!(c.entities_for_90, 5);
        assert_eq!(c.median, 80.0);
        assert_eq!(c.max_to_median, Some(500.0 / 80.0));
    }

    #[test]
    fn test_head_and_tail() {
        let c = sample();
        let head: Vec<&str> = c.head.iter().map(|e| e.entity.as_str()).collect();
        assert_eq!(head, vec!["A", "B", "C"]);
        let tail: Vec<&str> = c.tail.iter().map(|e| e.entity.as_str()).collect();
        assert_eq!(tail, vec!["G", "F", "E", "D", "C"]);
    }

    #[test]
    fn test_head_keeps_dominant_leader() {
        let names = entities(&["A", "B"]);
        let values = vec![Some(95.0), Some(5.0)];
        let c = ConcentrationAnalysis::compute("x", None, &names, Some(values.as_slice())).unwrap();
        assert_eq!(c.head.len(), 1);
        assert_eq!(c.head[0].entity, "A");
    }

    #[test]
    fn test_outliers() {
        let c = sample();
        assert_eq!(c.upper_outliers, vec!["A".to_string()]);
        assert!(c.lower_outliers.is_empty());
    }

    #[test]
    fn test_row_count_metric_and_first_seen_ties() {
        let names = entities(&["x", "y", "y", "x", "z"]);
        let c = ConcentrationAnalysis::compute("x", None, &names, None).unwrap();
        let order: Vec<&str> = c.ranking.iter().map(|e| e.entity.as_str()).collect();
        assert_eq!(order, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_non_positive_totals_are_dropped() {
        let names = entities(&["a", "b"]);
        let values = vec![Some(0.0), Some(-3.0)];
        assert!(ConcentrationAnalysis::compute("x", None, &names, Some(values.as_slice())).is_none());
    }

    #[test]
    fn test_company_position() {
        let c = sample();
        let position = CompanyPosition::locate(&c, " c ").unwrap();
        assert_eq!(position.company, "C");
        assert_eq!(position.rank, 3);
        assert_eq!(position.leader, "A");
        assert_eq!(position.gap_to_leader, 400.0);
        assert_eq!(position.share_gap, 40.0);
        assert!(!position.is_leader());
        assert!(CompanyPosition::locate(&c, "Unknown").is_none());
    }
}
