//! Leading core entities inside every segment (city, region).

use crate::utils::clean_entity_name;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Leaders kept per segment; CR3 sums their shares.
pub const LEADER_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentLeader {
    pub entity: String,
    pub value: f64,
    /// Percent of the segment total.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentLeaderRow {
    pub segment: String,
    pub segment_total: f64,
    /// Largest first, at most [`LEADER_COUNT`].
    pub leaders: Vec<SegmentLeader>,
    pub cr3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentLeadersAnalysis {
    pub segment_column: String,
    pub dimension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_column: Option<String>,
    /// Sorted by segment name.
    pub segments: Vec<SegmentLeaderRow>,
}

impl SegmentLeadersAnalysis {
    /// Sums `values` per segment and entity, or counts rows without values.
    ///
    /// Segments with a non-positive total are left out; `None` when none
    /// remain.
    pub fn compute(
        dimension: &str,
        segment_column: &str,
        value_column: Option<&str>,
        entities: &[Option<String>],
        segments: &[Option<String>],
        values: Option<&[Option<f64>]>,
    ) -> Option<Self> {
        let mut grouped: BTreeMap<String, HashMap<String, f64>> = BTreeMap::new();

        for (row, raw) in segments.iter().enumerate() {
            let Some(segment) = raw.as_deref().and_then(clean_entity_name) else {
                continue;
            };
            let Some(entity) = entities
                .get(row)
                .and_then(|e| e.as_deref())
                .and_then(clean_entity_name)
            else {
                continue;
            };
            let amount = match values {
                Some(values) => values.get(row).copied().flatten().unwrap_or(0.0),
                None => 1.0,
            };
            *grouped.entry(segment).or_default().entry(entity).or_insert(0.0) += amount;
        }

        let rows: Vec<SegmentLeaderRow> = grouped
            .into_iter()
            .filter_map(|(segment, totals)| {
                let segment_total: f64 = totals.values().sum();
                if segment_total <= 0.0 {
                    return None;
                }
                let mut ranked: Vec<(String, f64)> = totals.into_iter().collect();
                ranked.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.0.cmp(&b.0))
                });
                let leaders: Vec<SegmentLeader> = ranked
                    .into_iter()
                    .take(LEADER_COUNT)
                    .map(|(entity, value)| SegmentLeader {
                        entity,
                        value,
                        share: value / segment_total * 100.0,
                    })
                    .collect();
                let cr3 = leaders.iter().map(|l| l.share).sum();
                Some(SegmentLeaderRow {
                    segment,
                    segment_total,
                    leaders,
                    cr3,
                })
            })
            .collect();

        if rows.is_empty() {
            return None;
        }

        Some(Self {
            segment_column: segment_column.to_string(),
            dimension: dimension.to_string(),
            value_column: value_column.map(str::to_string),
            segments: rows,
        })
    }
}
