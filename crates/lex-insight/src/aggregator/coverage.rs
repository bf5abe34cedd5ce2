//! Coverage of a secondary unit (hospitals, stores) per core entity.

use crate::utils::clean_entity_name;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRow {
    pub entity: String,
    pub total_value: f64,
    /// Distinct coverage units the entity appears with.
    pub covered_units: usize,
    pub value_per_unit: f64,
    /// Percent of the overall total.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageAnalysis {
    pub dimension: String,
    pub coverage_column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_column: Option<String>,
    /// Distinct coverage units across the whole dataset.
    pub total_units: usize,
    /// Largest total first; ties keep first-seen order.
    pub rows: Vec<CoverageRow>,
}

impl CoverageAnalysis {
    /// `None` when no row has both an entity and a coverage unit.
    pub fn compute(
        dimension: &str,
        coverage_column: &str,
        value_column: Option<&str>,
        entities: &[Option<String>],
        units: &[Option<String>],
        values: Option<&[Option<f64>]>,
    ) -> Option<Self> {
        struct Accumulator {
            total: f64,
            units: HashSet<String>,
        }

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut accumulators: Vec<(String, Accumulator)> = Vec::new();
        let mut all_units: HashSet<String> = HashSet::new();

        for (row, raw) in entities.iter().enumerate() {
            let Some(entity) = raw.as_deref().and_then(clean_entity_name) else {
                continue;
            };
            let Some(unit) = units.get(row).and_then(|u| u.as_deref()).and_then(clean_entity_name)
            else {
                continue;
            };
            let amount = match values {
                Some(values) => values.get(row).copied().flatten().unwrap_or(0.0),
                None => 1.0,
            };

            let slot = *index.entry(entity.clone()).or_insert_with(|| {
                accumulators.push((
                    entity,
                    Accumulator {
                        total: 0.0,
                        units: HashSet::new(),
                    },
                ));
                accumulators.len() - 1
            });
            let acc = &mut accumulators[slot].1;
            acc.total += amount;
            acc.units.insert(unit.clone());
            all_units.insert(unit);
        }

        if accumulators.is_empty() {
            return None;
        }

        let grand_total: f64 = accumulators.iter().map(|(_, a)| a.total).sum();
        let mut rows: Vec<CoverageRow> = accumulators
            .into_iter()
            .map(|(entity, acc)| {
                let covered_units = acc.units.len();
                CoverageRow {
                    entity,
                    total_value: acc.total,
                    covered_units,
                    value_per_unit: acc.total / covered_units as f64,
                    share: if grand_total > 0.0 {
                        acc.total / grand_total * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total_value
                .partial_cmp(&a.total_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Some(Self {
            dimension: dimension.to_string(),
            coverage_column: coverage_column.to_string(),
            value_column: value_column.map(str::to_string),
            total_units: all_units.len(),
            rows,
        })
    }

    /// Entity reaching the most units; the larger total wins ties.
    pub fn widest(&self) -> Option<&CoverageRow> {
        self.rows
            .iter()
            .reduce(|best, row| if row.covered_units > best.covered_units { row } else { best })
    }
}
