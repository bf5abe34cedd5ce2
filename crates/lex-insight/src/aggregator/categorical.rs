//! Frequency tables for categorical columns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of a TopN table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub value: String,
    pub count: usize,
    /// Share of all rows (nulls included), 0..1.
    pub share: f64,
}

/// The most frequent categories of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNResult {
    pub column: String,
    pub total_rows: usize,
    pub distinct_count: usize,
    pub entries: Vec<CategoryCount>,
    /// Cumulative share of the listed entries.
    pub concentration: f64,
    /// Rows outside the listed entries, nulls included.
    pub other_count: usize,
}

impl TopNResult {
    /// Count categories of `values` and keep the `n` most frequent.
    ///
    /// `None` when the column has no non-null value.
    pub fn compute(column: &str, values: &[Option<String>], n: usize) -> Option<Self> {
        let counts = category_counts(values);
        if counts.is_empty() {
            return None;
        }

        let total_rows = values.len();
        let entries: Vec<CategoryCount> = counts
            .iter()
            .take(n)
            .map(|(value, count)| CategoryCount {
                value: value.clone(),
                count: *count,
                share: *count as f64 / total_rows as f64,
            })
            .collect();
        let listed: usize = entries.iter().map(|e| e.count).sum();

        Some(Self {
            column: column.to_string(),
            total_rows,
            distinct_count: counts.len(),
            concentration: concentration_at(&counts, total_rows, n),
            other_count: total_rows - listed,
            entries,
        })
    }

    pub fn max_count(&self) -> usize {
        self.entries.first().map(|e| e.count).unwrap_or(0)
    }

    pub fn leader(&self) -> Option<&CategoryCount> {
        self.entries.first()
    }
}

/// Category frequencies, descending; equal counts keep first-seen order.
pub fn category_counts(values: &[Option<String>]) -> Vec<(String, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for value in values.iter().flatten() {
        match index.get(value.as_str()) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                index.insert(value.as_str(), counts.len());
                counts.push((value.clone(), 1));
            }
        }
    }

    // stable sort keeps first-seen order among ties
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Cumulative share of the top `n` categories over `total_rows`.
pub fn concentration_at(counts: &[(String, usize)], total_rows: usize, n: usize) -> f64 {
    if total_rows == 0 {
        return 0.0;
    }
    let covered: usize = counts.iter().take(n).map(|(_, c)| c).sum();
    covered as f64 / total_rows as f64
}
