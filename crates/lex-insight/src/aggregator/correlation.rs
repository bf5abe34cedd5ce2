//! Pearson correlation over numeric columns.
//!
//! Missing values are excluded pairwise. A cell is undefined when fewer than
//! [`MIN_PAIRS`] complete pairs exist or either side has zero variance.

use serde::{Deserialize, Serialize};

/// Minimum complete pairs for a defined coefficient.
pub const MIN_PAIRS: usize = 3;

/// One off-diagonal cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub left: String,
    pub right: String,
    pub coefficient: f64,
}

/// Symmetric correlation matrix, rows and columns in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Compute every pairwise coefficient of `columns`.
    pub fn compute(columns: &[(String, Vec<Option<f64>>)]) -> Self {
        let size = columns.len();
        let mut values = vec![vec![None; size]; size];

        for i in 0..size {
            values[i][i] = has_variance(&columns[i].1).then_some(1.0);
            for j in (i + 1)..size {
                let r = pearson(&columns[i].1, &columns[j].1);
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        Self {
            columns: columns.iter().map(|(name, _)| name.clone()).collect(),
            values,
        }
    }

    pub fn get(&self, left: &str, right: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == left)?;
        let j = self.columns.iter().position(|c| c == right)?;
        self.values[i][j]
    }

    /// Defined off-diagonal cells of the upper triangle.
    pub fn pairs(&self) -> Vec<CorrelationPair> {
        let mut pairs = Vec::new();
        for i in 0..self.columns.len() {
            for j in (i + 1)..self.columns.len() {
                if let Some(coefficient) = self.values[i][j] {
                    pairs.push(CorrelationPair {
                        left: self.columns[i].clone(),
                        right: self.columns[j].clone(),
                        coefficient,
                    });
                }
            }
        }
        pairs
    }

    /// Largest |r| off the diagonal; `None` when no cell is defined.
    pub fn max_abs_off_diagonal(&self) -> Option<f64> {
        self.pairs()
            .iter()
            .map(|p| p.coefficient.abs())
            .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |m| m.max(r))))
    }

    /// Pair with the largest |r|; the first such pair on ties.
    pub fn strongest_pair(&self) -> Option<CorrelationPair> {
        let mut best: Option<CorrelationPair> = None;
        for pair in self.pairs() {
            match &best {
                Some(current) if current.coefficient.abs() >= pair.coefficient.abs() => {}
                _ => best = Some(pair),
            }
        }
        best
    }
}

/// Pearson coefficient over complete pairs, clamped to [-1, 1].
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < MIN_PAIRS {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

fn has_variance(values: &[Option<f64>]) -> bool {
    let mut present = values.iter().flatten();
    match present.next() {
        Some(first) => present.any(|v| v != first),
        None => false,
    }
}
