//! Descriptive statistics for numeric columns.

use crate::utils::{quantile_sorted, sample_std, sorted_copy};
use serde::{Deserialize, Serialize};

/// Skew tolerance as a fraction of the standard deviation.
const SKEW_TOLERANCE: f64 = 0.1;

/// Direction of the mean/median gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkewIndicator {
    RightSkewed,
    LeftSkewed,
    Symmetric,
}

impl SkewIndicator {
    /// Compare mean against median relative to `std`.
    ///
    /// Undefined or zero spread is treated as symmetric.
    pub fn from_moments(mean: f64, median: f64, std: Option<f64>) -> Self {
        match std {
            Some(std) if std > 0.0 => {
                let gap = (mean - median) / std;
                if gap > SKEW_TOLERANCE {
                    Self::RightSkewed
                } else if gap < -SKEW_TOLERANCE {
                    Self::LeftSkewed
                } else {
                    Self::Symmetric
                }
            }
            _ => Self::Symmetric,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RightSkewed => "right_skewed",
            Self::LeftSkewed => "left_skewed",
            Self::Symmetric => "symmetric",
        }
    }
}

/// Summary of one numeric column over its non-null values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` below two values.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub q3: f64,
    pub skew: SkewIndicator,
}

impl NumericSummary {
    /// Summarize `values`; `None` if the column has no non-null value.
    pub fn compute(column: &str, values: &[Option<f64>]) -> Option<Self> {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.is_empty() {
            return None;
        }

        let sorted = sorted_copy(&present);
        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let median = quantile_sorted(&sorted, 0.5);
        let std = sample_std(&sorted);

        Some(Self {
            column: column.to_string(),
            count,
            mean,
            median,
            std,
            min: sorted[0],
            max: sorted[count - 1],
            q1: quantile_sorted(&sorted, 0.25),
            q3: quantile_sorted(&sorted, 0.75),
            skew: SkewIndicator::from_moments(mean, median, std),
        })
    }

    /// Coefficient of variation, when mean and std are usable.
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        let std = self.std?;
        if self.mean.abs() < f64::EPSILON {
            return None;
        }
        Some(std / self.mean.abs())
    }

    pub fn iqr(&self) -> f64 {
        self.q3 - self.q1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_basic_summary() {
        let values = vec![Some(1.0), Some(2.0), None, Some(3.0), Some(4.0), Some(5.0)];
        let summary = NumericSummary::compute("amount", &values).unwrap();

        assert_eq!(summary.count, 5);
        assert_eq!(summary.mean, 3.0);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 5.0);
        assert_eq!(summary.q1, 2.0);
        assert_eq!(summary.q3, 4.0);
        assert!((summary.std.unwrap() - 2.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(summary.skew, SkewIndicator::Symmetric);
    }

    #[test]
    fn test_quartiles_interpolate() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0].iter().map(|v| Some(*v)).collect();
        let summary = NumericSummary::compute("x", &values).unwrap();
        assert_eq!(summary.median, 2.5);
        assert_eq!(summary.q1, 1.75);
        assert_eq!(summary.q3, 3.25);
    }

    #[test]
    fn test_single_value_has_no_std() {
        let summary = NumericSummary::compute("x", &[Some(7.0)]).unwrap();
        assert_eq!(summary.std, None);
        assert_eq!(summary.skew, SkewIndicator::Symmetric);
        assert_eq!(summary.coefficient_of_variation(), None);
    }

    #[test]
    fn test_all_null_is_none() {
        assert!(NumericSummary::compute("x", &[None, None]).is_none());
        assert!(NumericSummary::compute("x", &[]).is_none());
    }

    #[test]
    fn test_skew_direction() {
        let right: Vec<Option<f64>> = [1.0, 1.0, 1.0, 2.0, 50.0].iter().map(|v| Some(*v)).collect();
        assert_eq!(
            NumericSummary::compute("x", &right).unwrap().skew,
            SkewIndicator::RightSkewed
        );

        let left: Vec<Option<f64>> = [-50.0, 1.0, 2.0, 2.0, 2.0].iter().map(|v| Some(*v)).collect();
        assert_eq!(
            NumericSummary::compute("x", &left).unwrap().skew,
            SkewIndicator::LeftSkewed
        );
    }

    #[test]
    fn test_skew_tolerance_boundary() {
        assert_eq!(
            SkewIndicator::from_moments(10.05, 10.0, Some(1.0)),
            SkewIndicator::Symmetric
        );
        assert_eq!(
            SkewIndicator::from_moments(10.2, 10.0, Some(1.0)),
            SkewIndicator::RightSkewed
        );
        assert_eq!(
            SkewIndicator::from_moments(10.0, 10.0, Some(0.0)),
            SkewIndicator::Symmetric
        );
    }
}
