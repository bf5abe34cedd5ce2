//! Price against volume over the rows that carry an entity, a price and a
//! value.
//!
//! Rows are split at the price and value medians. Entities on rows at or
//! below the price median with a value at or above the value median are
//! "low price, high volume"; rows above the price median with a value below
//! the value median are "high price, low volume".

use super::correlation::{MIN_PAIRS, pearson};
use crate::utils::{clean_entity_name, quantile_sorted, sorted_copy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entities listed per quadrant.
pub const QUADRANT_LIMIT: usize = 5;

/// Strength band of the price-value coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceRelation {
    /// |r| < 0.2
    Weak,
    /// 0.2 <= |r| < 0.5
    Moderate,
    /// |r| >= 0.5
    Strong,
}

impl PriceRelation {
    pub fn from_coefficient(r: f64) -> Self {
        let strength = r.abs();
        if strength < 0.2 {
            Self::Weak
        } else if strength < 0.5 {
            Self::Moderate
        } else {
            Self::Strong
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
        }
    }
}

impl fmt::Display for PriceRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceVolumeAnalysis {
    pub dimension: String,
    pub price_column: String,
    pub value_column: String,
    /// Rows with an entity, a price and a value.
    pub complete_rows: usize,
    /// Pearson coefficient; `None` when either side is constant.
    pub correlation: Option<f64>,
    pub relation: Option<PriceRelation>,
    pub price_median: f64,
    pub value_median: f64,
    /// First entities in row order, at most [`QUADRANT_LIMIT`].
    pub low_price_high_volume: Vec<String>,
    pub high_price_low_volume: Vec<String>,
}

impl PriceVolumeAnalysis {
    /// `None` with fewer than three complete rows.
    ///
    /// All slices are row-aligned.
    pub fn compute(
        dimension: &str,
        price_column: &str,
        value_column: &str,
        entities: &[Option<String>],
        prices: &[Option<f64>],
        values: &[Option<f64>],
    ) -> Option<Self> {
        let rows: Vec<(String, f64, f64)> = entities
            .iter()
            .zip(prices)
            .zip(values)
            .filter_map(|((entity, price), value)| {
                let entity = entity.as_deref().and_then(clean_entity_name)?;
                Some((entity, (*price)?, (*value)?))
            })
            .collect();
        if rows.len() < MIN_PAIRS {
            return None;
        }

        let price_series: Vec<Option<f64>> = rows.iter().map(|(_, p, _)| Some(*p)).collect();
        let value_series: Vec<Option<f64>> = rows.iter().map(|(_, _, v)| Some(*v)).collect();
        let correlation = pearson(&value_series, &price_series);

        let median = |values: Vec<f64>| quantile_sorted(&sorted_copy(&values), 0.5);
        let price_median = median(rows.iter().map(|(_, p, _)| *p).collect());
        let value_median = median(rows.iter().map(|(_, _, v)| *v).collect());

        let low_price_high_volume = first_distinct(
            rows.iter()
                .filter(|(_, p, v)| *p <= price_median && *v >= value_median)
                .map(|(e, _, _)| e.as_str()),
        );
        let high_price_low_volume = first_distinct(
            rows.iter()
                .filter(|(_, p, v)| *p > price_median && *v < value_median)
                .map(|(e, _, _)| e.as_str()),
        );

        Some(Self {
            dimension: dimension.to_string(),
            price_column: price_column.to_string(),
            value_column: value_column.to_string(),
            complete_rows: rows.len(),
            correlation,
            relation: correlation.map(PriceRelation::from_coefficient),
            price_median,
            value_median,
            low_price_high_volume,
            high_price_low_volume,
        })
    }
}

fn first_distinct<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for name in names {
        if seen.len() == QUADRANT_LIMIT {
            break;
        }
        if !seen.iter().any(|s| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_quadrants_split_at_medians() {
        let entities = names(&["A", "B", "C", "D", "A", "E"]);
        let prices = vec![Some(10.0), Some(12.0), Some(30.0), Some(35.0), Some(11.0), Some(40.0)];
        let values = vec![Some(100.0), Some(90.0), Some(20.0), Some(15.0), Some(95.0), Some(10.0)];

        let analysis =
            PriceVolumeAnalysis::compute("brand", "price", "units", &entities, &prices, &values)
                .unwrap();

        assert_eq!(analysis.complete_rows, 6);
        assert_eq!(analysis.price_median, 21.0);
        assert_eq!(analysis.value_median, 55.0);
        assert_eq!(analysis.low_price_high_volume, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(
            analysis.high_price_low_volume,
            vec!["C".to_string(), "D".to_string(), "E".to_string()]
        );
        assert!(analysis.correlation.unwrap() < -0.9);
        assert_eq!(analysis.relation, Some(PriceRelation::Strong));
    }

    #[test]
    fn test_incomplete_rows_are_dropped() {
        let entities = vec![Some("A".to_string()), None, Some("B".to_string()), Some("C".to_string())];
        let prices = vec![Some(1.0), Some(2.0), None, Some(3.0)];
        let values = vec![Some(5.0), Some(6.0), Some(7.0), Some(8.0)];
        assert!(
            PriceVolumeAnalysis::compute("brand", "price", "units", &entities, &prices, &values)
                .is_none()
        );
    }

    #[test]
    fn test_constant_price_has_no_relation() {
        let entities = names(&["A", "B", "C"]);
        let prices = vec![Some(5.0); 3];
        let values = vec![Some(1.0), Some(2.0), Some(3.0)];
        let analysis =
            PriceVolumeAnalysis::compute("brand", "price", "units", &entities, &prices, &values)
                .unwrap();
        assert_eq!(analysis.correlation, None);
        assert_eq!(analysis.relation, None);
    }

    #[test]
    fn test_relation_bands() {
        assert_eq!(PriceRelation::from_coefficient(0.19), PriceRelation::Weak);
        assert_eq!(PriceRelation::from_coefficient(-0.2), PriceRelation::Moderate);
        assert_eq!(PriceRelation::from_coefficient(0.5), PriceRelation::Strong);
    }

    #[test]
    fn test_quadrant_lists_are_capped() {
        let labels: Vec<String> = (0..12).map(|i| format!("E{:02}", i)).collect();
        let entities: Vec<Option<String>> = labels.iter().cloned().map(Some).collect();
        // price rises while value falls: the first half is low price, high volume
        let prices: Vec<Option<f64>> = (0..12).map(|i| Some(i as f64)).collect();
        let values: Vec<Option<f64>> = (0..12).map(|i| Some(100.0 - i as f64)).collect();
        let analysis =
            PriceVolumeAnalysis::compute("brand", "price", "units", &entities, &prices, &values)
                .unwrap();
        assert_eq!(analysis.low_price_high_volume.len(), QUADRANT_LIMIT);
        assert_eq!(analysis.low_price_high_volume[0], "E00");
        assert_eq!(analysis.high_price_low_volume[0], "E06");
    }
}
