//! Type coercion applied once after loading.
//!
//! This is the only place the dataset is mutated. Header and cell whitespace
//! is trimmed, blank cells and float NaN become null, and text columns that
//! classify as numeric are cast to `Float64`.

use crate::config::InferenceThresholds;
use crate::error::Result;
use crate::profiler::{classify, extract_signals};
use crate::types::ColumnType;
use crate::utils::{nan_to_null, numeric_values, text_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// What coercion changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoercionSummary {
    /// `(original, trimmed)` header pairs.
    pub renamed_columns: Vec<(String, String)>,
    /// Text columns whose cells were trimmed.
    pub trimmed_columns: Vec<String>,
    /// Text columns cast to Float64.
    pub numeric_columns: Vec<String>,
    /// Float columns whose NaN cells were nulled.
    #[serde(default)]
    pub nan_columns: Vec<String>,
}

impl CoercionSummary {
    pub fn is_empty(&self) -> bool {
        self.renamed_columns.is_empty()
            && self.trimmed_columns.is_empty()
            && self.numeric_columns.is_empty()
            && self.nan_columns.is_empty()
    }
}

/// Coerces a freshly loaded dataset into analyzable types.
pub struct TypeCoercer {
    thresholds: InferenceThresholds,
}

impl TypeCoercer {
    pub fn new(thresholds: InferenceThresholds) -> Self {
        Self { thresholds }
    }

    /// Apply all coercions and report what changed.
    pub fn coerce(&self, df: DataFrame) -> Result<(DataFrame, CoercionSummary)> {
        let mut df = df;
        let mut summary = CoercionSummary::default();

        Self::trim_headers(&mut df, &mut summary)?;

        let column_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        for col_name in &column_names {
            let series = df.column(col_name)?.as_materialized_series();
            if let Some(cleaned) = nan_to_null(series)? {
                debug!("Nulling NaN cells of '{}'", col_name);
                df.replace(col_name, cleaned)?;
                summary.nan_columns.push(col_name.clone());
                continue;
            }
            if series.dtype() != &DataType::String {
                continue;
            }

            let values = text_values(series)?;
            let trimmed = Series::new(col_name.as_str().into(), values);
            let changed = !trimmed.equals_missing(series);

            let unique_count = trimmed.drop_nulls().n_unique()?;
            let signals = extract_signals(&trimmed, unique_count, &self.thresholds)?;

            if classify(&signals, &self.thresholds) == ColumnType::Numeric {
                let parsed = Series::new(col_name.as_str().into(), numeric_values(&trimmed)?);
                debug!("Casting text column '{}' to Float64", col_name);
                df.replace(col_name, parsed)?;
                summary.numeric_columns.push(col_name.clone());
            } else if changed {
                df.replace(col_name, trimmed)?;
                summary.trimmed_columns.push(col_name.clone());
            }
        }

        if !summary.is_empty() {
            info!(
                "Coercion: {} header(s) trimmed, {} column(s) trimmed, {} column(s) cast to numeric, {} column(s) with NaN nulled",
                summary.renamed_columns.len(),
                summary.trimmed_columns.len(),
                summary.numeric_columns.len(),
                summary.nan_columns.len()
            );
        }

        Ok((df, summary))
    }

    fn trim_headers(df: &mut DataFrame, summary: &mut CoercionSummary) -> Result<()> {
        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let mut taken: HashSet<String> = names.iter().cloned().collect();

        for name in names {
            let trimmed = name.trim().to_string();
            if trimmed == name || trimmed.is_empty() || taken.contains(&trimmed) {
                continue;
            }
            df.rename(&name, trimmed.as_str().into())?;
            taken.remove(&name);
            taken.insert(trimmed.clone());
            summary.renamed_columns.push((name, trimmed));
        }
        Ok(())
    }
}

impl Default for TypeCoercer {
    fn default() -> Self {
        Self::new(InferenceThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_trims_headers_and_cells() {
        let df = df![
            " city " => [" Paris", "Rome ", "  "],
            "amount" => [1.0, 2.0, 3.0],
        ]
        .unwrap();

        let (df, summary) = TypeCoercer::default().coerce(df).unwrap();
        assert_eq!(
            summary.renamed_columns,
            vec![(" city ".to_string(), "city".to_string())]
        );
        assert_eq!(summary.trimmed_columns, vec!["city".to_string()]);

        let city = df.column("city").unwrap().as_materialized_series();
        assert_eq!(city.null_count(), 1);
        assert_eq!(city.str().unwrap().get(0), Some("Paris"));
    }

    #[test]
    fn test_casts_numeric_text() {
        let df = df![
            "revenue" => ["$1,000", "250", "N/A", "75.5"],
            "brand" => ["A", "B", "A", "C"],
        ]
        .unwrap();

        let (df, summary) = TypeCoercer::default().coerce(df).unwrap();
        assert_eq!(summary.numeric_columns, vec!["revenue".to_string()]);

        let revenue = df.column("revenue").unwrap().as_materialized_series();
        assert_eq!(revenue.dtype(), &DataType::Float64);
        let values: Vec<Option<f64>> = revenue.f64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(1000.0), Some(250.0), None, Some(75.5)]);
        assert_eq!(
            df.column("brand").unwrap().dtype(),
            &DataType::String
        );
    }

    #[test]
    fn test_keeps_numeric_identifiers_as_text() {
        let df = df!["order_id" => ["00101", "00102", "00103", "00104"]].unwrap();
        let (df, summary) = TypeCoercer::default().coerce(df).unwrap();
        assert!(summary.numeric_columns.is_empty());
        assert_eq!(df.column("order_id").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_float_nan_becomes_null() {
        let df = df![
            "a" => [1.0, 2.0, 3.0],
            "b" => [f64::NAN, f64::NAN, f64::NAN],
        ]
        .unwrap();
        let (df, summary) = TypeCoercer::default().coerce(df).unwrap();
        assert_eq!(summary.nan_columns, vec!["b".to_string()]);
        assert_eq!(df.column("b").unwrap().null_count(), 3);
        assert_eq!(df.column("a").unwrap().null_count(), 0);
    }

    #[test]
    fn test_clean_input_is_untouched() {
        let df = df!["a" => ["x", "y"], "b" => [1i64, 2]].unwrap();
        let (_, summary) = TypeCoercer::default().coerce(df).unwrap();
        assert!(summary.is_empty());
    }
}
