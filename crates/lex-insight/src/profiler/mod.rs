//! Field profiling for loaded datasets.
//!
//! Produces one [`ColumnProfile`] per column, in column order, with an
//! explicit [`ColumnType`](crate::types::ColumnType) from the decision table
//! in [`type_inference`].

pub mod signals;
pub mod type_inference;

use crate::config::InferenceThresholds;
use crate::error::{InsightError, Result, ResultExt};
use crate::types::{ColumnProfile, DatasetProfile};
use crate::utils::{nan_to_null, text_values};
use polars::prelude::*;
use tracing::debug;

pub use signals::{ColumnSignals, extract_signals};
pub use type_inference::classify;

/// Field profiler for analyzing dataset structure.
pub struct FieldProfiler {
    thresholds: InferenceThresholds,
}

impl Default for FieldProfiler {
    fn default() -> Self {
        Self::new(InferenceThresholds::default())
    }
}

impl FieldProfiler {
    pub fn new(thresholds: InferenceThresholds) -> Self {
        Self { thresholds }
    }

    /// Profile every column of the dataset.
    ///
    /// Fails with a data format error when the dataset has no rows or no columns.
    pub fn profile_dataset(&self, df: &DataFrame) -> Result<DatasetProfile> {
        self.profile_dataset_with(df, |_, _, _| {})
    }

    /// Like [`profile_dataset`](Self::profile_dataset), calling `on_column`
    /// with `(done, total, name)` after each column.
    pub fn profile_dataset_with<F>(&self, df: &DataFrame, mut on_column: F) -> Result<DatasetProfile>
    where
        F: FnMut(usize, usize, &str),
    {
        if df.width() == 0 {
            return Err(InsightError::DataFormat(
                "dataset has no columns".to_string(),
            ));
        }
        if df.height() == 0 {
            return Err(InsightError::DataFormat("dataset has no rows".to_string()));
        }

        let total = df.width();
        let mut columns = Vec::with_capacity(total);
        for (index, col_name) in df.get_column_names().into_iter().enumerate() {
            let profile = self
                .profile_column(df, col_name)
                .context(format!("Profiling column '{}'", col_name))?;
            columns.push(profile);
            on_column(index + 1, total, col_name.as_str());
        }

        let memory_bytes = columns.iter().map(|c| c.memory_bytes).sum();
        let duplicate_rows = df.height()
            - df.unique::<&str, &str>(None, UniqueKeepStrategy::First, None)?
                .height();
        if duplicate_rows > 0 {
            debug!("{} duplicate row(s)", duplicate_rows);
        }

        Ok(DatasetProfile {
            row_count: df.height(),
            column_count: df.width(),
            memory_bytes,
            duplicate_rows,
            columns,
        })
    }

    /// Profile a single column.
    pub fn profile_column(&self, df: &DataFrame, col_name: &str) -> Result<ColumnProfile> {
        let raw = df.column(col_name)?.as_materialized_series();
        // NaN counts as missing, the same as after coercion
        let nan_nulled = nan_to_null(raw)?;
        let series = nan_nulled.as_ref().unwrap_or(raw);
        let row_count = df.height();
        let null_count = series.null_count();
        let unique_count = series.drop_nulls().n_unique()?;

        let signals = extract_signals(series, unique_count, &self.thresholds)?;
        let inferred_type = classify(&signals, &self.thresholds);

        let sample_value = text_values(series)?.into_iter().flatten().next();

        debug!(
            "Profiled '{}': {} (nulls {}, unique {})",
            col_name, inferred_type, null_count, unique_count
        );

        Ok(ColumnProfile {
            name: col_name.to_string(),
            inferred_type,
            row_count,
            null_count,
            null_rate: null_count as f64 / row_count as f64,
            unique_count,
            unique_ratio: unique_count as f64 / row_count as f64,
            memory_bytes: series.estimated_size(),
            sample_value,
        })
    }
}
