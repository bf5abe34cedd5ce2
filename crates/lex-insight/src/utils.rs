//! Shared utilities for the insight pipeline.
//!
//! Helpers for dtype classification, lenient numeric and date parsing, and
//! pulling column values out of polars series in a uniform shape.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Storage category of a polars dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    Numeric,
    Temporal,
    Boolean,
    Text,
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

/// Check if a DataType is a date or datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

/// Get the storage category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_datetime_dtype(dtype) {
        DtypeCategory::Temporal
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::Text
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 7] = [',', '$', '%', '€', '£', '¥', ' '];

/// Common error/missing value markers in data.
pub const ERROR_MARKERS: [&str; 10] = [
    "error", "unknown", "n/a", "na", "nan", "null", "missing", "none", "#n/a", "-",
];

/// Clean a string for numeric parsing by removing formatting characters.
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Check if a string is an error/missing value marker.
pub fn is_error_marker(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    ERROR_MARKERS.iter().any(|&marker| lower == marker)
}

/// Try to parse a string as a finite f64.
///
/// Handles currency symbols, percentages, and thousands separators.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%Y.%m.%d", "%Y年%m月%d日",
];

const MONTH_FORMATS: [&str; 3] = ["%Y-%m", "%Y/%m", "%Y年%m月"];

/// Parse a date or datetime string in one of the common layouts.
///
/// Bare numbers are never treated as dates.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() || s.parse::<f64>().is_ok() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    // chrono needs a day to build a date
    for fmt in MONTH_FORMATS {
        let with_day = if fmt.ends_with('月') {
            format!("{}1日", s)
        } else {
            format!("{}{}01", s, &fmt[2..3])
        };
        let day_fmt = if fmt.ends_with('月') {
            format!("{}%d日", fmt)
        } else {
            format!("{}{}%d", fmt, &fmt[2..3])
        };
        if let Ok(date) = NaiveDate::parse_from_str(&with_day, &day_fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Normalize an entity label; placeholders for missing values yield `None`.
pub fn clean_entity_name(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if matches!(lower.as_str(), "nan" | "none" | "null" | "na" | "n/a") {
        return None;
    }
    Some(trimmed.to_string())
}

// =============================================================================
// Series Extraction Utilities
// =============================================================================

/// Values of a series as optional f64, parsing text leniently.
///
/// NaN becomes `None`. Non-numeric storage yields all `None`.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    match get_dtype_category(series.dtype()) {
        DtypeCategory::Numeric => {
            let casted = series.cast(&DataType::Float64)?;
            Ok(casted
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect())
        }
        DtypeCategory::Text => {
            let casted = series.cast(&DataType::String)?;
            Ok(casted
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_numeric_string))
                .collect())
        }
        _ => Ok(vec![None; series.len()]),
    }
}

/// Values of a series rendered as trimmed text; empty strings become `None`.
pub fn text_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let casted = series.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect())
}

/// Values of a series as timestamps, parsing text when needed.
pub fn datetime_values(series: &Series) -> PolarsResult<Vec<Option<NaiveDateTime>>> {
    match get_dtype_category(series.dtype()) {
        DtypeCategory::Temporal => {
            let millis = series
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .cast(&DataType::Int64)?;
            Ok(millis
                .i64()?
                .into_iter()
                .map(|v| {
                    v.and_then(DateTime::from_timestamp_millis)
                        .map(|dt| dt.naive_utc())
                })
                .collect())
        }
        DtypeCategory::Text => {
            let casted = series.cast(&DataType::String)?;
            Ok(casted
                .str()?
                .into_iter()
                .map(|v| v.and_then(parse_datetime))
                .collect())
        }
        _ => Ok(vec![None; series.len()]),
    }
}

/// Float series with its NaN cells turned into nulls.
///
/// Returns `None` when the series is not float or holds no NaN.
pub fn nan_to_null(series: &Series) -> PolarsResult<Option<Series>> {
    if !series.dtype().is_float() {
        return Ok(None);
    }
    let casted = series.cast(&DataType::Float64)?;
    let values = casted.f64()?;
    if values.is_nan().sum().unwrap_or(0) == 0 {
        return Ok(None);
    }
    let cleaned: Float64Chunked = values
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(Some(cleaned.with_name(series.name().clone()).into_series()))
}

/// Fetch a column as a materialized series, or `None` if absent.
pub fn column_series<'a>(df: &'a DataFrame, name: &str) -> Option<&'a Series> {
    df.column(name).ok().map(|c| c.as_materialized_series())
}

// =============================================================================
// Numeric Helpers
// =============================================================================

/// Linear-interpolated quantile of already sorted values.
pub fn quantile_sorted(values: &[f64], quantile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let pos = quantile.clamp(0.0, 1.0) * (values.len() as f64 - 1.0);
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return values[lower];
    }
    let weight = pos - lower as f64;
    values[lower] + (values[upper] - values[lower]) * weight
}

/// Sample standard deviation (ddof = 1); `None` for fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    Some(variance.sqrt())
}

/// Sort a copy of `values` ascending (NaN-safe).
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("$1,234.56"), Some(1234.56));
        assert_eq!(parse_numeric_string("  42%  "), Some(42.0));
        assert_eq!(parse_numeric_string("¥ 800"), Some(800.0));
        assert_eq!(parse_numeric_string("abc"), None);
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("inf"), None);
    }

    #[test]
    fn test_is_error_marker() {
        assert!(is_error_marker("N/A"));
        assert!(is_error_marker(" #N/A "));
        assert!(is_error_marker("NaN"));
        assert!(!is_error_marker("42"));
    }

    #[test]
    fn test_parse_datetime_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("2024-03-15"), Some(expected));
        assert_eq!(parse_datetime("2024/03/15"), Some(expected));
        assert_eq!(parse_datetime("03/15/2024"), Some(expected));
        assert_eq!(parse_datetime("2024年03月15日"), Some(expected));

        let with_time = parse_datetime("2024-03-15 10:30:00").unwrap();
        assert_eq!(with_time.format("%H:%M").to_string(), "10:30");
        assert!(parse_datetime("2024-03-15T10:30:00Z").is_some());
    }

    #[test]
    fn test_parse_datetime_month_only() {
        let parsed = parse_datetime("2024-03").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-03-01");
        let parsed = parse_datetime("2024年3月").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-03-01");
    }

    #[test]
    fn test_parse_datetime_rejects_numbers_and_text() {
        assert_eq!(parse_datetime("20240315"), None);
        assert_eq!(parse_datetime("2024"), None);
        assert_eq!(parse_datetime("Beijing"), None);
        assert_eq!(parse_datetime(""), None);
    }

    #[test]
    fn test_clean_entity_name() {
        assert_eq!(clean_entity_name("  Acme "), Some("Acme".to_string()));
        assert_eq!(clean_entity_name("nan"), None);
        assert_eq!(clean_entity_name("N/A"), None);
        assert_eq!(clean_entity_name(""), None);
    }

    #[test]
    fn test_quantile_sorted_interpolates() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&values, 0.5), 2.5);
        assert_eq!(quantile_sorted(&values, 0.0), 1.0);
        assert_eq!(quantile_sorted(&values, 1.0), 4.0);
        assert_eq!(quantile_sorted(&[], 0.5), 0.0);
    }

    #[test]
    fn test_sample_std_uses_bessel_correction() {
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        // population std would be 2.0
        assert!((std - 2.138_089_935).abs() < 1e-6);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn test_numeric_values_from_text() {
        let series = Series::new("amount".into(), &["$1,000", "n/a", "250", ""]);
        let values = numeric_values(&series).unwrap();
        assert_eq!(values, vec![Some(1000.0), None, Some(250.0), None]);
    }

    #[test]
    fn test_nan_to_null() {
        let series = Series::new("b".into(), &[Some(1.0), Some(f64::NAN), None]);
        let cleaned = nan_to_null(&series).unwrap().unwrap();
        assert_eq!(cleaned.name().as_str(), "b");
        assert_eq!(cleaned.null_count(), 2);

        let clean = Series::new("c".into(), &[1.0, 2.0]);
        assert!(nan_to_null(&clean).unwrap().is_none());
        let text = Series::new("t".into(), &["NaN"]);
        assert!(nan_to_null(&text).unwrap().is_none());
    }

    #[test]
    fn test_text_values_trim_and_drop_empty() {
        let series = Series::new("city".into(), &[" Paris ", "", "Rome"]);
        let values = text_values(&series).unwrap();
        assert_eq!(
            values,
            vec![Some("Paris".to_string()), None, Some("Rome".to_string())]
        );
    }

    #[test]
    fn test_datetime_values_from_text() {
        let series = Series::new("date".into(), &["2024-01-01", "bad", "2024-02-01"]);
        let values = datetime_values(&series).unwrap();
        assert!(values[0].is_some());
        assert!(values[1].is_none());
        assert!(values[2].is_some());
    }
}
