//! Signal extraction for column classification.
//!
//! Everything the decision table needs is measured here, once, from a
//! deterministic sample of the column's values.

use crate::config::InferenceThresholds;
use crate::utils::{
    DtypeCategory, get_dtype_category, is_error_marker, is_integer_dtype, numeric_values,
    parse_datetime, parse_numeric_string, text_values,
};
use once_cell::sync::Lazy;
use polars::prelude::*;
use rand::prelude::*;
use regex::Regex;

// ID pattern regexes - compiled once at startup
static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^[A-Za-z]{1,6}[-_]?\d{3,}$").expect("Invalid regex: prefixed code"),
        Regex::new(r"^\d{5,}$").expect("Invalid regex: numeric ID"),
        Regex::new(r"^[a-fA-F0-9]{8}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{4}-[a-fA-F0-9]{12}$")
            .expect("Invalid regex: UUID"),
        Regex::new(r"^[\w\.-]+@[\w\.-]+\.\w+$").expect("Invalid regex: email"),
    ]
});

const ID_NAME_TOKENS: [&str; 9] = [
    "id", "uuid", "guid", "key", "code", "no", "serial", "identifier", "编号",
];

const NUMERIC_NAME_HINTS: [&str; 16] = [
    "amount", "price", "cost", "revenue", "sales", "qty", "quantity", "volume", "value",
    "total", "count", "score", "rate", "percent", "金额", "数量",
];

/// Measurements feeding the type decision table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSignals {
    pub storage: DtypeCategory,
    pub non_null_count: usize,
    /// Distinct values over non-null values (not over rows).
    pub distinct_ratio: f64,
    /// All observed numbers are whole.
    pub integer_like: bool,
    pub numeric_parse_rate: f64,
    pub date_parse_rate: f64,
    pub id_pattern_rate: f64,
    pub id_name_hint: bool,
    pub numeric_name_hint: bool,
}

impl ColumnSignals {
    /// Signals for a column with no non-null values.
    pub fn empty(storage: DtypeCategory, name: &str) -> Self {
        Self {
            storage,
            non_null_count: 0,
            distinct_ratio: 0.0,
            integer_like: false,
            numeric_parse_rate: 0.0,
            date_parse_rate: 0.0,
            id_pattern_rate: 0.0,
            id_name_hint: has_id_name_hint(name),
            numeric_name_hint: has_numeric_name_hint(name),
        }
    }
}

/// Column name reads like an identifier (`id`, `customer_id`, `order no`).
pub fn has_id_name_hint(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| ID_NAME_TOKENS.contains(&token))
        || (lower.ends_with("id") && name.chars().rev().nth(1).is_some_and(char::is_uppercase))
}

/// Column name suggests a numeric measure.
pub fn has_numeric_name_hint(name: &str) -> bool {
    let lower = name.to_lowercase();
    NUMERIC_NAME_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Measure the signals of one column.
pub fn extract_signals(
    series: &Series,
    unique_count: usize,
    thresholds: &InferenceThresholds,
) -> PolarsResult<ColumnSignals> {
    let name = series.name().as_str();
    let storage = get_dtype_category(series.dtype());
    let non_null_count = series.len() - series.null_count();
    if non_null_count == 0 {
        return Ok(ColumnSignals::empty(storage, name));
    }

    let mut signals = ColumnSignals {
        distinct_ratio: unique_count as f64 / non_null_count as f64,
        non_null_count,
        ..ColumnSignals::empty(storage, name)
    };

    match storage {
        DtypeCategory::Numeric => {
            signals.numeric_parse_rate = 1.0;
            signals.integer_like = is_integer_dtype(series.dtype())
                || numeric_values(series)?
                    .into_iter()
                    .flatten()
                    .all(|v| v.fract() == 0.0);
        }
        DtypeCategory::Text => {
            let values: Vec<String> = text_values(series)?.into_iter().flatten().collect();
            let sample = sample_values(&values, thresholds.sample_size);
            let (numeric, dates, ids, integers, checked) = sample.iter().fold(
                (0usize, 0usize, 0usize, 0usize, 0usize),
                |(numeric, dates, ids, integers, checked), value| {
                    if is_error_marker(value) {
                        return (numeric, dates, ids, integers, checked);
                    }
                    let parsed = parse_numeric_string(value);
                    (
                        numeric + usize::from(parsed.is_some()),
                        dates + usize::from(parse_datetime(value).is_some()),
                        ids + usize::from(ID_PATTERNS.iter().any(|p| p.is_match(value))),
                        integers + usize::from(parsed.is_some_and(|v| v.fract() == 0.0)),
                        checked + 1,
                    )
                },
            );
            if checked > 0 {
                signals.numeric_parse_rate = numeric as f64 / checked as f64;
                signals.date_parse_rate = dates as f64 / checked as f64;
                signals.id_pattern_rate = ids as f64 / checked as f64;
                signals.integer_like = numeric > 0 && integers == numeric;
            }
        }
        _ => {}
    }

    Ok(signals)
}

/// Deterministic sample of at most `size` values.
fn sample_values(values: &[String], size: usize) -> Vec<&str> {
    if values.len() <= size {
        return values.iter().map(String::as_str).collect();
    }
    let mut rng = StdRng::seed_from_u64(42);
    let all_indices: Vec<usize> = (0..values.len()).collect();
    let mut indices: Vec<usize> = all_indices
        .choose_multiple(&mut rng, size)
        .copied()
        .collect();
    indices.sort_unstable();
    indices.into_iter().map(|i| values[i].as_str()).collect()
}
