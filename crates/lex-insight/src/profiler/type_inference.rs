//! Column type decision table.
//!
//! Rules are evaluated top to bottom; the first match wins.
//!
//! | # | Condition                                                         | Type        |
//! |---|-------------------------------------------------------------------|-------------|
//! | 1 | no non-null values                                                | categorical |
//! | 2 | temporal storage                                                  | datetime    |
//! | 3 | text storage, date parse rate >= `date_parse_rate`                | datetime    |
//! | 4 | boolean storage                                                   | categorical |
//! | 5 | numeric storage, or text with numeric parse rate over threshold   | numeric (*) |
//! | 6 | (*) integer-like, identifier name, distinct ratio >= id ratio     | identifier  |
//! | 7 | text, distinct ratio >= id ratio, identifier name or id pattern   | identifier  |
//! | 8 | otherwise                                                         | categorical |

use super::signals::ColumnSignals;
use crate::config::InferenceThresholds;
use crate::types::ColumnType;
use crate::utils::DtypeCategory;

/// Classify a column from its signals.
pub fn classify(signals: &ColumnSignals, thresholds: &InferenceThresholds) -> ColumnType {
    if signals.non_null_count == 0 {
        return ColumnType::Categorical;
    }

    let is_text = signals.storage == DtypeCategory::Text;

    match signals.storage {
        DtypeCategory::Temporal => return ColumnType::Datetime,
        DtypeCategory::Boolean => return ColumnType::Categorical,
        _ => {}
    }

    if is_text && signals.date_parse_rate >= thresholds.date_parse_rate {
        return ColumnType::Datetime;
    }

    let numeric_threshold = if signals.numeric_name_hint {
        thresholds.hinted_numeric_parse_rate
    } else {
        thresholds.numeric_parse_rate
    };
    let looks_numeric = signals.storage == DtypeCategory::Numeric
        || (is_text && signals.numeric_parse_rate >= numeric_threshold);
    let mostly_unique = signals.distinct_ratio >= thresholds.identifier_unique_ratio;

    if looks_numeric {
        if signals.integer_like && signals.id_name_hint && mostly_unique {
            return ColumnType::Identifier;
        }
        return ColumnType::Numeric;
    }

    if is_text
        && mostly_unique
        && (signals.id_name_hint || signals.id_pattern_rate >= thresholds.id_pattern_rate)
    {
        return ColumnType::Identifier;
    }

    ColumnType::Categorical
}
