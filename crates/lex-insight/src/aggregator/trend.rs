//! Time-bucketed trend with period-over-period and year-over-year deltas.
//!
//! Buckets are contiguous from the first to the last observed period, empty
//! periods included with a zero metric. The granularity is chosen from the
//! data: among granularities whose bucket count lies in the configured range
//! the one with the steadiest rows-per-bucket wins.

use crate::config::GateThresholds;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Relative tolerance for a flat trend.
const FLAT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeGranularity {
    /// Finest first.
    pub const ALL: [TimeGranularity; 5] = [
        Self::Day,
        Self::Week,
        Self::Month,
        Self::Quarter,
        Self::Year,
    ];

    /// Lag used for year-over-year comparison.
    pub fn periods_per_year(&self) -> usize {
        match self {
            Self::Day => 365,
            Self::Week => 52,
            Self::Month => 12,
            Self::Quarter => 4,
            Self::Year => 1,
        }
    }

    /// First day of the period containing `date`.
    pub fn bucket_start(&self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => Some(date),
            Self::Week => {
                Some(date - Duration::days(date.weekday().num_days_from_monday() as i64))
            }
            Self::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Self::Quarter => {
                let month = (date.month() - 1) / 3 * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1)
            }
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        }
    }

    /// Start of the period following the one starting at `start`.
    pub fn next_start(&self, start: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Day => start.succ_opt(),
            Self::Week => start.checked_add_signed(Duration::days(7)),
            Self::Month => add_months(start, 1),
            Self::Quarter => add_months(start, 3),
            Self::Year => NaiveDate::from_ymd_opt(start.year() + 1, 1, 1),
        }
    }

    /// Number of contiguous periods from the one holding `first` through the
    /// one holding `last`, counted without building them.
    pub fn bucket_count(&self, first: NaiveDate, last: NaiveDate) -> usize {
        if last < first {
            return 0;
        }
        let months = |d: NaiveDate| d.year() as i64 * 12 + d.month0() as i64;
        let span = match self {
            Self::Day => (last - first).num_days(),
            Self::Week => match (self.bucket_start(first), self.bucket_start(last)) {
                (Some(a), Some(b)) => (b - a).num_days() / 7,
                _ => return 0,
            },
            Self::Month => months(last) - months(first),
            Self::Quarter => months(last).div_euclid(3) - months(first).div_euclid(3),
            Self::Year => (last.year() - first.year()) as i64,
        };
        span as usize + 1
    }

    pub fn label(&self, start: NaiveDate) -> String {
        match self {
            Self::Day => start.format("%Y-%m-%d").to_string(),
            Self::Week => {
                let week = start.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            Self::Month => start.format("%Y-%m").to_string(),
            Self::Quarter => format!("{}-Q{}", start.year(), (start.month() - 1) / 3 + 1),
            Self::Year => start.year().to_string(),
        }
    }
}

impl fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        };
        write!(f, "{}", name)
    }
}

fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let zero_based = date.month0() + months;
    let year = date.year() + (zero_based / 12) as i32;
    NaiveDate::from_ymd_opt(year, zero_based % 12 + 1, 1)
}

/// What each bucket measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    /// Sum of the value column.
    Sum,
    /// Number of rows.
    RowCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Flat => "flat",
        }
    }
}

/// One period of the trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub period: String,
    pub period_start: NaiveDate,
    pub value: f64,
    pub row_count: usize,
    pub pop_delta: Option<f64>,
    /// Percent change against the previous period; undefined after a zero.
    pub pop_pct: Option<f64>,
    pub yoy_delta: Option<f64>,
    pub yoy_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub start_value: f64,
    pub end_value: f64,
    pub direction: TrendDirection,
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub time_column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_column: Option<String>,
    pub metric: TrendMetric,
    pub granularity: TimeGranularity,
    /// Rows whose timestamp could not be read.
    pub unparsed_rows: usize,
    pub points: Vec<TrendPoint>,
    pub yoy_available: bool,
    pub summary: TrendSummary,
}

impl TrendAnalysis {
    /// Build the trend; `None` when no timestamp is usable.
    ///
    /// `values`, when given, must be row-aligned with `timestamps`.
    pub fn compute(
        time_column: &str,
        value_column: Option<&str>,
        timestamps: &[Option<NaiveDateTime>],
        values: Option<&[Option<f64>]>,
        thresholds: &GateThresholds,
    ) -> Option<Self> {
        let dates: Vec<Option<NaiveDate>> = timestamps.iter().map(|t| t.map(|t| t.date())).collect();
        let unparsed_rows = dates.iter().filter(|d| d.is_none()).count();
        let first = dates.iter().flatten().min().copied()?;
        let last = dates.iter().flatten().max().copied()?;

        let granularity = choose_granularity(
            &dates,
            first,
            last,
            thresholds.trend_min_buckets,
            thresholds.trend_max_buckets,
        );

        let metric = if values.is_some() {
            TrendMetric::Sum
        } else {
            TrendMetric::RowCount
        };

        let mut buckets: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for (row, date) in dates.iter().enumerate() {
            let Some(start) = date.and_then(|d| granularity.bucket_start(d)) else {
                continue;
            };
            let entry = buckets.entry(start).or_insert((0.0, 0));
            entry.1 += 1;
            match values {
                Some(values) => entry.0 += values.get(row).copied().flatten().unwrap_or(0.0),
                None => entry.0 += 1.0,
            }
        }

        let mut points: Vec<TrendPoint> = contiguous_starts(granularity, first, last)
            .into_iter()
            .map(|start| {
                let (value, row_count) = buckets.get(&start).copied().unwrap_or((0.0, 0));
                TrendPoint {
                    period: granularity.label(start),
                    period_start: start,
                    value,
                    row_count,
                    pop_delta: None,
                    pop_pct: None,
                    yoy_delta: None,
                    yoy_pct: None,
                }
            })
            .collect();
        if points.is_empty() {
            return None;
        }

        for i in 1..points.len() {
            let (delta, pct) = delta_between(points[i - 1].value, points[i].value);
            points[i].pop_delta = Some(delta);
            points[i].pop_pct = pct;
        }

        let lag = granularity.periods_per_year();
        let yoy_available = points.len() >= thresholds.yoy_min_periods && points.len() > lag;
        if yoy_available {
            for i in lag..points.len() {
                let (delta, pct) = delta_between(points[i - lag].value, points[i].value);
                points[i].yoy_delta = Some(delta);
                points[i].yoy_pct = pct;
            }
        }

        let summary = summarize(&points);

        Some(Self {
            time_column: time_column.to_string(),
            value_column: value_column.map(str::to_string),
            metric,
            granularity,
            unparsed_rows,
            points,
            yoy_available,
            summary,
        })
    }

    pub fn latest(&self) -> Option<&TrendPoint> {
        self.points.last()
    }
}

fn delta_between(previous: f64, current: f64) -> (f64, Option<f64>) {
    let delta = current - previous;
    let pct = (previous != 0.0).then(|| delta / previous.abs() * 100.0);
    (delta, pct)
}

fn summarize(points: &[TrendPoint]) -> TrendSummary {
    let start_value = points.first().map(|p| p.value).unwrap_or(0.0);
    let end_value = points.last().map(|p| p.value).unwrap_or(0.0);
    let tolerance = FLAT_TOLERANCE * start_value.abs().max(1.0);

    let direction = if end_value - start_value > tolerance {
        TrendDirection::Up
    } else if start_value - end_value > tolerance {
        TrendDirection::Down
    } else {
        TrendDirection::Flat
    };

    TrendSummary {
        start_value,
        end_value,
        direction,
        change_pct: delta_between(start_value, end_value).1,
    }
}

/// Every period start between the periods of `first` and `last`.
fn contiguous_starts(granularity: TimeGranularity, first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let mut starts = Vec::new();
    let (Some(mut current), Some(end)) = (granularity.bucket_start(first), granularity.bucket_start(last))
    else {
        return starts;
    };
    while current <= end {
        starts.push(current);
        match granularity.next_start(current) {
            Some(next) => current = next,
            None => break,
        }
    }
    starts
}

/// Pick the granularity for a set of dates.
///
/// In-range candidates compete on coefficient of variation of rows per
/// bucket. With no candidate in range the bucket count closest to the range
/// wins. Ties go to the finer granularity.
pub fn choose_granularity(
    dates: &[Option<NaiveDate>],
    first: NaiveDate,
    last: NaiveDate,
    min_buckets: usize,
    max_buckets: usize,
) -> TimeGranularity {
    let mut best_in_range: Option<(TimeGranularity, f64)> = None;
    let mut closest: Option<(TimeGranularity, usize)> = None;

    for granularity in TimeGranularity::ALL {
        let buckets = granularity.bucket_count(first, last);

        if (min_buckets..=max_buckets).contains(&buckets) {
            let starts = contiguous_starts(granularity, first, last);
            let cv = rows_per_bucket_cv(dates, granularity, &starts);
            match best_in_range {
                Some((_, best)) if cv >= best - 1e-12 => {}
                _ => best_in_range = Some((granularity, cv)),
            }
        } else {
            let distance = if buckets < min_buckets {
                min_buckets - buckets
            } else {
                buckets - max_buckets
            };
            match closest {
                Some((_, best)) if distance >= best => {}
                _ => closest = Some((granularity, distance)),
            }
        }
    }

    best_in_range
        .map(|(g, _)| g)
        .or(closest.map(|(g, _)| g))
        .unwrap_or(TimeGranularity::Month)
}

fn rows_per_bucket_cv(
    dates: &[Option<NaiveDate>],
    granularity: TimeGranularity,
    starts: &[NaiveDate],
) -> f64 {
    let mut counts: BTreeMap<NaiveDate, usize> = starts.iter().map(|s| (*s, 0)).collect();
    for date in dates.iter().flatten() {
        if let Some(count) = granularity
            .bucket_start(*date)
            .and_then(|start| counts.get_mut(&start))
        {
            *count += 1;
        }
    }

    let n = counts.len() as f64;
    let mean = counts.values().sum::<usize>() as f64 / n;
    if mean == 0.0 {
        return f64::INFINITY;
    }
    let variance = counts
        .values()
        .map(|c| (*c as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts(y: i32, m: u32, d: u32) -> Option<NaiveDateTime> {
        Some(date(y, m, d).and_hms_opt(0, 0, 0).unwrap())
    }

    /// One row on the 10th of each month for `months` months from January 2022.
    fn monthly(months: u32) -> Vec<Option<NaiveDateTime>> {
        (0..months)
            .map(|i| ts(2022 + (i / 12) as i32, i % 12 + 1, 10))
            .collect()
    }

    #[test]
    fn test_bucket_starts_and_labels() {
        let d = date(2024, 5, 15);
        assert_eq!(TimeGranularity::Week.bucket_start(d), Some(date(2024, 5, 13)));
        assert_eq!(TimeGranularity::Month.bucket_start(d), Some(date(2024, 5, 1)));
        assert_eq!(TimeGranularity::Quarter.bucket_start(d), Some(date(2024, 4, 1)));
        assert_eq!(TimeGranularity::Year.bucket_start(d), Some(date(2024, 1, 1)));

        assert_eq!(TimeGranularity::Month.label(date(2024, 5, 1)), "2024-05");
        assert_eq!(TimeGranularity::Quarter.label(date(2024, 4, 1)), "2024-Q2");
        assert_eq!(TimeGranularity::Week.label(date(2024, 5, 13)), "2024-W20");
    }

    #[test]
    fn test_next_start_rolls_over_year() {
        assert_eq!(
            TimeGranularity::Month.next_start(date(2023, 12, 1)),
            Some(date(2024, 1, 1))
        );
        assert_eq!(
            TimeGranularity::Quarter.next_start(date(2023, 10, 1)),
            Some(date(2024, 1, 1))
        );
    }

    #[test]
    fn test_monthly_data_picks_month() {
        let timestamps = monthly(24);
        let trend = TrendAnalysis::compute("date", None, &timestamps, None, &GateThresholds::default())
            .unwrap();
        assert_eq!(trend.granularity, TimeGranularity::Month);
        assert_eq!(trend.points.len(), 24);
        assert_eq!(trend.metric, TrendMetric::RowCount);
    }

    #[test]
    fn test_gaps_are_zero_filled() {
        let timestamps = vec![ts(2024, 1, 5), ts(2024, 2, 5), ts(2024, 5, 5), ts(2024, 6, 5)];
        let values = vec![Some(10.0), Some(20.0), Some(40.0), Some(50.0)];
        let trend = TrendAnalysis::compute(
            "date",
            Some("sales"),
            &timestamps,
            Some(values.as_slice()),
            &GateThresholds::default(),
        )
        .unwrap();

        assert_eq!(trend.granularity, TimeGranularity::Month);
        let labels: Vec<&str> = trend.points.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(labels, vec!["2024-01", "2024-02", "2024-03", "2024-04", "2024-05", "2024-06"]);
        assert_eq!(trend.points[2].value, 0.0);
        assert_eq!(trend.points[2].row_count, 0);
        // growth from zero has no percent
        assert_eq!(trend.points[4].pop_delta, Some(40.0));
        assert_eq!(trend.points[4].pop_pct, None);
        assert_eq!(trend.points[1].pop_pct, Some(100.0));
    }

    #[test]
    fn test_yoy_requires_enough_periods() {
        let short = monthly(12);
        let trend = TrendAnalysis::compute("d", None, &short, None, &GateThresholds::default()).unwrap();
        assert!(!trend.yoy_available);
        assert!(trend.points.iter().all(|p| p.yoy_delta.is_none()));

        let long = monthly(15);
        let trend = TrendAnalysis::compute("d", None, &long, None, &GateThresholds::default()).unwrap();
        assert!(trend.yoy_available);
        assert_eq!(trend.points[11].yoy_delta, None);
        assert_eq!(trend.points[12].yoy_delta, Some(0.0));
        assert_eq!(trend.points[12].yoy_pct, Some(0.0));
    }

    #[test]
    fn test_summary_direction() {
        let timestamps = vec![ts(2024, 1, 1), ts(2024, 2, 1), ts(2024, 3, 1), ts(2024, 4, 1)];
        let rising = vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let trend = TrendAnalysis::compute("d", Some("v"), &timestamps, Some(rising.as_slice()), &GateThresholds::default())
            .unwrap();
        assert_eq!(trend.summary.direction, TrendDirection::Up);
        assert_eq!(trend.summary.change_pct, Some(300.0));

        let flat = vec![Some(2.0), Some(5.0), Some(1.0), Some(2.0)];
        let trend = TrendAnalysis::compute("d", Some("v"), &timestamps, Some(flat.as_slice()), &GateThresholds::default())
            .unwrap();
        assert_eq!(trend.summary.direction, TrendDirection::Flat);
    }

    #[test]
    fn test_unparsed_rows_are_counted() {
        let timestamps = vec![ts(2024, 1, 1), None, ts(2024, 1, 3), ts(2024, 1, 4), ts(2024, 1, 5)];
        let trend = TrendAnalysis::compute("d", None, &timestamps, None, &GateThresholds::default()).unwrap();
        assert_eq!(trend.unparsed_rows, 1);
        assert_eq!(trend.granularity, TimeGranularity::Day);
        assert_eq!(trend.points.iter().map(|p| p.row_count).sum::<usize>(), 4);
    }

    #[test]
    fn test_no_timestamps_is_none() {
        assert!(TrendAnalysis::compute("d", None, &[None, None], None, &GateThresholds::default()).is_none());
    }

    #[test]
    fn test_bucket_count_matches_contiguous_starts() {
        let (first, last) = (date(2022, 11, 30), date(2024, 2, 3));
        for granularity in TimeGranularity::ALL {
            assert_eq!(
                granularity.bucket_count(first, last),
                contiguous_starts(granularity, first, last).len(),
                "{}",
                granularity
            );
        }
        assert_eq!(TimeGranularity::Month.bucket_count(last, first), 0);
        assert_eq!(TimeGranularity::Quarter.bucket_count(date(2023, 12, 31), date(2024, 1, 1)), 2);
    }

    #[test]
    fn test_outlier_date_settles_on_coarse_buckets() {
        let mut timestamps = monthly(24);
        timestamps.push(ts(1900, 1, 1));
        assert_eq!(TimeGranularity::Day.bucket_count(date(1900, 1, 1), date(2023, 12, 10)), 45_269);

        let trend = TrendAnalysis::compute("date", None, &timestamps, None, &GateThresholds::default())
            .unwrap();
        assert_eq!(trend.granularity, TimeGranularity::Year);
        assert_eq!(trend.points.len(), 124);
        assert_eq!(trend.points.iter().map(|p| p.row_count).sum::<usize>(), 25);
    }

    #[test]
    fn test_out_of_range_prefers_closest() {
        // two days: every granularity yields fewer than four buckets
        let dates = vec![Some(date(2024, 3, 4)), Some(date(2024, 3, 5))];
        let g = choose_granularity(&dates, date(2024, 3, 4), date(2024, 3, 5), 4, 60);
        assert_eq!(g, TimeGranularity::Day);
    }
}
