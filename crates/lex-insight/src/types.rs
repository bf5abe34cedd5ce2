use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Profiling
// ============================================================================

/// Classification assigned to every column by the field profiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Categorical,
    Datetime,
    Identifier,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
            Self::Identifier => "identifier",
        }
    }

    /// Whether a core dimension may be declared on this type.
    pub fn is_dimension_like(&self) -> bool {
        matches!(self, Self::Categorical | Self::Identifier)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Profile of a single column. Built once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub inferred_type: ColumnType,
    pub row_count: usize,
    pub null_count: usize,
    /// `null_count / row_count`
    pub null_rate: f64,
    /// Distinct non-null values.
    pub unique_count: usize,
    /// `unique_count / row_count`
    pub unique_ratio: f64,
    pub memory_bytes: usize,
    /// First non-null value rendered as text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_value: Option<String>,
}

impl ColumnProfile {
    pub fn non_null_count(&self) -> usize {
        self.row_count - self.null_count
    }

    pub fn memory_mb(&self) -> f64 {
        self.memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Ordered profiles for every column of one dataset snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub column_count: usize,
    pub memory_bytes: usize,
    /// Rows repeating an earlier row exactly; the first occurrence is not counted.
    #[serde(default)]
    pub duplicate_rows: usize,
    pub columns: Vec<ColumnProfile>,
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn columns_of(&self, column_type: ColumnType) -> impl Iterator<Item = &ColumnProfile> {
        self.columns
            .iter()
            .filter(move |c| c.inferred_type == column_type)
    }

    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns_of(ColumnType::Numeric)
            .map(|c| c.name.clone())
            .collect()
    }
}

// ============================================================================
// Column resolution
// ============================================================================

/// How a resolved column was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Named by the user.
    Explicit,
    /// Chosen by scoring or detection.
    Inferred,
}

/// The primary business entity column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreDimension {
    pub column: String,
    pub source: ResolutionSource,
    /// Resolver score; `None` for explicit choices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Time column chosen for trend analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeColumn {
    pub column: String,
    pub source: ResolutionSource,
}

/// All columns resolved once at pipeline start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedColumns {
    pub core_dimension: Option<CoreDimension>,
    pub value_column: Option<String>,
    /// The user-supplied time column when present, otherwise the first
    /// detected datetime column.
    pub time_column: Option<TimeColumn>,
    /// User-supplied time column that does not exist in the dataset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_time_column: Option<String>,
    pub coverage_column: Option<String>,
    pub segment_column: Option<String>,
    /// Unit price column, never the value column.
    pub price_column: Option<String>,
}

impl ResolvedColumns {
    pub fn core_dimension_name(&self) -> Option<&str> {
        self.core_dimension.as_ref().map(|d| d.column.as_str())
    }

    pub fn time_column_name(&self) -> Option<&str> {
        self.time_column.as_ref().map(|t| t.column.as_str())
    }
}

// ============================================================================
// Gate decisions
// ============================================================================

/// Every analysis the gate can allow or refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    NumericSummary,
    CategoricalTopN,
    Correlation,
    Trend,
    Concentration,
    DimensionTopN,
    Coverage,
    CompanyPosition,
    Opportunity,
    SegmentLeaders,
    CoverageOpportunity,
    PriceVolume,
    Charts,
}

impl AnalysisKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NumericSummary => "Numeric Summary",
            Self::CategoricalTopN => "Categorical TopN",
            Self::Correlation => "Correlation",
            Self::Trend => "Trend",
            Self::Concentration => "Concentration",
            Self::DimensionTopN => "Dimension TopN",
            Self::Coverage => "Coverage",
            Self::CompanyPosition => "Company Position",
            Self::Opportunity => "Opportunity Priority",
            Self::SegmentLeaders => "Segment Leaders",
            Self::CoverageOpportunity => "Coverage Priority",
            Self::PriceVolume => "Price-Volume",
            Self::Charts => "Charts",
        }
    }

    /// Analyses scoped to the core dimension.
    pub fn is_dimension_scoped(&self) -> bool {
        matches!(
            self,
            Self::Concentration
                | Self::DimensionTopN
                | Self::Coverage
                | Self::CompanyPosition
                | Self::Opportunity
                | Self::SegmentLeaders
                | Self::CoverageOpportunity
                | Self::PriceVolume
        )
    }
}

/// Typed reason attached to every gate decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum GateReason {
    Eligible,
    NotCategorical { inferred_type: ColumnType },
    TooFewCategories { unique_count: usize, min: usize },
    TooManyCategories { unique_count: usize, max: usize },
    NearUniqueValues { unique_ratio: f64, max: f64 },
    NoNonNullValues,
    InsufficientNumericColumns { found: usize },
    BelowCorrelationThreshold { max_abs: f64, threshold: f64 },
    NoValidCorrelation,
    TimeColumnDetected { column: String },
    TimeColumnSupplied { column: String },
    NoTimeColumn,
    TimeColumnNotFound { column: String },
    CoreDimensionResolved { column: String },
    NoCoreDimension,
    NoCoverageColumn,
    NoSegmentColumn,
    NoPriceColumn,
    NoValueColumn,
    NoCompany,
    ChartsDisabled,
    ChartsForced,
    NoVisualContent,
    VisualContent { charts: usize },
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eligible => write!(f, "all preconditions met"),
            Self::NotCategorical { inferred_type } => {
                write!(f, "not a categorical column ({})", inferred_type)
            }
            Self::TooFewCategories { unique_count, min } => {
                write!(f, "too few categories ({} < {})", unique_count, min)
            }
            Self::TooManyCategories { unique_count, max } => {
                write!(f, "too many categories ({} > {})", unique_count, max)
            }
            Self::NearUniqueValues { unique_ratio, max } => write!(
                f,
                "near-unique values (unique ratio {:.2} >= {:.2})",
                unique_ratio, max
            ),
            Self::NoNonNullValues => write!(f, "column has no non-null values"),
            Self::InsufficientNumericColumns { found } => {
                write!(f, "fewer than two numeric columns ({} found)", found)
            }
            Self::BelowCorrelationThreshold { max_abs, threshold } => write!(
                f,
                "below correlation threshold (max |r| {:.2} < {:.2})",
                max_abs, threshold
            ),
            Self::NoValidCorrelation => write!(f, "no column pair has a defined correlation"),
            Self::TimeColumnDetected { column } => write!(f, "time column '{}' detected", column),
            Self::TimeColumnSupplied { column } => write!(f, "time column '{}' supplied", column),
            Self::NoTimeColumn => write!(f, "no time column detected"),
            Self::TimeColumnNotFound { column } => {
                write!(f, "time column '{}' not found in dataset", column)
            }
            Self::CoreDimensionResolved { column } => {
                write!(f, "core dimension '{}' resolved", column)
            }
            Self::NoCoreDimension => write!(f, "no core dimension resolved"),
            Self::NoCoverageColumn => write!(f, "no coverage column available"),
            Self::NoSegmentColumn => write!(f, "no segment column available"),
            Self::NoPriceColumn => write!(f, "no price column available"),
            Self::NoValueColumn => write!(f, "no value column available"),
            Self::NoCompany => write!(f, "no company specified"),
            Self::ChartsDisabled => write!(f, "charts disabled"),
            Self::ChartsForced => write!(f, "charts forced on"),
            Self::NoVisualContent => write!(f, "no chart carries visual value"),
            Self::VisualContent { charts } => write!(f, "{} chart(s) carry visual value", charts),
        }
    }
}

/// Outcome of one gate rule for one analysis (and optionally one column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDecision {
    pub kind: AnalysisKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub eligible: bool,
    pub reason: GateReason,
}

impl AnalysisDecision {
    pub fn eligible(kind: AnalysisKind, target: Option<&str>, reason: GateReason) -> Self {
        Self {
            kind,
            target: target.map(str::to_string),
            eligible: true,
            reason,
        }
    }

    pub fn ineligible(kind: AnalysisKind, target: Option<&str>, reason: GateReason) -> Self {
        Self {
            kind,
            target: target.map(str::to_string),
            eligible: false,
            reason,
        }
    }

    pub fn explanation(&self) -> String {
        self.reason.to_string()
    }
}

/// Look up a decision for `kind` (and `target`, when given).
pub fn find_decision<'a>(
    decisions: &'a [AnalysisDecision],
    kind: AnalysisKind,
    target: Option<&str>,
) -> Option<&'a AnalysisDecision> {
    decisions
        .iter()
        .find(|d| d.kind == kind && (target.is_none() || d.target.as_deref() == target))
}

/// Non-fatal outcome for an analysis that could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedAnalysis {
    pub kind: AnalysisKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub reason: String,
}

impl SkippedAnalysis {
    pub fn new(kind: AnalysisKind, target: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.map(str::to_string),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Insights
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Overview,
    Numeric,
    Distribution,
    Correlation,
    Trend,
    Concentration,
    Coverage,
    Company,
    Opportunity,
    Segment,
    Price,
}

/// One structured finding handed to downstream renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub category: InsightCategory,
    pub metric_name: String,
    pub value: serde_json::Value,
    pub supporting_columns: Vec<String>,
    /// Human-readable rendering of the finding.
    pub summary: String,
}

impl InsightRecord {
    pub fn new(
        category: InsightCategory,
        metric_name: impl Into<String>,
        value: impl Into<serde_json::Value>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            category,
            metric_name: metric_name.into(),
            value: value.into(),
            supporting_columns: Vec::new(),
            summary: summary.into(),
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supporting_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_reason_messages() {
        assert_eq!(GateReason::NoTimeColumn.to_string(), "no time column detected");
        let reason = GateReason::BelowCorrelationThreshold {
            max_abs: 0.15,
            threshold: 0.3,
        };
        assert!(reason.to_string().starts_with("below correlation threshold"));
    }

    #[test]
    fn test_gate_reason_serialization_is_tagged() {
        let reason = GateReason::TooManyCategories {
            unique_count: 51,
            max: 50,
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["code"], "too_many_categories");
        assert_eq!(json["unique_count"], 51);
    }

    #[test]
    fn test_find_decision_by_target() {
        let decisions = vec![
            AnalysisDecision::eligible(
                AnalysisKind::CategoricalTopN,
                Some("category"),
                GateReason::Eligible,
            ),
            AnalysisDecision::ineligible(
                AnalysisKind::CategoricalTopN,
                Some("id"),
                GateReason::NearUniqueValues {
                    unique_ratio: 1.0,
                    max: 0.9,
                },
            ),
        ];

        let id = find_decision(&decisions, AnalysisKind::CategoricalTopN, Some("id")).unwrap();
        assert!(!id.eligible);
        assert!(find_decision(&decisions, AnalysisKind::Trend, None).is_none());
    }

    #[test]
    fn test_dimension_scoped_kinds() {
        assert!(AnalysisKind::Concentration.is_dimension_scoped());
        assert!(AnalysisKind::Coverage.is_dimension_scoped());
        assert!(AnalysisKind::PriceVolume.is_dimension_scoped());
        assert!(AnalysisKind::SegmentLeaders.is_dimension_scoped());
        assert!(!AnalysisKind::Correlation.is_dimension_scoped());
    }

    #[test]
    fn test_insight_record_builder() {
        let record = InsightRecord::new(
            InsightCategory::Numeric,
            "highest_mean",
            42.0,
            "amount has the highest mean",
        )
        .with_columns(["amount"]);
        assert_eq!(record.supporting_columns, vec!["amount".to_string()]);
        assert_eq!(record.value, serde_json::json!(42.0));
    }
}
