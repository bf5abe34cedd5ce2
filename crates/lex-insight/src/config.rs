//! Configuration types for the insight pipeline.
//!
//! Every default the pipeline relies on (thresholds, keyword lists, output
//! locations) lives in [`InsightConfig`] and is passed in explicitly.
//! Partial JSON documents deserialize on top of the defaults, so a config
//! file only needs the fields it changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether chart plans are produced for downstream renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChartsMode {
    /// Plan charts only when at least one chart carries visual value
    #[default]
    Auto,
    /// Always plan charts
    On,
    /// Never plan charts
    Off,
}

/// Fixed threshold table used by the noise-reduction gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateThresholds {
    /// Minimum distinct values for a categorical TopN. Default: 2
    pub topn_min_unique: usize,
    /// Maximum distinct values for a categorical TopN. Default: 50
    pub topn_max_unique: usize,
    /// TopN requires `unique_ratio` strictly below this. Default: 0.9
    pub topn_max_unique_ratio: f64,
    /// Minimum max |r| for the correlation matrix to be reported. Default: 0.3
    pub correlation_min_abs: f64,
    /// Preferred lower bound on trend bucket count. Default: 4
    pub trend_min_buckets: usize,
    /// Preferred upper bound on trend bucket count. Default: 60
    pub trend_max_buckets: usize,
    /// Minimum number of periods before year-over-year deltas are computed. Default: 12
    pub yoy_min_periods: usize,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            topn_min_unique: 2,
            topn_max_unique: 50,
            topn_max_unique_ratio: 0.9,
            correlation_min_abs: 0.3,
            trend_min_buckets: 4,
            trend_max_buckets: 60,
            yoy_min_periods: 12,
        }
    }
}

/// Thresholds for the column type decision table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceThresholds {
    /// Share of values that must parse as numbers. Default: 0.7
    pub numeric_parse_rate: f64,
    /// Same, when the column name suggests a numeric field. Default: 0.4
    pub hinted_numeric_parse_rate: f64,
    /// Share of values that must parse as dates. Default: 0.7
    pub date_parse_rate: f64,
    /// Unique ratio at which a column may be an identifier. Default: 0.9
    pub identifier_unique_ratio: f64,
    /// Share of values matching an identifier shape. Default: 0.7
    pub id_pattern_rate: f64,
    /// Number of non-null values sampled for parse rates. Default: 500
    pub sample_size: usize,
}

impl Default for InferenceThresholds {
    fn default() -> Self {
        Self {
            numeric_parse_rate: 0.7,
            hinted_numeric_parse_rate: 0.4,
            date_parse_rate: 0.7,
            identifier_unique_ratio: 0.9,
            id_pattern_rate: 0.7,
            sample_size: 500,
        }
    }
}

/// Keyword lists and scoring floor for column resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionSettings {
    /// Keywords suggesting a core business entity, in priority order.
    pub entity_keywords: Vec<String>,
    /// Keywords suggesting a coverage unit (e.g. hospitals served).
    pub coverage_keywords: Vec<String>,
    /// Keywords suggesting a geographic or market segment.
    pub segment_keywords: Vec<String>,
    /// Keywords suggesting the primary value metric, in priority order.
    pub value_keywords: Vec<String>,
    /// Keywords suggesting a unit price column, in priority order.
    pub price_keywords: Vec<String>,
    /// Candidates must score strictly above this. Default: 2.0
    pub min_score: f64,
}

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for DimensionSettings {
    fn default() -> Self {
        Self {
            entity_keywords: to_strings(&[
                "enterprise", "company", "brand", "manufacturer", "vendor", "supplier", "hospital",
                "customer", "client", "channel", "store", "category", "product", "sku", "region",
            ]),
            coverage_keywords: to_strings(&[
                "hospital", "site", "store", "outlet", "customer", "client", "account", "branch",
                "pharmacy",
            ]),
            segment_keywords: to_strings(&[
                "city", "province", "state", "region", "district", "territory", "area", "market",
            ]),
            value_keywords: to_strings(&[
                "amount", "sales", "revenue", "gmv", "value", "volume", "quantity", "qty",
                "total", "count",
            ]),
            price_keywords: to_strings(&["中选价格", "unit_price", "price", "价格", "单价"]),
            min_score: 2.0,
        }
    }
}

/// Configuration for the insight pipeline.
///
/// Use [`InsightConfig::builder()`] for a fluent setup or
/// [`InsightConfig::from_json_file`] to load a saved configuration.
///
/// # Example
///
/// ```rust,ignore
/// use lex_insight::config::{ChartsMode, InsightConfig};
///
/// let config = InsightConfig::builder()
///     .core_dimension("hospital")
///     .company("Acme Pharma")
///     .charts_mode(ChartsMode::Off)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    /// Explicit core dimension; bypasses inference and must exist.
    pub core_dimension: Option<String>,
    /// Explicit time column; overrides datetime detection.
    pub time_column: Option<String>,
    /// Explicit value column; overrides metric detection.
    pub value_column: Option<String>,
    /// Explicit coverage column for coverage analysis.
    pub coverage_column: Option<String>,
    /// Explicit segment column for opportunity scoring.
    pub segment_column: Option<String>,
    /// Explicit price column for the price-volume analysis.
    pub price_column: Option<String>,
    /// Entity highlighted in reports (a value of the core dimension).
    pub company: Option<String>,
    /// Worksheet to read from spreadsheet inputs.
    pub sheet: Option<String>,

    /// Noise-reduction thresholds.
    pub gate: GateThresholds,
    /// Type inference thresholds.
    pub inference: InferenceThresholds,
    /// Column resolution keywords.
    pub dimensions: DimensionSettings,

    /// Number of categories kept per TopN. Default: 5
    pub top_n: usize,
    /// Maximum number of opportunity rows. Default: 20
    pub opportunity_limit: usize,
    /// Maximum number of coverage-unit priority rows. Default: 30
    pub coverage_opportunity_limit: usize,
    /// Chart planning mode. Default: Auto
    pub charts_mode: ChartsMode,
    /// Request a screenshot of the rendered report from an external renderer.
    pub enable_screenshot: bool,

    /// Output root for exported artifacts. Default: "outputs"
    pub output_dir: PathBuf,
    /// Base name for exported files. Default: None ("insight")
    pub output_name: Option<String>,
    /// Whether the pipeline writes exports to disk. Default: true
    pub save_to_disk: bool,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            core_dimension: None,
            time_column: None,
            value_column: None,
            coverage_column: None,
            segment_column: None,
            price_column: None,
            company: None,
            sheet: None,
            gate: GateThresholds::default(),
            inference: InferenceThresholds::default(),
            dimensions: DimensionSettings::default(),
            top_n: 5,
            opportunity_limit: 20,
            coverage_opportunity_limit: 30,
            charts_mode: ChartsMode::default(),
            enable_screenshot: false,
            output_dir: PathBuf::from("outputs"),
            output_name: None,
            save_to_disk: true,
        }
    }
}

impl InsightConfig {
    /// Create a new configuration builder.
    pub fn builder() -> InsightConfigBuilder {
        InsightConfigBuilder::default()
    }

    /// Load a configuration from a JSON file, filling unspecified fields with defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: InsightConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| crate::error::InsightError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let ratios = [
            ("gate.topn_max_unique_ratio", self.gate.topn_max_unique_ratio),
            ("gate.correlation_min_abs", self.gate.correlation_min_abs),
            ("inference.numeric_parse_rate", self.inference.numeric_parse_rate),
            (
                "inference.hinted_numeric_parse_rate",
                self.inference.hinted_numeric_parse_rate,
            ),
            ("inference.date_parse_rate", self.inference.date_parse_rate),
            (
                "inference.identifier_unique_ratio",
                self.inference.identifier_unique_ratio,
            ),
            ("inference.id_pattern_rate", self.inference.id_pattern_rate),
        ];
        for (field, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.gate.topn_min_unique > self.gate.topn_max_unique {
            return Err(ConfigValidationError::InvalidRange {
                field: "gate.topn_min_unique..gate.topn_max_unique".to_string(),
                min: self.gate.topn_min_unique,
                max: self.gate.topn_max_unique,
            });
        }

        if self.gate.trend_min_buckets == 0 || self.gate.trend_min_buckets > self.gate.trend_max_buckets
        {
            return Err(ConfigValidationError::InvalidRange {
                field: "gate.trend_min_buckets..gate.trend_max_buckets".to_string(),
                min: self.gate.trend_min_buckets,
                max: self.gate.trend_max_buckets,
            });
        }

        if self.top_n == 0 {
            return Err(ConfigValidationError::InvalidTopN(self.top_n));
        }

        if self.inference.sample_size == 0 {
            return Err(ConfigValidationError::InvalidSampleSize(
                self.inference.sample_size,
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid range for '{field}': {min} > {max} or empty")]
    InvalidRange {
        field: String,
        min: usize,
        max: usize,
    },

    #[error("Invalid top_n: {0} (must be at least 1)")]
    InvalidTopN(usize),

    #[error("Invalid inference sample size: {0} (must be at least 1)")]
    InvalidSampleSize(usize),
}

/// Builder for [`InsightConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct InsightConfigBuilder {
    core_dimension: Option<String>,
    time_column: Option<String>,
    value_column: Option<String>,
    coverage_column: Option<String>,
    segment_column: Option<String>,
    price_column: Option<String>,
    company: Option<String>,
    sheet: Option<String>,
    gate: Option<GateThresholds>,
    inference: Option<InferenceThresholds>,
    dimensions: Option<DimensionSettings>,
    top_n: Option<usize>,
    opportunity_limit: Option<usize>,
    coverage_opportunity_limit: Option<usize>,
    charts_mode: Option<ChartsMode>,
    enable_screenshot: Option<bool>,
    output_dir: Option<PathBuf>,
    output_name: Option<String>,
    save_to_disk: Option<bool>,
}

impl InsightConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from JSON).
    pub fn from_config(config: InsightConfig) -> Self {
        Self {
            core_dimension: config.core_dimension,
            time_column: config.time_column,
            value_column: config.value_column,
            coverage_column: config.coverage_column,
            segment_column: config.segment_column,
            price_column: config.price_column,
            company: config.company,
            sheet: config.sheet,
            gate: Some(config.gate),
            inference: Some(config.inference),
            dimensions: Some(config.dimensions),
            top_n: Some(config.top_n),
            opportunity_limit: Some(config.opportunity_limit),
            coverage_opportunity_limit: Some(config.coverage_opportunity_limit),
            charts_mode: Some(config.charts_mode),
            enable_screenshot: Some(config.enable_screenshot),
            output_dir: Some(config.output_dir),
            output_name: config.output_name,
            save_to_disk: Some(config.save_to_disk),
        }
    }

    /// Set the core dimension explicitly.
    ///
    /// The column must exist among categorical or identifier columns,
    /// otherwise the run fails with an invalid-dimension error.
    pub fn core_dimension(mut self, column: impl Into<String>) -> Self {
        self.core_dimension = Some(column.into());
        self
    }

    /// Set the time column used for trend analysis.
    pub fn time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = Some(column.into());
        self
    }

    /// Set the value column used for trend, concentration and coverage.
    pub fn value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = Some(column.into());
        self
    }

    /// Set the coverage column.
    pub fn coverage_column(mut self, column: impl Into<String>) -> Self {
        self.coverage_column = Some(column.into());
        self
    }

    /// Set the segment column.
    pub fn segment_column(mut self, column: impl Into<String>) -> Self {
        self.segment_column = Some(column.into());
        self
    }

    /// Set the price column compared against the value column.
    pub fn price_column(mut self, column: impl Into<String>) -> Self {
        self.price_column = Some(column.into());
        self
    }

    /// Set the company highlighted in reports.
    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Set the worksheet to load.
    pub fn sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    /// Replace the gate threshold table.
    pub fn gate_thresholds(mut self, gate: GateThresholds) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Replace the type inference thresholds.
    pub fn inference_thresholds(mut self, inference: InferenceThresholds) -> Self {
        self.inference = Some(inference);
        self
    }

    /// Replace the dimension keyword settings.
    pub fn dimension_settings(mut self, dimensions: DimensionSettings) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Set how many categories each TopN keeps.
    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    /// Set the maximum number of opportunity rows.
    pub fn opportunity_limit(mut self, limit: usize) -> Self {
        self.opportunity_limit = Some(limit);
        self
    }

    /// Set the maximum number of coverage-unit priority rows.
    pub fn coverage_opportunity_limit(mut self, limit: usize) -> Self {
        self.coverage_opportunity_limit = Some(limit);
        self
    }

    /// Set the chart planning mode.
    pub fn charts_mode(mut self, mode: ChartsMode) -> Self {
        self.charts_mode = Some(mode);
        self
    }

    /// Enable or disable the screenshot request.
    pub fn enable_screenshot(mut self, enable: bool) -> Self {
        self.enable_screenshot = Some(enable);
        self
    }

    /// Set the output root for exports.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the base name for exported files.
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Enable or disable writing exports to disk.
    pub fn save_to_disk(mut self, save: bool) -> Self {
        self.save_to_disk = Some(save);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `InsightConfig` or an error if validation fails.
    pub fn build(self) -> Result<InsightConfig, ConfigValidationError> {
        let config = InsightConfig {
            core_dimension: self.core_dimension,
            time_column: self.time_column,
            value_column: self.value_column,
            coverage_column: self.coverage_column,
            segment_column: self.segment_column,
            price_column: self.price_column,
            company: self.company,
            sheet: self.sheet,
            gate: self.gate.unwrap_or_default(),
            inference: self.inference.unwrap_or_default(),
            dimensions: self.dimensions.unwrap_or_default(),
            top_n: self.top_n.unwrap_or(5),
            opportunity_limit: self.opportunity_limit.unwrap_or(20),
            coverage_opportunity_limit: self.coverage_opportunity_limit.unwrap_or(30),
            charts_mode: self.charts_mode.unwrap_or_default(),
            enable_screenshot: self.enable_screenshot.unwrap_or(false),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("outputs")),
            output_name: self.output_name,
            save_to_disk: self.save_to_disk.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = InsightConfig::default();
        assert_eq!(config.gate.topn_min_unique, 2);
        assert_eq!(config.gate.topn_max_unique, 50);
        assert_eq!(config.gate.topn_max_unique_ratio, 0.9);
        assert_eq!(config.gate.correlation_min_abs, 0.3);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.coverage_opportunity_limit, 30);
        assert!(config.dimensions.price_keywords.contains(&"单价".to_string()));
        assert_eq!(config.charts_mode, ChartsMode::Auto);
        assert!(config.save_to_disk);
        assert!(config.core_dimension.is_none());
    }

    #[test]
    fn test_builder_defaults_match_default() {
        let config = InsightConfig::builder().build().unwrap();
        assert_eq!(config, InsightConfig::default());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = InsightConfig::builder()
            .core_dimension("hospital")
            .time_column("order_date")
            .company("Acme")
            .charts_mode(ChartsMode::Off)
            .top_n(10)
            .save_to_disk(false)
            .build()
            .unwrap();

        assert_eq!(config.core_dimension.as_deref(), Some("hospital"));
        assert_eq!(config.time_column.as_deref(), Some("order_date"));
        assert_eq!(config.company.as_deref(), Some("Acme"));
        assert_eq!(config.charts_mode, ChartsMode::Off);
        assert_eq!(config.top_n, 10);
        assert!(!config.save_to_disk);
    }

    #[test]
    fn test_from_config_preserves_values() {
        let base = InsightConfig::builder().company("Acme").top_n(3).build().unwrap();
        let rebuilt = InsightConfigBuilder::from_config(base.clone())
            .sheet("Sheet2")
            .build()
            .unwrap();
        assert_eq!(rebuilt.company, base.company);
        assert_eq!(rebuilt.top_n, 3);
        assert_eq!(rebuilt.sheet.as_deref(), Some("Sheet2"));
    }

    #[test]
    fn test_validation_invalid_ratio() {
        let gate = GateThresholds {
            topn_max_unique_ratio: 1.5,
            ..GateThresholds::default()
        };
        let result = InsightConfig::builder().gate_thresholds(gate).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_inverted_range() {
        let gate = GateThresholds {
            trend_min_buckets: 80,
            ..GateThresholds::default()
        };
        let result = InsightConfig::builder().gate_thresholds(gate).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidRange { .. }
        ));
    }

    #[test]
    fn test_validation_zero_top_n() {
        let result = InsightConfig::builder().top_n(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidTopN(0)
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "core_dimension": "brand",
            "charts_mode": "off",
            "gate": { "correlation_min_abs": 0.5 }
        }"#;

        let config: InsightConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.core_dimension.as_deref(), Some("brand"));
        assert_eq!(config.charts_mode, ChartsMode::Off);
        assert_eq!(config.gate.correlation_min_abs, 0.5);
        assert_eq!(config.gate.topn_max_unique, 50);
        assert_eq!(config.top_n, 5);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("insight.json");
        std::fs::write(&path, r#"{"company": "Acme", "top_n": 8}"#).unwrap();

        let config = InsightConfig::from_json_file(&path).unwrap();
        assert_eq!(config.company.as_deref(), Some("Acme"));
        assert_eq!(config.top_n, 8);
    }

    #[test]
    fn test_from_json_file_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("insight.json");
        std::fs::write(&path, r#"{"top_n": 0}"#).unwrap();

        let err = InsightConfig::from_json_file(&path).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
