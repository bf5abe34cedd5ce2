//! Error types for the insight pipeline.
//!
//! Only structural problems are errors here: an unreadable or empty dataset,
//! an explicit core dimension that does not exist, a bad configuration.
//! Analyses whose preconditions fail are not errors; they are recorded as
//! [`SkippedAnalysis`](crate::types::SkippedAnalysis) values instead.
//!
//! Errors serialize as `{code, message}` so they can be embedded in JSON output.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the insight pipeline.
#[derive(Error, Debug)]
pub enum InsightError {
    /// The dataset could not be read or has no rows/columns.
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// The explicitly requested core dimension does not exist among the
    /// categorical or identifier columns.
    #[error(
        "Invalid core dimension '{column}': not a categorical or identifier column (available: {})",
        available.join(", ")
    )]
    InvalidDimension {
        column: String,
        available: Vec<String>,
    },

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Writing an export artifact failed.
    #[error("Failed to export '{target}': {reason}")]
    Export { target: String, reason: String },

    /// Internal error (e.g., export thread panicked).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<InsightError>,
    },
}

impl InsightError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        InsightError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for machine consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DataFormat(_) => "DATA_FORMAT",
            Self::InvalidDimension { .. } => "INVALID_DIMENSION",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Export { .. } => "EXPORT_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether this error aborts the run because the input itself is unusable.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::DataFormat(_) | Self::InvalidDimension { .. } | Self::ColumnNotFound(_) => true,
            Self::WithContext { source, .. } => source.is_input_error(),
            _ => false,
        }
    }
}

impl Serialize for InsightError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("InsightError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for insight operations.
pub type Result<T> = std::result::Result<T, InsightError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| InsightError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| InsightError::Io(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            InsightError::DataFormat("empty".to_string()).error_code(),
            "DATA_FORMAT"
        );
        assert_eq!(
            InsightError::ColumnNotFound("test".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
    }

    #[test]
    fn test_invalid_dimension_message_lists_available() {
        let error = InsightError::InvalidDimension {
            column: "hospital".to_string(),
            available: vec!["brand".to_string(), "city".to_string()],
        };
        let message = error.to_string();
        assert!(message.contains("hospital"));
        assert!(message.contains("brand, city"));
        assert_eq!(error.error_code(), "INVALID_DIMENSION");
    }

    #[test]
    fn test_is_input_error() {
        assert!(InsightError::DataFormat("x".to_string()).is_input_error());
        assert!(
            InsightError::DataFormat("x".to_string())
                .with_context("Loading")
                .is_input_error()
        );
        assert!(!InsightError::InvalidConfig("x".to_string()).is_input_error());
    }

    #[test]
    fn test_error_serialization() {
        let error = InsightError::ColumnNotFound("amount".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("amount"));
    }

    #[test]
    fn test_with_context() {
        let error = InsightError::ColumnNotFound("test".to_string()).with_context("During profiling");
        assert!(error.to_string().contains("During profiling"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
    }
}
