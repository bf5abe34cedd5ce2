//! Report generation and table export.
//!
//! [`ReportGenerator`] writes two kinds of artifacts under the output root:
//!
//! - `reports/<name>_report.json`: the full [`InsightReport`]
//! - `csv/<name>_<table>.csv`: one flat table per analysis with rows
//!
//! HTML, Word, Excel and screenshot rendering belong to external renderers;
//! the report lists them as skipped artifacts with a reason.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_insight::reporting::ReportGenerator;
//!
//! let report = ReportGenerator::build_report(Some("data/sales.csv"), &result, false);
//! println!("{}", serde_json::to_string_pretty(&report)?);
//!
//! let outcome = ReportGenerator::new("outputs", Some("sales".to_string())).export(&report)?;
//! println!("{}", outcome.report_path.display());
//! ```

mod generator;
mod tables;

pub use generator::{
    ArtifactKind, ArtifactStatus, DecisionEntry, ExportOutcome, ExportedTable, ExternalArtifact,
    InsightReport, ReportGenerator, ReportMetadata,
};
pub use tables::{ExportTable, build_tables};
