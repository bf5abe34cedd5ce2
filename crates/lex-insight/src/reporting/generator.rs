//! Report and table export.

use crate::aggregator::AggregationOutput;
use crate::coercion::CoercionSummary;
use crate::config::InsightConfig;
use crate::error::{InsightError, Result, ResultExt};
use crate::insights::{ChartSpec, FieldOverview, MarketNarrative};
use crate::pipeline::InsightResult;
use crate::reporting::tables::{ExportTable, build_tables};
use crate::types::{
    AnalysisDecision, AnalysisKind, DatasetProfile, InsightRecord, ResolvedColumns,
    SkippedAnalysis, find_decision,
};
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{debug, info};

const DEFAULT_STEM: &str = "insight";

// ============================================================================
// Report document
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    pub rows: usize,
    pub columns: usize,
    pub duplicate_rows: usize,
    pub duration_ms: u64,
    pub tool_version: String,
}

/// A gate decision with its rendered explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEntry {
    #[serde(flatten)]
    pub decision: AnalysisDecision,
    pub explanation: String,
}

impl From<&AnalysisDecision> for DecisionEntry {
    fn from(decision: &AnalysisDecision) -> Self {
        Self {
            explanation: decision.explanation(),
            decision: decision.clone(),
        }
    }
}

/// Renderings this crate leaves to external collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    HtmlReport,
    WordReport,
    ExcelWorkbook,
    Screenshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalArtifact {
    pub kind: ArtifactKind,
    pub status: ArtifactStatus,
    pub reason: String,
}

impl ExternalArtifact {
    fn skipped(kind: ArtifactKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            status: ArtifactStatus::Skipped,
            reason: reason.into(),
        }
    }
}

/// Everything one run produced, as written to `reports/<name>_report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightReport {
    pub metadata: ReportMetadata,
    pub profile: DatasetProfile,
    pub field_overview: Vec<FieldOverview>,
    pub coercion: CoercionSummary,
    pub resolved_columns: ResolvedColumns,
    pub decisions: Vec<DecisionEntry>,
    pub skipped_analyses: Vec<SkippedAnalysis>,
    pub aggregation: AggregationOutput,
    pub insights: Vec<InsightRecord>,
    pub narrative: MarketNarrative,
    pub chart_plan: Vec<ChartSpec>,
    pub external_artifacts: Vec<ExternalArtifact>,
}

// ============================================================================
// Export outcome
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedTable {
    pub name: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Paths written by one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub output_dir: PathBuf,
    pub report_path: PathBuf,
    pub tables: Vec<ExportedTable>,
}

impl ExportOutcome {
    pub fn table(&self, name: &str) -> Option<&ExportedTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Writes the JSON report and CSV tables under one output root.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
    output_name: Option<String>,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("outputs"),
            output_name: None,
        }
    }
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>, output_name: Option<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            output_name,
        }
    }

    pub fn from_config(config: &InsightConfig) -> Self {
        Self::new(config.output_dir.clone(), config.output_name.clone())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Base name shared by every exported file.
    pub fn stem(&self) -> &str {
        self.output_name.as_deref().unwrap_or(DEFAULT_STEM)
    }

    /// Assemble the report document for a finished run.
    pub fn build_report(
        input_file: Option<&str>,
        result: &InsightResult,
        enable_screenshot: bool,
    ) -> InsightReport {
        InsightReport {
            metadata: ReportMetadata {
                generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                input_file: input_file.map(String::from),
                rows: result.profile.row_count,
                columns: result.profile.column_count,
                duplicate_rows: result.profile.duplicate_rows,
                duration_ms: result.duration_ms,
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            profile: result.profile.clone(),
            field_overview: result.field_overview.clone(),
            coercion: result.coercion.clone(),
            resolved_columns: result.resolved.clone(),
            decisions: result.decisions.iter().map(DecisionEntry::from).collect(),
            skipped_analyses: result.aggregation.skipped.clone(),
            aggregation: result.aggregation.clone(),
            insights: result.insights.clone(),
            narrative: result.narrative.clone(),
            chart_plan: result.charts.clone(),
            external_artifacts: external_artifacts(&result.decisions, enable_screenshot),
        }
    }

    /// Write the report and every non-empty table.
    ///
    /// Each target owns its path and is written on its own scoped thread.
    pub fn export(&self, report: &InsightReport) -> Result<ExportOutcome> {
        let tables = build_tables(&report.field_overview, &report.aggregation)
            .context("Building export tables")?;

        let reports_dir = self.output_dir.join("reports");
        let csv_dir = self.output_dir.join("csv");
        fs::create_dir_all(&reports_dir)
            .context(format!("Creating {}", reports_dir.display()))?;
        fs::create_dir_all(&csv_dir).context(format!("Creating {}", csv_dir.display()))?;

        let stem = self.stem();
        let report_path = reports_dir.join(format!("{}_report.json", stem));

        let (report_result, table_results) = thread::scope(|scope| {
            let report_handle = scope.spawn(|| write_report(&report_path, report));
            let table_handles: Vec<_> = tables
                .into_iter()
                .map(|table| {
                    let path = csv_dir.join(format!("{}_{}.csv", stem, table.name));
                    let name = table.name;
                    (name, scope.spawn(move || write_table(path, table)))
                })
                .collect();

            let report_result = join_export(report_handle.join(), "report");
            let table_results: Vec<Result<ExportedTable>> = table_handles
                .into_iter()
                .map(|(name, handle)| join_export(handle.join(), name))
                .collect();
            (report_result, table_results)
        });

        report_result?;
        let tables = table_results.into_iter().collect::<Result<Vec<_>>>()?;

        info!(
            "Exported report and {} table(s) to {}",
            tables.len(),
            self.output_dir.display()
        );

        Ok(ExportOutcome {
            output_dir: self.output_dir.clone(),
            report_path,
            tables,
        })
    }
}

fn join_export<T>(joined: thread::Result<Result<T>>, target: &str) -> Result<T> {
    joined.map_err(|_| InsightError::Internal(format!("export thread for '{}' panicked", target)))?
}

fn write_report(path: &Path, report: &InsightReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).map_err(|e| InsightError::Export {
        target: path.display().to_string(),
        reason: e.to_string(),
    })?;
    info!("Report saved: {}", path.display());
    Ok(())
}

fn write_table(path: PathBuf, mut table: ExportTable) -> Result<ExportedTable> {
    let export_error = |reason: String| InsightError::Export {
        target: path.display().to_string(),
        reason,
    };

    let mut file = File::create(&path).map_err(|e| export_error(e.to_string()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut table.frame)
        .map_err(|e| export_error(e.to_string()))?;

    debug!("Table '{}' saved: {}", table.name, path.display());
    Ok(ExportedTable {
        name: table.name.to_string(),
        rows: table.frame.height(),
        path,
    })
}

fn external_artifacts(decisions: &[AnalysisDecision], enable_screenshot: bool) -> Vec<ExternalArtifact> {
    let charts_eligible = find_decision(decisions, AnalysisKind::Charts, None)
        .is_some_and(|d| d.eligible);

    let html_reason = if charts_eligible {
        "HTML rendering is delegated to an external renderer; the chart plan lists what to draw"
    } else {
        "HTML rendering is delegated to an external renderer; no charts were planned"
    };
    let screenshot_reason = if enable_screenshot {
        "screenshot requested, but capture needs an external browser renderer"
    } else {
        "screenshot capture disabled"
    };

    vec![
        ExternalArtifact::skipped(ArtifactKind::HtmlReport, html_reason),
        ExternalArtifact::skipped(
            ArtifactKind::WordReport,
            "Word documents are produced by an external writer from the JSON report",
        ),
        ExternalArtifact::skipped(
            ArtifactKind::ExcelWorkbook,
            "Excel workbooks are produced by an external writer; CSV tables were exported instead",
        ),
        ExternalArtifact::skipped(ArtifactKind::Screenshot, screenshot_reason),
    ]
}
