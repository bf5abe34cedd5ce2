//! Dataset loading from CSV and spreadsheet files.
//!
//! CSV goes through polars with a few fallback strategies for messy quoting.
//! Spreadsheets go through calamine; every cell is read as text and left to
//! [`TypeCoercer`](crate::coercion::TypeCoercer) for typing.

use crate::error::{InsightError, Result};
use calamine::{Data, DataType, Reader, open_workbook_auto};
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Input formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
    Spreadsheet,
}

impl InputFormat {
    /// Detect the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

/// Loads a dataset snapshot from disk.
pub struct DatasetLoader;

impl DatasetLoader {
    /// Load `path`, selecting `sheet` for spreadsheet inputs.
    pub fn load(path: impl AsRef<Path>, sheet: Option<&str>) -> Result<DataFrame> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(InsightError::DataFormat(format!(
                "input file not found: {}",
                path.display()
            )));
        }

        let format = InputFormat::from_path(path).ok_or_else(|| {
            InsightError::DataFormat(format!(
                "unsupported file type: {} (expected csv, tsv, xlsx, xls or ods)",
                path.display()
            ))
        })?;

        let df = match format {
            InputFormat::Csv | InputFormat::Tsv => {
                if let Some(sheet) = sheet {
                    warn!("Ignoring sheet '{}' for delimited input", sheet);
                }
                let separator = if format == InputFormat::Tsv { b'\t' } else { b',' };
                Self::load_csv_with_fallbacks(path, separator)?
            }
            InputFormat::Spreadsheet => Self::load_spreadsheet(path, sheet)?,
        };

        info!(
            "Loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            path.display()
        );
        Ok(df)
    }

    fn load_csv_with_fallbacks(path: &Path, separator: u8) -> Result<DataFrame> {
        // Strategy 1: Standard loading with quote handling
        match CsvReadOptions::default()
            .with_infer_schema_length(Some(100))
            .with_has_header(true)
            .with_parse_options(
                CsvParseOptions::default()
                    .with_separator(separator)
                    .with_quote_char(Some(b'"')),
            )
            .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
            .finish()
        {
            Ok(df) => return Ok(df),
            Err(e) => debug!("Standard loading failed: {}", e),
        }

        // Strategy 2: Without quote handling
        match CsvReadOptions::default()
            .with_infer_schema_length(Some(100))
            .with_has_header(true)
            .with_parse_options(
                CsvParseOptions::default()
                    .with_separator(separator)
                    .with_quote_char(None),
            )
            .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
            .finish()
        {
            Ok(df) => return Ok(df),
            Err(e) => debug!("Loading without quotes failed: {}", e),
        }

        // Strategy 3: Pre-clean content, every column read as text
        let content = std::fs::read_to_string(path)?;
        let cleaned = clean_csv_content(&content);
        CsvReadOptions::default()
            .with_infer_schema_length(Some(0))
            .with_has_header(true)
            .with_parse_options(CsvParseOptions::default().with_separator(separator))
            .into_reader_with_file_handle(Cursor::new(cleaned))
            .finish()
            .map_err(|e| {
                InsightError::DataFormat(format!("unreadable file {}: {}", path.display(), e))
            })
    }

    fn load_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<DataFrame> {
        let mut workbook = open_workbook_auto(path).map_err(|e| {
            InsightError::DataFormat(format!("failed to open workbook {}: {}", path.display(), e))
        })?;

        let range = match sheet {
            Some(name) => {
                let available = workbook.sheet_names();
                if !available.iter().any(|s| s == name) {
                    return Err(InsightError::DataFormat(format!(
                        "sheet '{}' not found (available: {})",
                        name,
                        available.join(", ")
                    )));
                }
                workbook.worksheet_range(name).map_err(|e| {
                    InsightError::DataFormat(format!("failed to read sheet '{}': {}", name, e))
                })?
            }
            None => workbook
                .worksheet_range_at(0)
                .ok_or_else(|| InsightError::DataFormat("workbook has no worksheets".to_string()))?
                .map_err(|e| {
                    InsightError::DataFormat(format!("failed to read first sheet: {}", e))
                })?,
        };

        let mut rows = range.rows();
        let header = rows
            .next()
            .ok_or_else(|| InsightError::DataFormat("worksheet is empty".to_string()))?;
        let names = header_names(header);

        let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); names.len()];
        for row in rows {
            for (idx, column) in columns.iter_mut().enumerate() {
                column.push(row.get(idx).and_then(cell_text));
            }
        }

        let series: Vec<Column> = names
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Series::new(name.into(), values).into())
            .collect();
        Ok(DataFrame::new(series)?)
    }
}

/// Collapse doubled quotes and drop blank lines.
fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Header names with blanks filled in and duplicates suffixed.
fn header_names(header: &[Data]) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let base = cell_text(cell)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("column_{}", idx + 1));
            let mut name = base.clone();
            let mut suffix = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}

/// Render one spreadsheet cell as text; empty and error cells become `None`.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .or_else(|| Some(cell.to_string())),
        _ => Some(cell.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            InputFormat::from_path(Path::new("data.CSV")),
            Some(InputFormat::Csv)
        );
        assert_eq!(
            InputFormat::from_path(Path::new("sales.xlsx")),
            Some(InputFormat::Spreadsheet)
        );
        assert_eq!(InputFormat::from_path(Path::new("notes.pdf")), None);
        assert_eq!(InputFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "brand,amount\nA,10\nB,20\nA,5").unwrap();

        let df = DatasetLoader::load(&path, None).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_load_tsv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.tsv");
        std::fs::write(&path, "brand\tamount\nA\t10\nB\t20\n").unwrap();

        let df = DatasetLoader::load(&path, None).unwrap();
        assert_eq!(df.width(), 2);
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_missing_file_is_data_format_error() {
        let err = DatasetLoader::load("/nonexistent/data.csv", None).unwrap_err();
        assert_eq!(err.error_code(), "DATA_FORMAT");
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.pdf");
        std::fs::write(&path, "x").unwrap();
        let err = DatasetLoader::load(&path, None).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"));
    }

    #[test]
    fn test_header_names_fill_and_dedupe() {
        let header = vec![
            Data::String("city".to_string()),
            Data::Empty,
            Data::String("city".to_string()),
        ];
        assert_eq!(
            header_names(&header),
            vec!["city".to_string(), "column_2".to_string(), "city_2".to_string()]
        );
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::Float(12.0)), Some("12".to_string()));
        assert_eq!(cell_text(&Data::Float(12.5)), Some("12.5".to_string()));
        assert_eq!(cell_text(&Data::Int(7)), Some("7".to_string()));
        assert_eq!(
            cell_text(&Data::String("Acme".to_string())),
            Some("Acme".to_string())
        );
    }

    #[test]
    fn test_clean_csv_content() {
        let cleaned = clean_csv_content("a,b\n\n\"\"x\"\",1\n");
        assert_eq!(cleaned, "a,b\n\"x\",1");
    }
}
