//! Upload parsing
//!
//! Turns a file name plus its text into an [`IngestedTable`]: ordered, typed
//! columns and one [`Record`] per data row. The format is chosen from the file
//! extension.

pub mod csv_file;
pub mod json_file;

use crate::dataset::{CellValue, ColumnSchema, Record};
use crate::error::{DataOpsError, Result, ResultExt as _};
use std::collections::HashSet;
use std::path::Path;

/// Longest example value kept on a column, in characters.
pub const EXAMPLE_MAX_CHARS: usize = 20;

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(DataOpsError::Ingestion(format!(
                "Unsupported file type '{file_name}'. Please upload CSV or JSON."
            ))),
        }
    }
}

/// Parsed upload, ready to become version 1 of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedTable {
    pub file_name: String,
    pub columns: Vec<ColumnSchema>,
    pub records: Vec<Record>,
}

/// Parse upload text according to the file name's extension.
pub fn ingest_text(file_name: &str, text: &str) -> Result<IngestedTable> {
    let (columns, records) = match SourceFormat::from_file_name(file_name)? {
        SourceFormat::Csv => csv_file::parse_csv(text)?,
        SourceFormat::Json => json_file::parse_json(text)?,
    };

    tracing::info!(
        "Ingested '{}': {} rows, {} columns",
        file_name,
        records.len(),
        columns.len()
    );

    Ok(IngestedTable {
        file_name: file_name.to_owned(),
        columns,
        records,
    })
}

/// Read and parse a file from disk. The dataset is named after the file.
pub fn ingest_file(path: impl AsRef<Path>) -> Result<IngestedTable> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| DataOpsError::Ingestion(format!("Invalid file path: {}", path.display())))?;
    SourceFormat::from_file_name(file_name)?;

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    ingest_text(file_name, &text)
}

/// Example value shown for a column, truncated for display.
pub(crate) fn example_value(value: Option<&CellValue>) -> CellValue {
    match value {
        Some(CellValue::Text(s)) => CellValue::Text(s.chars().take(EXAMPLE_MAX_CHARS).collect()),
        Some(other) => other.clone(),
        None => CellValue::text(""),
    }
}

pub(crate) fn ensure_unique_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for header in headers {
        if !seen.insert(header) {
            return Err(DataOpsError::Ingestion(format!("Duplicate column '{header}'")));
        }
    }
    Ok(())
}
