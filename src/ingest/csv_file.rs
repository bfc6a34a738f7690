use crate::dataops::dates::parse_date;
use crate::dataset::{CellValue, ColumnKind, ColumnSchema, Record};
use crate::error::{DataOpsError, Result};

use super::{ensure_unique_headers, example_value};

/// Parse CSV text. The first non-blank line holds the headers.
///
/// Records whose field count differs from the header count are skipped.
pub fn parse_csv(text: &str) -> Result<(Vec<ColumnSchema>, Vec<Record>)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut lines = reader.records().filter(|r| !r.as_ref().is_ok_and(is_blank));

    let headers: Vec<String> = match lines.next() {
        Some(record) => record.map_err(malformed)?.iter().map(strip_quotes).collect(),
        None => return Err(DataOpsError::Ingestion("Empty CSV file".to_owned())),
    };
    ensure_unique_headers(headers.iter().map(String::as_str))?;

    let mut records = Vec::new();
    let mut skipped = 0_usize;
    for line in lines {
        let line = line.map_err(malformed)?;
        if line.len() != headers.len() {
            skipped += 1;
            continue;
        }
        let record: Record = headers
            .iter()
            .zip(line.iter())
            .map(|(header, raw)| (header.clone(), CellValue::parse_scalar(&strip_quotes(raw))))
            .collect();
        records.push(record);
    }

    if skipped > 0 {
        tracing::warn!("Skipped {skipped} CSV record(s) with a mismatched field count");
    }

    let first = records.first();
    let columns = headers
        .iter()
        .map(|header| {
            let sample = first.and_then(|r| r.get(header));
            ColumnSchema::new(header.clone(), infer_kind(header, sample), example_value(sample))
        })
        .collect();

    Ok((columns, records))
}

fn malformed(err: csv::Error) -> DataOpsError {
    DataOpsError::Ingestion(format!("Malformed CSV: {err}"))
}

/// A line with nothing on it. A line of bare separators still counts as a record.
fn is_blank(record: &csv::StringRecord) -> bool {
    record.len() == 1 && record.get(0).is_some_and(str::is_empty)
}

fn strip_quotes(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('"').unwrap_or(trimmed);
    trimmed.strip_suffix('"').unwrap_or(trimmed).to_owned()
}

fn infer_kind(header: &str, sample: Option<&CellValue>) -> ColumnKind {
    match sample {
        Some(CellValue::Number(_)) => ColumnKind::Number,
        _ if header.to_lowercase().contains("date") => ColumnKind::Date,
        Some(CellValue::Text(s)) if parse_date(s).is_some() => ColumnKind::Date,
        _ => ColumnKind::String,
    }
}
