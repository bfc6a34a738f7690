use crate::dataset::{CellValue, ColumnKind, ColumnSchema, Record};
use crate::error::{DataOpsError, Result};
use serde_json::{Map, Value};

use super::{ensure_unique_headers, example_value};

/// Parse a JSON array of objects, or a single object as a one-row table.
///
/// Columns come from the first object's keys in document order; keys that only
/// appear in later objects are dropped.
pub fn parse_json(text: &str) -> Result<(Vec<ColumnSchema>, Vec<Record>)> {
    let data: Value = serde_json::from_str(text)
        .map_err(|e| DataOpsError::Ingestion(format!("Invalid JSON: {e}")))?;

    let objects: Vec<Map<String, Value>> = match data {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(DataOpsError::Ingestion(format!(
                    "Element {idx} is not an object: {other}"
                ))),
            })
            .collect::<Result<_>>()?,
        Value::Object(map) => vec![map],
        other => {
            return Err(DataOpsError::Ingestion(format!(
                "Expected an array of objects or an object, got {other}"
            )));
        }
    };

    let Some(first) = objects.first() else {
        return Err(DataOpsError::Ingestion("JSON array is empty".to_owned()));
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    ensure_unique_headers(headers.iter().map(String::as_str))?;

    let columns: Vec<ColumnSchema> = first
        .iter()
        .map(|(key, value)| {
            let sample = CellValue::from_json(value.clone());
            ColumnSchema::new(key.clone(), runtime_kind(value), example_value(Some(&sample)))
        })
        .collect();

    let mut dropped = 0_usize;
    let records = objects
        .into_iter()
        .map(|object| {
            let mut record = Record::new();
            for (key, value) in object {
                if headers.contains(&key) {
                    record.insert(key, CellValue::from_json(value));
                } else {
                    dropped += 1;
                }
            }
            record
        })
        .collect();

    if dropped > 0 {
        tracing::warn!("Dropped {dropped} JSON field(s) not present in the first object");
    }

    Ok((columns, records))
}

fn runtime_kind(value: &Value) -> ColumnKind {
    match value {
        Value::Number(_) => ColumnKind::Number,
        Value::Bool(_) => ColumnKind::Boolean,
        Value::Null | Value::String(_) | Value::Array(_) | Value::Object(_) => ColumnKind::String,
    }
}
