//! Writing snapshots back out as CSV or JSON.

use crate::dataset::DatasetSnapshot;
use crate::error::{DataOpsError, Result, ResultExt as _};
use crate::ingest::SourceFormat;
use serde_json::{Map, Value};
use std::path::Path;

/// CSV text with a header row in column order. Nulls become empty fields.
pub fn to_csv(snapshot: &DatasetSnapshot) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(snapshot.columns().iter().map(|c| c.name.as_str()))?;

    for row in snapshot.rows() {
        writer.write_record(snapshot.columns().iter().map(|c| {
            row.get(&c.name)
                .map(|v| v.display_text())
                .unwrap_or_default()
        }))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DataOpsError::Serialization(format!("Failed to flush CSV: {e}")))?;
    String::from_utf8(bytes).map_err(|e| DataOpsError::Serialization(e.to_string()))
}

/// Pretty JSON array of objects, keys in column order.
pub fn to_json(snapshot: &DatasetSnapshot) -> Result<String> {
    let rows: Vec<Value> = snapshot
        .rows()
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for column in snapshot.columns() {
                let value = row.get(&column.name).map_or(Ok(Value::Null), serde_json::to_value)?;
                object.insert(column.name.clone(), value);
            }
            Ok(Value::Object(object))
        })
        .collect::<Result<_>>()?;
    Ok(serde_json::to_string_pretty(&rows)?)
}

/// Write `snapshot` to `path`, picking the format from the extension.
///
/// # Errors
///
/// `Serialization` for unsupported extensions, `Io` when the file cannot be written.
pub fn export_snapshot(snapshot: &DatasetSnapshot, path: &Path) -> Result<()> {
    let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let format = SourceFormat::from_file_name(&file_name).map_err(|_| {
        DataOpsError::Serialization(format!(
            "Unsupported export format '{file_name}'. Use a .csv or .json file name."
        ))
    })?;
    let text = match format {
        SourceFormat::Csv => to_csv(snapshot)?,
        SourceFormat::Json => to_json(snapshot)?,
    };
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write export: {}", path.display()))?;

    tracing::info!(
        "Exported '{}' v{} ({} rows) to {}",
        snapshot.file_name(),
        snapshot.version(),
        snapshot.row_count(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ingest_file, ingest_text};
    use crate::integrity::HashAlgorithm;

    fn snapshot(file_name: &str, text: &str) -> Result<DatasetSnapshot> {
        let table = ingest_text(file_name, text)?;
        DatasetSnapshot::create(table.file_name, table.columns, table.records, HashAlgorithm::Rolling32)
    }

    #[test]
    fn test_csv_keeps_column_order_and_blanks_nulls() -> Result<()> {
        let snap = snapshot("people.json", r#"[{"name":"Alice","age":30,"city":null},{"name":"Bob, Jr.","age":4.5,"city":"Leeds"}]"#)?;
        let csv = to_csv(&snap)?;
        assert_eq!(csv, "name,age,city\nAlice,30,\n\"Bob, Jr.\",4.5,Leeds\n");
        Ok(())
    }

    #[test]
    fn test_json_is_array_of_objects() -> Result<()> {
        let snap = snapshot("people.csv", "name,age\nAlice,30\nBob,\n")?;
        let parsed: Value = serde_json::from_str(&to_json(&snap)?)?;
        assert_eq!(
            parsed,
            serde_json::json!([{"name": "Alice", "age": 30}, {"name": "Bob", "age": ""}])
        );
        Ok(())
    }

    #[test]
    fn test_export_roundtrips_through_ingest() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let snap = snapshot("people.csv", "name,age\nAlice,30\nBob,41\n")?;

        let path = dir.path().join("out.csv");
        export_snapshot(&snap, &path)?;
        let back = ingest_file(&path)?;
        assert_eq!(back.records.len(), 2);
        assert_eq!(back.columns.len(), 2);

        Ok(())
    }

    #[test]
    fn test_unsupported_export_extension_is_a_serialization_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let snap = snapshot("people.csv", "name,age\nAlice,30\n")?;
        let path = dir.path().join("out.xlsx");

        let err = export_snapshot(&snap, &path).err();
        assert!(matches!(err, Some(DataOpsError::Serialization(ref msg)) if msg.contains("out.xlsx")));
        assert!(!path.exists());
        Ok(())
    }
}
