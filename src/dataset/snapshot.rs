//! Versioned dataset snapshots

use crate::error::Result;
use crate::integrity::HashAlgorithm;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::schema::ColumnSchema;
use super::value::{Record, Row, RowId};

/// Opaque dataset identity, stable across every version of one upload.
pub type DatasetId = Uuid;

/// Description recorded for the first version of every dataset.
pub const INITIAL_UPLOAD: &str = "Initial Upload";

/// One append-only history record.
///
/// The entry for the transition v → v+1 stores `version = v` (the superseded
/// version) and `row_count` = rows before the change. `resulting_version` and
/// `rows_after` describe the other side of the transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionEntry {
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub change_description: String,
    pub row_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications_count: Option<usize>,
    pub resulting_version: u64,
    pub rows_after: usize,
}

impl VersionEntry {
    pub fn initial_upload(row_count: usize) -> Self {
        Self {
            version: 1,
            timestamp: Utc::now(),
            change_description: INITIAL_UPLOAD.to_owned(),
            row_count,
            modifications_count: None,
            resulting_version: 1,
            rows_after: row_count,
        }
    }
}

/// Version and hash of a snapshot, used to detect that it moved underneath a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStamp {
    pub dataset_id: DatasetId,
    pub version: u64,
    pub version_hash: String,
}

/// List-view metadata for a cached dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetListItem {
    pub id: DatasetId,
    pub name: String,
    pub rows: usize,
    pub version: u64,
    pub uploaded_at: DateTime<Utc>,
    pub active: bool,
}

/// One versioned state of a dataset.
///
/// Snapshots are never mutated in place once published: transformations
/// derive a new value with `version + 1` and an appended history entry.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSnapshot {
    id: DatasetId,
    file_name: String,
    columns: Vec<ColumnSchema>,
    rows: Vec<Row>,
    version: u64,
    version_hash: String,
    history: Vec<VersionEntry>,
    last_modified: DateTime<Utc>,
    uploaded_at: DateTime<Utc>,
    #[serde(skip)]
    is_modified: bool,
    #[serde(skip)]
    next_row_id: u64,
}

impl DatasetSnapshot {
    /// Create version 1 of a freshly ingested dataset.
    ///
    /// Rows receive sequential synthetic ids in ingestion order.
    pub fn create(
        file_name: impl Into<String>,
        columns: Vec<ColumnSchema>,
        records: Vec<Record>,
        hasher: HashAlgorithm,
    ) -> Result<Self> {
        let rows: Vec<Row> = records
            .into_iter()
            .zip(0_u64..)
            .map(|(cells, id)| Row::new(RowId(id), cells))
            .collect();
        let next_row_id = rows.len() as u64;
        let version_hash = fingerprint_rows(&rows, hasher)?;
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            columns,
            history: vec![VersionEntry::initial_upload(rows.len())],
            rows,
            version: 1,
            version_hash,
            last_modified: now,
            uploaded_at: now,
            is_modified: false,
            next_row_id,
        })
    }

    /// Build the successor snapshot produced by a transformation.
    pub(crate) fn derive(
        &self,
        rows: Vec<Row>,
        next_row_id: u64,
        version_hash: String,
        entry: VersionEntry,
    ) -> Self {
        let mut history = self.history.clone();
        history.push(entry);

        Self {
            id: self.id,
            file_name: self.file_name.clone(),
            columns: self.columns.clone(),
            rows,
            version: self.version + 1,
            version_hash,
            history,
            last_modified: Utc::now(),
            uploaded_at: self.uploaded_at,
            is_modified: false,
            next_row_id,
        }
    }

    pub(crate) fn mark_modified(&mut self, modified: bool) {
        self.is_modified = modified;
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn version_hash(&self) -> &str {
        &self.version_hash
    }

    pub fn history(&self) -> &[VersionEntry] {
        &self.history
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }

    /// Whether this value holds uncommitted draft changes.
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    pub(crate) fn next_row_id(&self) -> u64 {
        self.next_row_id
    }

    pub fn position_of(&self, row_id: RowId) -> Option<usize> {
        self.rows.iter().position(|r| r.id() == row_id)
    }

    pub fn stamp(&self) -> SnapshotStamp {
        SnapshotStamp {
            dataset_id: self.id,
            version: self.version,
            version_hash: self.version_hash.clone(),
        }
    }

    pub fn list_item(&self, active: bool) -> DatasetListItem {
        DatasetListItem {
            id: self.id,
            name: self.file_name.clone(),
            rows: self.rows.len(),
            version: self.version,
            uploaded_at: self.uploaded_at,
            active,
        }
    }

    /// Recompute the fingerprint of the current rows and compare it to the stored hash.
    pub fn verify_hash(&self, hasher: HashAlgorithm) -> Result<bool> {
        Ok(fingerprint_rows(&self.rows, hasher)? == self.version_hash)
    }
}

/// Canonical JSON serialization of a row-set's content.
pub fn serialize_rows(rows: &[Row]) -> Result<String> {
    Ok(serde_json::to_string(rows)?)
}

/// Fingerprint of a row-set's content.
pub fn fingerprint_rows(rows: &[Row], hasher: HashAlgorithm) -> Result<String> {
    Ok(hasher.fingerprint(&serialize_rows(rows)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::schema::ColumnKind;
    use crate::dataset::value::CellValue;

    fn people() -> (Vec<ColumnSchema>, Vec<Record>) {
        let columns = vec![
            ColumnSchema::new("name", ColumnKind::String, "Alice"),
            ColumnSchema::new("age", ColumnKind::Number, 30.0),
        ];
        let records = vec![
            Record::from([
                ("name".to_owned(), CellValue::text("Alice")),
                ("age".to_owned(), CellValue::Number(30.0)),
            ]),
            Record::from([
                ("name".to_owned(), CellValue::text("Bob")),
                ("age".to_owned(), CellValue::text("")),
            ]),
        ];
        (columns, records)
    }

    #[test]
    fn test_create_starts_at_version_one_with_initial_entry() -> Result<()> {
        let (columns, records) = people();
        let snapshot = DatasetSnapshot::create("people.csv", columns, records, HashAlgorithm::Rolling32)?;

        assert_eq!(snapshot.version(), 1);
        assert_eq!(snapshot.row_count(), 2);
        assert_eq!(snapshot.history().len(), 1);
        let entry = snapshot.history().first().expect("initial entry");
        assert_eq!(entry.version, 1);
        assert_eq!(entry.change_description, INITIAL_UPLOAD);
        assert_eq!(entry.row_count, 2);
        assert!(!snapshot.is_modified());
        assert!(snapshot.verify_hash(HashAlgorithm::Rolling32)?);
        Ok(())
    }

    #[test]
    fn test_identical_rows_hash_identically_across_datasets() -> Result<()> {
        let (columns, records) = people();
        let a = DatasetSnapshot::create("a.csv", columns.clone(), records.clone(), HashAlgorithm::Rolling32)?;
        let b = DatasetSnapshot::create("b.csv", columns, records, HashAlgorithm::Rolling32)?;

        assert_ne!(a.id(), b.id());
        assert_eq!(a.version_hash(), b.version_hash());
        Ok(())
    }

    #[test]
    fn test_row_ids_are_sequential() -> Result<()> {
        let (columns, records) = people();
        let snapshot = DatasetSnapshot::create("people.csv", columns, records, HashAlgorithm::Sha256)?;
        let ids: Vec<RowId> = snapshot.rows().iter().map(Row::id).collect();
        assert_eq!(ids, vec![RowId(0), RowId(1)]);
        assert_eq!(snapshot.next_row_id(), 2);
        assert_eq!(snapshot.position_of(RowId(1)), Some(1));
        Ok(())
    }

    #[test]
    fn test_serialize_rows_is_content_only() -> Result<()> {
        let (columns, records) = people();
        let snapshot = DatasetSnapshot::create("people.csv", columns, records, HashAlgorithm::Rolling32)?;
        assert_eq!(
            serialize_rows(snapshot.rows())?,
            r#"[{"age":30,"name":"Alice"},{"age":"","name":"Bob"}]"#
        );
        Ok(())
    }
}
