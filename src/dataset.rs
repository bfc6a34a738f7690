//! Tabular dataset model
//!
//! A dataset is a sequence of immutable-by-convention [`DatasetSnapshot`]s
//! sharing one id. Each snapshot owns its columns, rows (with synthetic row
//! ids), version number, content hash and append-only history.

pub mod health;
pub mod schema;
pub mod snapshot;
pub mod value;

pub use health::DataHealth;
pub use schema::{ColumnKind, ColumnSchema, find_column};
pub use snapshot::{
    DatasetId, DatasetListItem, DatasetSnapshot, INITIAL_UPLOAD, SnapshotStamp, VersionEntry,
    fingerprint_rows, serialize_rows,
};
pub use value::{CellValue, DATE_FORMAT, Record, Row, RowId};
