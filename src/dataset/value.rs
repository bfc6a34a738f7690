//! Cell values and rows.
//!
//! Cells are a tagged union instead of loosely-typed scalars, so every
//! coercion rule (what counts as "missing", how numbers serialize) is an
//! explicit match.

use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::schema::ColumnSchema;

/// Largest integer a JSON consumer can represent exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Canonical output format for date cells.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Content of a single row, keyed by column name.
pub type Record = BTreeMap<String, CellValue>;

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Null, or the empty string. Absent keys are handled by [`Row::cell_is_null_like`].
    pub fn is_null_like(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::Bool(_) | Self::Number(_) | Self::Date(_) => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce raw text the way ingestion does: a value that parses as a finite
    /// number becomes a number, anything else stays text.
    pub fn parse_scalar(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::Text(String::new());
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Self::Number(n),
            _ => Self::Text(raw.to_owned()),
        }
    }

    /// Convert an arbitrary JSON value. Objects and arrays are kept as their JSON text.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::Text(s),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Text(other.to_string())
            }
        }
    }

    /// Plain-text rendering used for CSV export, filters and display.
    pub fn display_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Text(s) => s.clone(),
            Self::Date(d) => d.format(DATE_FORMAT).to_string(),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// Integral values inside the safe range, as an integer.
fn integral_value(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        Some(n as i64)
    } else {
        None
    }
}

fn format_number(n: f64) -> String {
    match integral_value(n) {
        Some(i) => i.to_string(),
        None if n.is_finite() => n.to_string(),
        None => String::new(),
    }
}

impl Serialize for CellValue {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => match integral_value(*n) {
                Some(i) => serializer.serialize_i64(i),
                None if n.is_finite() => serializer.serialize_f64(*n),
                None => serializer.serialize_none(),
            },
            Self::Text(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.collect_str(&d.format(DATE_FORMAT)),
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Self::from_json)
    }
}

/// Synthetic row identifier, stable for the lifetime of a dataset.
///
/// Not part of the row's content: never hashed, never compared by deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// One row of a dataset.
///
/// Serializes as its cells only, so the serialized form is the row's content.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: RowId,
    cells: Record,
}

impl Row {
    pub fn new(id: RowId, cells: Record) -> Self {
        Self { id, cells }
    }

    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn cells(&self) -> &Record {
        &self.cells
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    /// Replace a cell, returning the previous value.
    pub fn set(&mut self, column: impl Into<String>, value: CellValue) -> Option<CellValue> {
        self.cells.insert(column.into(), value)
    }

    /// Missing keys count as null.
    pub fn cell_is_null_like(&self, column: &str) -> bool {
        self.cells.get(column).is_none_or(CellValue::is_null_like)
    }

    /// Every schema column and every present cell holds a value.
    pub fn is_complete(&self, columns: &[ColumnSchema]) -> bool {
        columns.iter().all(|c| !self.cell_is_null_like(&c.name))
            && self.cells.values().all(|v| !v.is_null_like())
    }

    /// Serialized content, used for structural equality.
    pub fn signature(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.cells)?)
    }

    /// Same content, ignoring the row id.
    pub fn same_content(&self, other: &Self) -> bool {
        self.cells == other.cells
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.cells.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::schema::ColumnKind;

    fn record(pairs: &[(&str, CellValue)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn test_integral_numbers_serialize_without_fraction() -> Result<()> {
        let row = Row::new(
            RowId(0),
            record(&[("age", CellValue::Number(30.0)), ("score", CellValue::Number(0.5))]),
        );
        assert_eq!(serde_json::to_string(&row)?, r#"{"age":30,"score":0.5}"#);
        Ok(())
    }

    #[test]
    fn test_dates_and_nulls_serialize_canonically() -> Result<()> {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date");
        let row = Row::new(
            RowId(7),
            record(&[("joined", CellValue::Date(date)), ("note", CellValue::Null)]),
        );
        assert_eq!(
            serde_json::to_string(&row)?,
            r#"{"joined":"2024-03-05","note":null}"#
        );
        Ok(())
    }

    #[test]
    fn test_non_finite_numbers_serialize_as_null() -> Result<()> {
        assert_eq!(serde_json::to_string(&CellValue::Number(f64::NAN))?, "null");
        Ok(())
    }

    #[test]
    fn test_null_like() {
        assert!(CellValue::Null.is_null_like());
        assert!(CellValue::text("").is_null_like());
        assert!(!CellValue::text(" ").is_null_like());
        assert!(!CellValue::Number(0.0).is_null_like());
        assert!(!CellValue::Bool(false).is_null_like());
    }

    #[test]
    fn test_parse_scalar() {
        assert_eq!(CellValue::parse_scalar("30"), CellValue::Number(30.0));
        assert_eq!(CellValue::parse_scalar("-1.5"), CellValue::Number(-1.5));
        assert_eq!(CellValue::parse_scalar("Alice"), CellValue::text("Alice"));
        assert_eq!(CellValue::parse_scalar(""), CellValue::text(""));
        assert_eq!(CellValue::parse_scalar("NaN"), CellValue::text("NaN"));
        assert_eq!(CellValue::parse_scalar("inf"), CellValue::text("inf"));
    }

    #[test]
    fn test_from_json_flattens_nested_values() {
        let value = serde_json::json!({"a": [1, 2]});
        assert_eq!(CellValue::from_json(value), CellValue::text(r#"{"a":[1,2]}"#));
        assert_eq!(CellValue::from_json(serde_json::json!(null)), CellValue::Null);
    }

    #[test]
    fn test_row_completeness_counts_missing_columns() {
        let columns = vec![
            ColumnSchema::new("name", ColumnKind::String, "x"),
            ColumnSchema::new("age", ColumnKind::Number, 1.0),
        ];
        let partial = Row::new(RowId(0), record(&[("name", CellValue::text("Bob"))]));
        assert!(!partial.is_complete(&columns));

        let full = Row::new(
            RowId(1),
            record(&[("name", CellValue::text("Bob")), ("age", CellValue::Number(4.0))]),
        );
        assert!(full.is_complete(&columns));
    }

    #[test]
    fn test_same_content_ignores_row_id() {
        let a = Row::new(RowId(1), record(&[("x", CellValue::Number(1.0))]));
        let b = Row::new(RowId(2), record(&[("x", CellValue::Number(1.0))]));
        assert!(a.same_content(&b));
        assert_ne!(a, b);
    }
}
