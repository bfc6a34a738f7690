//! Transformation plans and their typed operations
//!
//! Plans arrive as loosely-typed JSON (`{"operations": [{"type": ..., "params": {...}}]}`)
//! from a planner that is not trusted. [`TransformationPlan::validate`] turns every
//! [`OperationSpec`] into a typed [`Operation`] against the target's columns before any
//! row is touched; a single bad operation rejects the whole plan.

use crate::dataset::{CellValue, ColumnKind, ColumnSchema, Record, RowId, find_column};
use crate::error::{DataOpsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::filter::{FilterOp, RowFilter};

/// Operation types understood by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    CleanNulls,
    FillNulls,
    Deduplicate,
    NormalizeDates,
    DeleteRows,
    AddRow,
    EditCell,
}

impl OperationKind {
    pub const ALL: [Self; 7] = [
        Self::CleanNulls,
        Self::FillNulls,
        Self::Deduplicate,
        Self::NormalizeDates,
        Self::DeleteRows,
        Self::AddRow,
        Self::EditCell,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CleanNulls => "CLEAN_NULLS",
            Self::FillNulls => "FILL_NULLS",
            Self::Deduplicate => "DEDUPLICATE",
            Self::NormalizeDates => "NORMALIZE_DATES",
            Self::DeleteRows => "DELETE_ROWS",
            Self::AddRow => "ADD_ROW",
            Self::EditCell => "EDIT_CELL",
        }
    }

    /// Change description used by quick actions.
    pub fn default_summary(self) -> &'static str {
        match self {
            Self::CleanNulls => "Removed rows with NULL values",
            Self::FillNulls => "Filled NULL values",
            Self::Deduplicate => "Removed duplicate rows",
            Self::NormalizeDates => "Normalized date formats",
            Self::DeleteRows => "Deleted selected rows",
            Self::AddRow => "Added row",
            Self::EditCell => "Edited cell",
        }
    }

    /// Quick actions take no parameters.
    pub fn is_parameterless(self) -> bool {
        matches!(
            self,
            Self::CleanNulls | Self::FillNulls | Self::Deduplicate | Self::NormalizeDates
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("Unknown operation type: {s}"))
    }
}

/// Serializable, unvalidated operation as produced by a planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl OperationSpec {
    pub fn new(kind: OperationKind, params: Value) -> Self {
        Self {
            op_type: kind.as_str().to_owned(),
            params,
        }
    }

    pub fn simple(kind: OperationKind) -> Self {
        Self::new(kind, Value::Null)
    }
}

/// Which rows a DELETE_ROWS removes.
#[derive(Debug, Clone, PartialEq)]
pub enum RowSelection {
    /// Zero-based positions in the row-set the operation runs against
    Indices(Vec<usize>),
    RowIds(Vec<RowId>),
    Filter(RowFilter),
}

/// Which row an EDIT_CELL updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellTarget {
    Index(usize),
    Id(RowId),
}

/// A validated operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CleanNulls,
    FillNulls,
    Deduplicate,
    NormalizeDates,
    DeleteRows(RowSelection),
    AddRow(Record),
    EditCell {
        target: CellTarget,
        column: String,
        value: CellValue,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CleanNulls => OperationKind::CleanNulls,
            Self::FillNulls => OperationKind::FillNulls,
            Self::Deduplicate => OperationKind::Deduplicate,
            Self::NormalizeDates => OperationKind::NormalizeDates,
            Self::DeleteRows(_) => OperationKind::DeleteRows,
            Self::AddRow(_) => OperationKind::AddRow,
            Self::EditCell { .. } => OperationKind::EditCell,
        }
    }

    /// Validate one planner operation against the target's columns.
    ///
    /// `index` is the operation's position in its plan, carried into errors.
    pub fn from_spec(spec: &OperationSpec, index: usize, columns: &[ColumnSchema]) -> Result<Self> {
        let kind: OperationKind = spec
            .op_type
            .parse()
            .map_err(|e: String| DataOpsError::invalid_operation(index, e))?;

        let params = Params::new(index, &spec.params)?;

        match kind {
            OperationKind::CleanNulls => Ok(Self::CleanNulls),
            OperationKind::FillNulls => Ok(Self::FillNulls),
            OperationKind::Deduplicate => Ok(Self::Deduplicate),
            OperationKind::NormalizeDates => Ok(Self::NormalizeDates),
            OperationKind::DeleteRows => params.row_selection(columns).map(Self::DeleteRows),
            OperationKind::AddRow => params.new_row(columns).map(Self::AddRow),
            OperationKind::EditCell => params.cell_edit(columns),
        }
    }

    /// Back to the planner wire format.
    pub fn to_spec(&self) -> OperationSpec {
        let params = match self {
            Self::CleanNulls | Self::FillNulls | Self::Deduplicate | Self::NormalizeDates => {
                Value::Null
            }
            Self::DeleteRows(RowSelection::Indices(indices)) => {
                serde_json::json!({ "indices": indices })
            }
            Self::DeleteRows(RowSelection::RowIds(ids)) => {
                serde_json::json!({ "row_ids": ids })
            }
            Self::DeleteRows(RowSelection::Filter(filter)) => {
                serde_json::json!({ "filter": filter })
            }
            Self::AddRow(row) => serde_json::json!({ "row": row }),
            Self::EditCell {
                target,
                column,
                value,
            } => {
                let mut map = Map::new();
                match target {
                    CellTarget::Index(i) => map.insert("rowIndex".to_owned(), Value::from(*i)),
                    CellTarget::Id(id) => map.insert("rowId".to_owned(), Value::from(id.0)),
                };
                map.insert("colName".to_owned(), Value::String(column.clone()));
                map.insert(
                    "value".to_owned(),
                    serde_json::to_value(value).unwrap_or(Value::Null),
                );
                Value::Object(map)
            }
        };
        OperationSpec::new(self.kind(), params)
    }
}

/// An ordered list of operations applied as one transformation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformationPlan {
    pub operations: Vec<OperationSpec>,
}

impl TransformationPlan {
    pub fn new(operations: Vec<OperationSpec>) -> Self {
        Self { operations }
    }

    pub fn single(kind: OperationKind) -> Self {
        Self::new(vec![OperationSpec::simple(kind)])
    }

    pub fn from_operations(operations: &[Operation]) -> Self {
        Self::new(operations.iter().map(Operation::to_spec).collect())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Validate every operation. Fails on the first bad one.
    pub fn validate(&self, columns: &[ColumnSchema]) -> Result<Vec<Operation>> {
        self.operations
            .iter()
            .enumerate()
            .map(|(index, spec)| Operation::from_spec(spec, index, columns))
            .collect()
    }
}

/// Accessor over an operation's `params` object with camelCase / snake_case aliases.
struct Params<'a> {
    index: usize,
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Params<'a> {
    fn new(index: usize, raw: &'a Value) -> Result<Self> {
        match raw {
            Value::Null => Ok(Self { index, map: None }),
            Value::Object(map) => Ok(Self {
                index,
                map: Some(map),
            }),
            other => Err(DataOpsError::invalid_operation(
                index,
                format!("'params' must be an object, got {other}"),
            )),
        }
    }

    fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        let map = self.map?;
        keys.iter()
            .find_map(|k| map.get(*k))
            .filter(|v| !v.is_null())
    }

    fn invalid(&self, message: impl Into<String>) -> DataOpsError {
        DataOpsError::invalid_operation(self.index, message)
    }

    fn column<'c>(&self, columns: &'c [ColumnSchema], name: &str) -> Result<&'c ColumnSchema> {
        find_column(columns, name).ok_or_else(|| self.invalid(format!("Unknown column '{name}'")))
    }

    fn row_selection(&self, columns: &[ColumnSchema]) -> Result<RowSelection> {
        if let Some(raw) = self.get(&["indices"]) {
            let indices = self.index_list(raw, "indices")?;
            if !indices.is_empty() {
                return Ok(RowSelection::Indices(indices));
            }
        }

        if let Some(raw) = self.get(&["row_ids", "rowIds"]) {
            let ids = self.index_list(raw, "row_ids")?;
            if !ids.is_empty() {
                return Ok(RowSelection::RowIds(
                    ids.into_iter().map(|i| RowId(i as u64)).collect(),
                ));
            }
        }

        if let Some(raw) = self.get(&["filter"]) {
            return self.filter(raw, columns).map(RowSelection::Filter);
        }

        Err(DataOpsError::SafetyViolation(format!(
            "Operation {} (DELETE_ROWS): destructive delete without specific target",
            self.index + 1
        )))
    }

    fn index_list(&self, raw: &Value, name: &str) -> Result<Vec<usize>> {
        let items = raw
            .as_array()
            .ok_or_else(|| self.invalid(format!("'{name}' must be an array")))?;
        items
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| {
                        self.invalid(format!("'{name}' must hold non-negative integers, got {v}"))
                    })
            })
            .collect()
    }

    fn filter(&self, raw: &Value, columns: &[ColumnSchema]) -> Result<RowFilter> {
        let map = raw
            .as_object()
            .ok_or_else(|| self.invalid("'filter' must be an object"))?;

        let column = map
            .get("column")
            .and_then(Value::as_str)
            .ok_or_else(|| self.invalid("'filter.column' is required"))?;
        self.column(columns, column)?;

        let op_raw = map
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| self.invalid("'filter.op' is required"))?;
        let op = FilterOp::parse(op_raw)
            .ok_or_else(|| self.invalid(format!("Unknown filter op '{op_raw}'")))?;

        let value = map.get("value").cloned().map(CellValue::from_json);
        if op.needs_value() && value.is_none() {
            return Err(self.invalid(format!("'filter.value' is required for '{op_raw}'")));
        }

        Ok(RowFilter {
            column: column.to_owned(),
            op,
            value,
        })
    }

    fn new_row(&self, columns: &[ColumnSchema]) -> Result<Record> {
        let map = self
            .get(&["row"])
            .ok_or_else(|| self.invalid("'row' is required"))?
            .as_object()
            .ok_or_else(|| self.invalid("'row' must be an object"))?;

        let mut record = Record::new();
        for (name, value) in map {
            let column = self.column(columns, name)?;
            record.insert(name.clone(), coerce_for(column, CellValue::from_json(value.clone())));
        }
        for column in columns {
            record.entry(column.name.clone()).or_insert(CellValue::Null);
        }
        Ok(record)
    }

    fn cell_edit(&self, columns: &[ColumnSchema]) -> Result<Operation> {
        let target = if let Some(raw) = self.get(&["rowIndex", "row_index"]) {
            CellTarget::Index(self.position(raw, "rowIndex")?)
        } else if let Some(raw) = self.get(&["rowId", "row_id"]) {
            CellTarget::Id(RowId(self.position(raw, "rowId")? as u64))
        } else {
            return Err(self.invalid("'rowIndex' or 'rowId' is required"));
        };

        let name = self
            .get(&["colName", "col_name", "column"])
            .and_then(Value::as_str)
            .ok_or_else(|| self.invalid("'colName' is required"))?;
        let column = self.column(columns, name)?;

        let value = self
            .map
            .and_then(|m| m.get("value"))
            .ok_or_else(|| self.invalid("'value' is required"))?;

        Ok(Operation::EditCell {
            target,
            column: name.to_owned(),
            value: coerce_for(column, CellValue::from_json(value.clone())),
        })
    }

    fn position(&self, raw: &Value, name: &str) -> Result<usize> {
        raw.as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| self.invalid(format!("'{name}' must be a non-negative integer")))
    }
}

/// Text that parses as a finite number becomes a number in number columns.
fn coerce_for(column: &ColumnSchema, value: CellValue) -> CellValue {
    match value {
        CellValue::Text(s) if column.kind == ColumnKind::Number => {
            match CellValue::parse_scalar(s.trim()) {
                number @ CellValue::Number(_) => number,
                _ => CellValue::Text(s),
            }
        }
        other => other,
    }
}
