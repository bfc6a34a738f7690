//! Per-operation row-set transforms.
//!
//! Every function here works on the runner's private working copy, so a
//! failure part-way through a plan never leaks into a published snapshot.

use crate::dataset::{CellValue, ColumnKind, ColumnSchema, Row, RowId};
use crate::error::{DataOpsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::dates::parse_date;
use super::filter::RowFilter;
use super::operation::{CellTarget, Operation, RowSelection};

/// Replacement for null-like cells in non-number columns.
pub const FILL_PLACEHOLDER: &str = "Unknown";

/// What to do with a positional or id target that matches no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Log a warning and skip the target
    #[default]
    Tolerate,
    /// Fail the whole plan with `OutOfRange`
    Reject,
}

/// Mutable state threaded through one plan execution.
#[derive(Debug)]
pub struct ApplyContext<'a> {
    pub columns: &'a [ColumnSchema],
    pub range_policy: RangePolicy,
    pub next_row_id: u64,
}

impl<'a> ApplyContext<'a> {
    pub fn new(columns: &'a [ColumnSchema], range_policy: RangePolicy, next_row_id: u64) -> Self {
        Self {
            columns,
            range_policy,
            next_row_id,
        }
    }

    fn allocate_row_id(&mut self) -> RowId {
        let id = RowId(self.next_row_id);
        self.next_row_id += 1;
        id
    }

    /// Apply the range policy to a missing target. `Ok(())` means skip it.
    fn missing_target(&self, what: &str) -> Result<()> {
        match self.range_policy {
            RangePolicy::Tolerate => {
                tracing::warn!("Ignoring {what}");
                Ok(())
            }
            RangePolicy::Reject => Err(DataOpsError::OutOfRange(what.to_owned())),
        }
    }
}

/// Apply one operation in place. Returns the modification count.
pub fn apply_operation(op: &Operation, rows: &mut Vec<Row>, ctx: &mut ApplyContext<'_>) -> Result<usize> {
    match op {
        Operation::CleanNulls => Ok(clean_nulls(rows, ctx.columns)),
        Operation::FillNulls => Ok(fill_nulls(rows, ctx.columns)),
        Operation::Deduplicate => deduplicate(rows),
        Operation::NormalizeDates => Ok(normalize_dates(rows, ctx.columns)),
        Operation::DeleteRows(selection) => delete_rows(rows, selection, ctx),
        Operation::AddRow(record) => {
            let mut cells = record.clone();
            for column in ctx.columns {
                cells.entry(column.name.clone()).or_insert(CellValue::Null);
            }
            let id = ctx.allocate_row_id();
            rows.insert(0, Row::new(id, cells));
            Ok(1)
        }
        Operation::EditCell {
            target,
            column,
            value,
        } => edit_cell(rows, *target, column, value, ctx),
    }
}

fn clean_nulls(rows: &mut Vec<Row>, columns: &[ColumnSchema]) -> usize {
    let before = rows.len();
    rows.retain(|row| row.is_complete(columns));
    before - rows.len()
}

fn fill_nulls(rows: &mut [Row], columns: &[ColumnSchema]) -> usize {
    let mut filled = 0;
    for row in rows.iter_mut() {
        for column in columns {
            if row.cell_is_null_like(&column.name) {
                let replacement = match column.kind {
                    ColumnKind::Number => CellValue::Number(0.0),
                    ColumnKind::String | ColumnKind::Date | ColumnKind::Boolean => {
                        CellValue::text(FILL_PLACEHOLDER)
                    }
                };
                row.set(column.name.clone(), replacement);
                filled += 1;
            }
        }
    }
    filled
}

/// Keeps the first row of each group of identical content.
fn deduplicate(rows: &mut Vec<Row>) -> Result<usize> {
    let before = rows.len();
    let mut seen = HashSet::with_capacity(before);
    let mut kept = Vec::with_capacity(before);
    for row in rows.drain(..) {
        if seen.insert(row.signature()?) {
            kept.push(row);
        }
    }
    *rows = kept;
    Ok(before - rows.len())
}

fn normalize_dates(rows: &mut [Row], columns: &[ColumnSchema]) -> usize {
    let date_columns: Vec<&str> = columns
        .iter()
        .filter(|c| c.is_date_column())
        .map(|c| c.name.as_str())
        .collect();
    if date_columns.is_empty() {
        return 0;
    }

    let mut changed = 0;
    for row in rows.iter_mut() {
        for name in &date_columns {
            let Some(CellValue::Text(raw)) = row.get(name) else {
                continue;
            };
            let Some(date) = parse_date(raw) else {
                continue;
            };
            let normalized = CellValue::Date(date);
            if normalized.display_text() != *raw {
                changed += 1;
            }
            row.set(*name, normalized);
        }
    }
    changed
}

fn delete_rows(rows: &mut Vec<Row>, selection: &RowSelection, ctx: &ApplyContext<'_>) -> Result<usize> {
    let before = rows.len();
    match selection {
        RowSelection::Indices(indices) => {
            let targets: HashSet<usize> = indices.iter().copied().collect();
            let mut out_of_range: Vec<usize> = targets.iter().copied().filter(|i| *i >= before).collect();
            if !out_of_range.is_empty() {
                out_of_range.sort_unstable();
                ctx.missing_target(&format!(
                    "row indices {out_of_range:?} beyond {before} rows"
                ))?;
            }
            let mut position = 0;
            rows.retain(|_| {
                let keep = !targets.contains(&position);
                position += 1;
                keep
            });
        }
        RowSelection::RowIds(ids) => {
            let targets: HashSet<RowId> = ids.iter().copied().collect();
            let present: HashSet<RowId> = rows.iter().map(Row::id).collect();
            let mut missing: Vec<RowId> = targets.difference(&present).copied().collect();
            if !missing.is_empty() {
                missing.sort_unstable();
                let listed: Vec<String> = missing.iter().map(ToString::to_string).collect();
                ctx.missing_target(&format!("unknown row ids [{}]", listed.join(", ")))?;
            }
            rows.retain(|row| !targets.contains(&row.id()));
        }
        RowSelection::Filter(filter) => retain_unmatched(rows, filter),
    }
    Ok(before - rows.len())
}

fn retain_unmatched(rows: &mut Vec<Row>, filter: &RowFilter) {
    rows.retain(|row| !filter.matches(row));
}

fn edit_cell(
    rows: &mut [Row],
    target: CellTarget,
    column: &str,
    value: &CellValue,
    ctx: &ApplyContext<'_>,
) -> Result<usize> {
    let position = match target {
        CellTarget::Index(i) => (i < rows.len()).then_some(i),
        CellTarget::Id(id) => rows.iter().position(|r| r.id() == id),
    };

    let Some(row) = position.and_then(|p| rows.get_mut(p)) else {
        let what = match target {
            CellTarget::Index(i) => format!("edit of row index {i} beyond {} rows", rows.len()),
            CellTarget::Id(id) => format!("edit of unknown row id {id}"),
        };
        ctx.missing_target(&what)?;
        return Ok(0);
    };

    row.set(column, value.clone());
    Ok(1)
}
