use crate::error::Result;
use serde::Serialize;
use std::collections::HashSet;

use super::snapshot::DatasetSnapshot;

/// Summary counters shown next to a draft while editing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataHealth {
    pub null_cells: usize,
    pub duplicate_rows: usize,
    pub total_cells: usize,
    /// 0..=100, higher is cleaner
    pub quality_score: u8,
}

impl DataHealth {
    pub fn of(snapshot: &DatasetSnapshot) -> Result<Self> {
        let rows = snapshot.rows();
        // a schema column missing from a row counts as null
        let null_cells = rows
            .iter()
            .map(|row| {
                snapshot
                    .columns()
                    .iter()
                    .filter(|c| row.cell_is_null_like(&c.name))
                    .count()
            })
            .sum();

        let mut seen = HashSet::with_capacity(rows.len());
        for row in rows {
            seen.insert(row.signature()?);
        }
        let duplicate_rows = rows.len() - seen.len();
        let column_count = snapshot.columns().len();
        let total_cells = rows.len() * column_count;

        Ok(Self {
            null_cells,
            duplicate_rows,
            total_cells,
            quality_score: quality_score(null_cells, duplicate_rows, column_count, total_cells),
        })
    }

    pub fn label(&self) -> &'static str {
        match self.quality_score {
            91..=100 => "good",
            71..=90 => "fair",
            _ => "poor",
        }
    }
}

fn quality_score(nulls: usize, duplicates: usize, columns: usize, total_cells: usize) -> u8 {
    if total_cells == 0 {
        return 100;
    }
    let penalty = (nulls + duplicates * columns) as f64 / total_cells as f64 * 100.0;
    // clamped to 0..=100 before narrowing
    (100.0 - penalty).round().clamp(0.0, 100.0) as u8
}
