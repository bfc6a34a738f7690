//! Row predicates for targeted deletes.

use crate::dataset::{CellValue, Row};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison applied by a [`RowFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    IsNull,
    NotNull,
}

impl FilterOp {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw.trim().to_lowercase().as_str() {
            "eq" | "=" | "==" | "equals" => Self::Eq,
            "ne" | "!=" | "<>" | "not_equals" => Self::Ne,
            "lt" | "<" => Self::Lt,
            "lte" | "<=" => Self::Lte,
            "gt" | ">" => Self::Gt,
            "gte" | ">=" => Self::Gte,
            "contains" => Self::Contains,
            "is_null" | "isnull" | "null" => Self::IsNull,
            "not_null" | "notnull" => Self::NotNull,
            _ => return None,
        })
    }

    /// `is_null` / `not_null` take no comparison value.
    pub fn needs_value(self) -> bool {
        !matches!(self, Self::IsNull | Self::NotNull)
    }
}

/// `{ "column": "age", "op": "lt", "value": 18 }`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowFilter {
    pub column: String,
    pub op: FilterOp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<CellValue>,
}

impl RowFilter {
    pub fn matches(&self, row: &Row) -> bool {
        let cell = row.get(&self.column);
        match self.op {
            FilterOp::IsNull => row.cell_is_null_like(&self.column),
            FilterOp::NotNull => !row.cell_is_null_like(&self.column),
            FilterOp::Contains => match (cell, &self.value) {
                (Some(cell), Some(needle)) => cell
                    .display_text()
                    .to_lowercase()
                    .contains(&needle.display_text().to_lowercase()),
                _ => false,
            },
            FilterOp::Eq => self.compare(cell) == Some(Ordering::Equal),
            FilterOp::Ne => self.compare(cell) != Some(Ordering::Equal),
            FilterOp::Lt => self.compare(cell) == Some(Ordering::Less),
            FilterOp::Lte => matches!(self.compare(cell), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Gt => self.compare(cell) == Some(Ordering::Greater),
            FilterOp::Gte => {
                matches!(self.compare(cell), Some(Ordering::Greater | Ordering::Equal))
            }
        }
    }

    /// Numbers compare numerically, everything else by display text.
    /// Missing cells and nulls only compare equal to a null value.
    fn compare(&self, cell: Option<&CellValue>) -> Option<Ordering> {
        let value = self.value.as_ref()?;
        let cell = cell.unwrap_or(&CellValue::Null);

        match (cell, value) {
            (CellValue::Null, CellValue::Null) => Some(Ordering::Equal),
            (CellValue::Null, _) | (_, CellValue::Null) => None,
            (CellValue::Number(a), CellValue::Number(b)) => a.partial_cmp(b),
            (CellValue::Number(a), CellValue::Text(b)) => {
                b.trim().parse::<f64>().ok().and_then(|b| a.partial_cmp(&b))
            }
            (a, b) => Some(a.display_text().cmp(&b.display_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Record, RowId};

    fn row(age: CellValue, name: &str) -> Row {
        Row::new(
            RowId(0),
            Record::from([
                ("age".to_owned(), age),
                ("name".to_owned(), CellValue::text(name)),
            ]),
        )
    }

    fn filter(column: &str, op: FilterOp, value: Option<CellValue>) -> RowFilter {
        RowFilter {
            column: column.to_owned(),
            op,
            value,
        }
    }

    #[test]
    fn test_numeric_comparisons() {
        let adult = row(CellValue::Number(30.0), "Alice");
        let minor = row(CellValue::Number(12.0), "Tim");
        let under_18 = filter("age", FilterOp::Lt, Some(CellValue::Number(18.0)));

        assert!(!under_18.matches(&adult));
        assert!(under_18.matches(&minor));
        assert!(filter("age", FilterOp::Gte, Some(CellValue::text("30"))).matches(&adult));
    }

    #[test]
    fn test_null_checks_treat_empty_as_null() {
        let blank = row(CellValue::text(""), "Bob");
        assert!(filter("age", FilterOp::IsNull, None).matches(&blank));
        assert!(filter("missing", FilterOp::IsNull, None).matches(&blank));
        assert!(!filter("name", FilterOp::IsNull, None).matches(&blank));
        assert!(filter("name", FilterOp::NotNull, None).matches(&blank));
    }

    #[test]
    fn test_text_equality_and_contains() {
        let alice = row(CellValue::Number(30.0), "Alice");
        assert!(filter("name", FilterOp::Eq, Some(CellValue::text("Alice"))).matches(&alice));
        assert!(filter("name", FilterOp::Ne, Some(CellValue::text("Bob"))).matches(&alice));
        assert!(filter("name", FilterOp::Contains, Some(CellValue::text("lic"))).matches(&alice));
        assert!(!filter("name", FilterOp::Contains, Some(CellValue::text("bob"))).matches(&alice));
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(FilterOp::parse("<="), Some(FilterOp::Lte));
        assert_eq!(FilterOp::parse("NOT_NULL"), Some(FilterOp::NotNull));
        assert_eq!(FilterOp::parse("between"), None);
        assert!(!FilterOp::IsNull.needs_value());
    }
}
