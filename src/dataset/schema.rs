use serde::{Deserialize, Serialize};

use super::value::CellValue;

/// Semantic type declared for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    #[default]
    String,
    Number,
    Date,
    Boolean,
}

impl ColumnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed column with an example value for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    pub example: CellValue,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, kind: ColumnKind, example: impl Into<CellValue>) -> Self {
        Self {
            name: name.into(),
            kind,
            example: example.into(),
        }
    }

    /// Declared as a date, or named like one.
    pub fn is_date_column(&self) -> bool {
        self.kind == ColumnKind::Date || self.name.to_lowercase().contains("date")
    }
}

pub fn find_column<'a>(columns: &'a [ColumnSchema], name: &str) -> Option<&'a ColumnSchema> {
    columns.iter().find(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_column_detection() {
        assert!(ColumnSchema::new("hired", ColumnKind::Date, "").is_date_column());
        assert!(ColumnSchema::new("Start_Date", ColumnKind::String, "").is_date_column());
        assert!(!ColumnSchema::new("salary", ColumnKind::Number, 0.0).is_date_column());
    }

    #[test]
    fn test_kind_serializes_lowercase() -> anyhow::Result<()> {
        let column = ColumnSchema::new("age", ColumnKind::Number, 30.0);
        let json = serde_json::to_string(&column)?;
        assert_eq!(json, r#"{"name":"age","type":"number","example":30}"#);
        Ok(())
    }
}
