//! Planner boundary
//!
//! A planner turns an instruction about a dataset into a [`TransformationPlan`].
//! LLM-backed planners live outside this crate and plug in through the
//! [`Planner`] trait; their raw replies are decoded with [`parse_planner_reply`].
//! [`RulePlanner`] is a deterministic keyword planner used by the CLI and tests.
//!
//! Planner output is untrusted: plans are validated by the runner, and
//! proposed versions or row counts are informational only.

use crate::dataops::{OperationKind, OperationSpec, TransformationPlan};
use crate::dataset::{ColumnSchema, DatasetId, DatasetSnapshot, Record};
use crate::error::{DataOpsError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// What the planner is asked to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PlanInstruction {
    /// A specific operation, optionally with parameters (quick actions, UI edits)
    Mode {
        operation: OperationKind,
        #[serde(skip_serializing_if = "Value::is_null")]
        details: Value,
    },
    /// Natural-language request
    FreeText { text: String },
}

impl PlanInstruction {
    pub fn mode(operation: OperationKind) -> Self {
        Self::Mode {
            operation,
            details: Value::Null,
        }
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Self::FreeText { text: text.into() }
    }
}

/// Dataset context handed to a planner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRequest {
    pub dataset_id: DatasetId,
    pub file_name: String,
    pub version: u64,
    pub row_count: usize,
    pub columns: Vec<ColumnSchema>,
    pub sample_rows: Vec<Record>,
    pub instruction: PlanInstruction,
}

impl PlanRequest {
    /// Build a request carrying at most `sample_rows` leading rows of `snapshot`.
    pub fn for_snapshot(
        snapshot: &DatasetSnapshot,
        instruction: PlanInstruction,
        sample_rows: usize,
    ) -> Self {
        Self {
            dataset_id: snapshot.id(),
            file_name: snapshot.file_name().to_owned(),
            version: snapshot.version(),
            row_count: snapshot.row_count(),
            columns: snapshot.columns().to_vec(),
            sample_rows: snapshot
                .rows()
                .iter()
                .take(sample_rows)
                .map(|r| r.cells().clone())
                .collect(),
            instruction,
        }
    }

    /// Plain-text context block for model-backed planners.
    pub fn prompt(&self) -> Result<String> {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{}({})", c.name, c.kind))
            .collect();
        let (mode, details) = match &self.instruction {
            PlanInstruction::Mode { operation, details } => {
                (operation.as_str().to_owned(), serde_json::to_string(details)?)
            }
            PlanInstruction::FreeText { text } => {
                ("NATURAL_LANGUAGE".to_owned(), serde_json::to_string(text)?)
            }
        };

        Ok(format!(
            "DATASET: {} (v{})\nCOLUMNS: {}\nROWS: {}\nSAMPLE DATA: {}\n\nREQUEST MODE: {}\nREQUEST DETAILS: {}\n",
            self.file_name,
            self.version,
            columns.join(", "),
            self.row_count,
            serde_json::to_string(&self.sample_rows)?,
            mode,
            details
        ))
    }
}

/// A planner's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerResponse {
    pub plan: TransformationPlan,
    #[serde(default)]
    pub summary: Option<String>,
    /// Informational only; the runner assigns versions.
    #[serde(default, alias = "new_version")]
    pub proposed_version: Option<String>,
}

pub trait Planner: Send + Sync {
    fn plan(&self, request: &PlanRequest) -> impl Future<Output = Result<PlannerResponse>> + Send;
}

/// Decode a raw planner reply, tolerating markdown code fences around the JSON.
///
/// # Errors
///
/// `PlannerFailure` for empty or malformed replies and for plans without operations.
pub fn parse_planner_reply(text: &str) -> Result<PlannerResponse> {
    let body = strip_code_fences(text);
    if body.is_empty() {
        return Err(DataOpsError::PlannerFailure("Planner returned an empty reply".to_owned()));
    }

    let response: PlannerResponse = serde_json::from_str(body)
        .map_err(|e| DataOpsError::PlannerFailure(format!("Malformed planner reply: {e}")))?;

    if response.plan.is_empty() {
        return Err(DataOpsError::PlannerFailure("Planner returned no operations".to_owned()));
    }
    Ok(response)
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening fence
    let rest = rest.find('\n').map_or(rest, |i| rest.get(i + 1..).unwrap_or(""));
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Deterministic keyword planner.
///
/// "delete row 3" targets the third row (index 2). A delete request that names
/// no rows yields an untargeted DELETE_ROWS, which validation rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulePlanner;

impl RulePlanner {
    pub fn respond(request: &PlanRequest) -> Result<PlannerResponse> {
        let operations = match &request.instruction {
            PlanInstruction::Mode { operation, details } => {
                vec![OperationSpec::new(*operation, details.clone())]
            }
            PlanInstruction::FreeText { text } => plan_from_text(text),
        };

        if operations.is_empty() {
            return Err(DataOpsError::PlannerFailure(
                "Could not derive any operation from the instruction".to_owned(),
            ));
        }

        let summary = operations
            .iter()
            .filter_map(|op| op.op_type.parse::<OperationKind>().ok())
            .map(OperationKind::default_summary)
            .collect::<Vec<_>>()
            .join("; ");

        Ok(PlannerResponse {
            plan: TransformationPlan::new(operations),
            summary: Some(summary),
            proposed_version: Some(format!("v{}", request.version + 1)),
        })
    }
}

impl Planner for RulePlanner {
    async fn plan(&self, request: &PlanRequest) -> Result<PlannerResponse> {
        Self::respond(request)
    }
}

fn plan_from_text(text: &str) -> Vec<OperationSpec> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .collect();
    let has = |stems: &[&str]| words.iter().any(|w| stems.iter().any(|s| w.starts_with(s)));

    let mut operations = Vec::new();
    if has(&["date", "normali"]) || words.iter().any(|w| w.ends_with("_date")) {
        operations.push(OperationSpec::simple(OperationKind::NormalizeDates));
    }
    let mentions_nulls = has(&["null", "missing", "empty", "blank"]);
    if has(&["fill"]) {
        operations.push(OperationSpec::simple(OperationKind::FillNulls));
    } else if mentions_nulls || has(&["clean"]) {
        operations.push(OperationSpec::simple(OperationKind::CleanNulls));
    }
    let mentions_duplicates = has(&["duplicate", "dedup"]);
    if mentions_duplicates {
        operations.push(OperationSpec::simple(OperationKind::Deduplicate));
    }
    if has(&["delete", "remove", "drop"]) && !mentions_nulls && !mentions_duplicates {
        let indices = row_numbers(&words);
        let params = if indices.is_empty() {
            Value::Null
        } else {
            serde_json::json!({ "indices": indices })
        };
        operations.push(OperationSpec::new(OperationKind::DeleteRows, params));
    }
    operations
}

/// One-based row numbers that follow a "row"/"rows" word, as zero-based
/// indices. "rows 3, 5 and 7" reads as a list; any other word ends it.
fn row_numbers(words: &[&str]) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut in_list = false;
    for word in words {
        match *word {
            "row" | "rows" => in_list = true,
            "and" if in_list => {}
            _ => match word.parse::<usize>() {
                Ok(n) if in_list => indices.extend(n.checked_sub(1)),
                _ => in_list = false,
            },
        }
    }
    indices.sort_unstable();
    indices.dedup();
    indices
}
