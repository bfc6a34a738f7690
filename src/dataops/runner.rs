//! Plan execution against a snapshot.
//!
//! The runner validates a whole plan, applies it to a working copy of the
//! rows, fingerprints the result and derives the successor snapshot. The input
//! snapshot is only ever borrowed, so any error leaves it exactly as it was.

use crate::config::Settings;
use crate::dataset::{DatasetSnapshot, VersionEntry, fingerprint_rows};
use crate::error::Result;
use crate::integrity::HashAlgorithm;
use chrono::Utc;
use std::time::{Duration, Instant};

use super::executor::{ApplyContext, RangePolicy, apply_operation};
use super::operation::TransformationPlan;

/// Description recorded when the caller gives none.
pub const DEFAULT_CHANGE_DESCRIPTION: &str = "Applied transformations";

/// Result of one successful plan execution.
#[derive(Debug, Clone)]
pub struct TransformationOutcome {
    pub snapshot: DatasetSnapshot,

    /// Sum of per-operation modification counts
    pub modifications: usize,

    pub rows_before: usize,
    pub rows_after: usize,
    pub operations_applied: usize,
    pub duration: Duration,
}

impl TransformationOutcome {
    pub fn summary(&self) -> String {
        format!(
            "v{} → v{}: {} operation(s), {} modification(s), rows {} → {}, {:.2}ms",
            self.snapshot.version().saturating_sub(1),
            self.snapshot.version(),
            self.operations_applied,
            self.modifications,
            self.rows_before,
            self.rows_after,
            self.duration.as_secs_f64() * 1000.0
        )
    }
}

/// Applies transformation plans with a fixed hash algorithm and range policy.
#[derive(Debug, Clone)]
pub struct TransformationRunner {
    hasher: HashAlgorithm,
    range_policy: RangePolicy,
    default_description: String,
}

impl Default for TransformationRunner {
    fn default() -> Self {
        Self::new(HashAlgorithm::default(), RangePolicy::default())
    }
}

impl TransformationRunner {
    pub fn new(hasher: HashAlgorithm, range_policy: RangePolicy) -> Self {
        Self {
            hasher,
            range_policy,
            default_description: DEFAULT_CHANGE_DESCRIPTION.to_owned(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            hasher: settings.hash_algorithm,
            range_policy: settings.out_of_range,
            default_description: settings.default_change_description.clone(),
        }
    }

    pub fn hasher(&self) -> HashAlgorithm {
        self.hasher
    }

    /// Execute `plan` against `snapshot`, producing version `snapshot.version() + 1`.
    ///
    /// # Errors
    ///
    /// `InvalidOperation` / `SafetyViolation` when any operation fails validation,
    /// `OutOfRange` for missing targets under [`RangePolicy::Reject`]. No
    /// operation is applied in either case.
    pub fn execute(
        &self,
        snapshot: &DatasetSnapshot,
        plan: &TransformationPlan,
        summary: Option<&str>,
    ) -> Result<TransformationOutcome> {
        let start = Instant::now();
        let operations = plan.validate(snapshot.columns())?;

        let rows_before = snapshot.row_count();
        let mut rows = snapshot.rows().to_vec();
        let mut ctx = ApplyContext::new(snapshot.columns(), self.range_policy, snapshot.next_row_id());
        let mut modifications = 0;

        for (idx, op) in operations.iter().enumerate() {
            let count = apply_operation(op, &mut rows, &mut ctx)?;
            tracing::debug!(
                "Operation {} ({}) on '{}': {} modification(s), {} row(s)",
                idx + 1,
                op.kind(),
                snapshot.file_name(),
                count,
                rows.len()
            );
            modifications += count;
        }

        if rows.is_empty() && rows_before > 0 {
            tracing::warn!(
                "Transformation emptied dataset '{}' ({} rows before)",
                snapshot.file_name(),
                rows_before
            );
        }

        let version_hash = fingerprint_rows(&rows, self.hasher)?;
        let description = summary
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.default_description)
            .to_owned();
        let rows_after = rows.len();

        let entry = VersionEntry {
            version: snapshot.version(),
            timestamp: Utc::now(),
            change_description: description,
            row_count: rows_before,
            modifications_count: Some(modifications),
            resulting_version: snapshot.version() + 1,
            rows_after,
        };
        let next = snapshot.derive(rows, ctx.next_row_id, version_hash, entry);

        Ok(TransformationOutcome {
            snapshot: next,
            modifications,
            rows_before,
            rows_after,
            operations_applied: operations.len(),
            duration: start.elapsed(),
        })
    }
}
