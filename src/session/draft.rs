//! Staged editing for one dataset.
//!
//! ```text
//!            stage / edit
//!   Clean ───────────────▶ Dirty ──┐ stage / edit
//!     ▲                      │  ◀──┘
//!     └──── save | discard ──┘
//! ```

use crate::dataops::{TransformationOutcome, TransformationPlan, TransformationRunner};
use crate::dataset::{DatasetId, DatasetSnapshot};
use crate::error::Result;

/// A committed snapshot plus the working draft derived from it.
#[derive(Debug, Clone)]
pub struct DraftController {
    committed: DatasetSnapshot,
    draft: DatasetSnapshot,
}

impl DraftController {
    pub fn new(committed: DatasetSnapshot) -> Self {
        Self {
            draft: committed.clone(),
            committed,
        }
    }

    pub fn dataset_id(&self) -> DatasetId {
        self.committed.id()
    }

    pub fn committed(&self) -> &DatasetSnapshot {
        &self.committed
    }

    pub fn draft(&self) -> &DatasetSnapshot {
        &self.draft
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.draft.is_modified()
    }

    /// Run `plan` against the draft. The committed snapshot is not touched.
    pub fn stage(
        &mut self,
        runner: &TransformationRunner,
        plan: &TransformationPlan,
        summary: Option<&str>,
    ) -> Result<TransformationOutcome> {
        let mut outcome = runner.execute(&self.draft, plan, summary)?;
        outcome.snapshot.mark_modified(true);
        self.draft = outcome.snapshot.clone();
        Ok(outcome)
    }

    /// Promote the draft. Returns `None` when there was nothing to save.
    pub fn save(&mut self) -> Option<&DatasetSnapshot> {
        if !self.has_unsaved_changes() {
            return None;
        }
        self.draft.mark_modified(false);
        self.committed = self.draft.clone();
        Some(&self.committed)
    }

    /// Drop provisional changes, returning to the committed snapshot.
    pub fn discard(&mut self) {
        self.draft = self.committed.clone();
    }

    /// Replace both sides after a one-shot commit elsewhere.
    pub fn rebase(&mut self, committed: DatasetSnapshot) {
        self.draft = committed.clone();
        self.committed = committed;
    }
}
