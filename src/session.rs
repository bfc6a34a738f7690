//! The single-owner editing session
//!
//! A [`Session`] owns every cached dataset, the active dataset's draft, the
//! activity log and the commit broadcast channel. All mutation goes through
//! `&mut self`; multi-threaded hosts wrap it in [`SharedSession`].
//!
//! Two ways to change data:
//!
//! - **Staged**: [`Session::stage`], [`Session::quick_action`] and the inline
//!   edits run against the draft. Nothing outside the session sees the result
//!   until [`Session::save`].
//! - **One-shot**: [`Session::apply_to_active`] and [`Session::plan_and_apply`]
//!   commit directly, and are refused while the draft has unsaved changes.

pub mod analytics;
pub mod cache;
pub mod draft;
pub mod shared;

pub use analytics::AnalyticsCache;
pub use cache::DatasetCache;
pub use draft::DraftController;
pub use shared::SharedSession;

use crate::config::{ActivityEntry, ActivityKind, ActivityLog, Settings};
use crate::dataops::{
    CellTarget, Operation, OperationKind, RowSelection, TransformationOutcome, TransformationPlan,
    TransformationRunner,
};
use crate::dataset::{
    CellValue, DataHealth, DatasetId, DatasetListItem, DatasetSnapshot, Record, RowId, SnapshotStamp,
};
use crate::error::{DataOpsError, Result};
use crate::ingest::{IngestedTable, ingest_text};
use crate::planner::{PlanInstruction, PlanRequest, Planner, PlannerResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tokio::sync::broadcast;

const AGENT_INGEST: &str = "Ingestion";
const AGENT_STUDIO: &str = "DataStudio";
const AGENT_DATAOPS: &str = "DataOps";
const AGENT_PLANNER: &str = "Planner";

const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// Broadcast after every committed transformation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitNotice {
    pub dataset_id: DatasetId,
    pub version: u64,
    pub version_hash: String,
    pub row_count: usize,
    pub committed_at: DateTime<Utc>,
}

impl CommitNotice {
    fn of(snapshot: &DatasetSnapshot) -> Self {
        Self {
            dataset_id: snapshot.id(),
            version: snapshot.version(),
            version_hash: snapshot.version_hash().to_owned(),
            row_count: snapshot.row_count(),
            committed_at: snapshot.last_modified(),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    settings: Settings,
    runner: TransformationRunner,
    cache: DatasetCache,
    draft: Option<DraftController>,
    activity: ActivityLog,
    notices: broadcast::Sender<CommitNotice>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            runner: TransformationRunner::from_settings(&settings),
            activity: ActivityLog::new(settings.activity_log_capacity),
            cache: DatasetCache::new(),
            draft: None,
            settings,
            notices,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn activity_mut(&mut self) -> &mut ActivityLog {
        &mut self.activity
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommitNotice> {
        self.notices.subscribe()
    }

    // ---- datasets ------------------------------------------------------

    /// Cache an ingested table as version 1 and make it the active dataset.
    pub fn upload(&mut self, table: IngestedTable) -> Result<DatasetId> {
        let snapshot = DatasetSnapshot::create(
            table.file_name,
            table.columns,
            table.records,
            self.runner.hasher(),
        )?;
        let id = snapshot.id();
        self.activity.log(
            AGENT_INGEST,
            format!(
                "Uploaded '{}': {} rows, {} columns (hash {})",
                snapshot.file_name(),
                snapshot.row_count(),
                snapshot.columns().len(),
                snapshot.version_hash()
            ),
            ActivityKind::Action,
        );
        self.cache.insert(snapshot);
        self.activate(id)?;
        Ok(id)
    }

    pub fn upload_text(&mut self, file_name: &str, text: &str) -> Result<DatasetId> {
        match ingest_text(file_name, text) {
            Ok(table) => self.upload(table),
            Err(e) => {
                self.record_failure(AGENT_INGEST, &e);
                Err(e)
            }
        }
    }

    pub fn datasets(&self) -> Vec<DatasetListItem> {
        self.cache.list(self.active_id())
    }

    /// Committed snapshot of any cached dataset.
    pub fn get(&self, id: DatasetId) -> Option<&DatasetSnapshot> {
        self.cache.get(id)
    }

    /// Select the active dataset and hand out an owned copy of it.
    ///
    /// The draft is reset whenever it belongs to a different dataset; unsaved
    /// changes on it are dropped.
    pub fn activate(&mut self, id: DatasetId) -> Result<DatasetSnapshot> {
        let snapshot = self.cache.require(id)?.clone();

        if self.draft.as_ref().is_none_or(|d| d.dataset_id() != id) {
            if let Some(previous) = self.draft.as_ref().filter(|d| d.has_unsaved_changes()) {
                tracing::warn!(
                    "Dropping unsaved draft v{} of '{}'",
                    previous.draft().version(),
                    previous.committed().file_name()
                );
            }
            self.draft = Some(DraftController::new(snapshot.clone()));
        }

        Ok(snapshot)
    }

    pub fn active_id(&self) -> Option<DatasetId> {
        self.draft.as_ref().map(DraftController::dataset_id)
    }

    /// Committed state of the active dataset.
    pub fn active(&self) -> Option<&DatasetSnapshot> {
        self.draft.as_ref().map(DraftController::committed)
    }

    /// Working draft of the active dataset.
    pub fn draft(&self) -> Option<&DatasetSnapshot> {
        self.draft.as_ref().map(DraftController::draft)
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.draft
            .as_ref()
            .is_some_and(DraftController::has_unsaved_changes)
    }

    /// Health counters of the working draft.
    pub fn draft_health(&self) -> Result<DataHealth> {
        DataHealth::of(self.draft().ok_or(DataOpsError::NoActiveDataset)?)
    }

    // ---- staged edits ----------------------------------------------------

    pub fn stage(
        &mut self,
        plan: &TransformationPlan,
        summary: Option<&str>,
    ) -> Result<TransformationOutcome> {
        let controller = self.draft.as_mut().ok_or(DataOpsError::NoActiveDataset)?;
        match controller.stage(&self.runner, plan, summary) {
            Ok(outcome) => {
                self.activity.log(
                    AGENT_STUDIO,
                    format!(
                        "Staged '{}' as draft v{} ({} modification(s))",
                        summary.unwrap_or(&self.settings.default_change_description),
                        outcome.snapshot.version(),
                        outcome.modifications
                    ),
                    ActivityKind::Action,
                );
                Ok(outcome)
            }
            Err(e) => {
                self.record_failure(AGENT_STUDIO, &e);
                Err(e)
            }
        }
    }

    /// One of the parameterless cleanup operations, staged on the draft.
    pub fn quick_action(&mut self, kind: OperationKind) -> Result<TransformationOutcome> {
        if !kind.is_parameterless() {
            return Err(DataOpsError::invalid_operation(
                0,
                format!("{kind} is not a quick action"),
            ));
        }
        self.stage(&TransformationPlan::single(kind), Some(kind.default_summary()))
    }

    pub fn edit_cell(
        &mut self,
        row_id: RowId,
        column: &str,
        value: CellValue,
    ) -> Result<TransformationOutcome> {
        let op = Operation::EditCell {
            target: CellTarget::Id(row_id),
            column: column.to_owned(),
            value,
        };
        let summary = format!("Edited '{column}' of row {row_id}");
        self.stage(&TransformationPlan::from_operations(&[op]), Some(&summary))
    }

    pub fn add_row(&mut self, record: Record) -> Result<TransformationOutcome> {
        let plan = TransformationPlan::from_operations(&[Operation::AddRow(record)]);
        self.stage(&plan, Some(OperationKind::AddRow.default_summary()))
    }

    pub fn delete_rows(&mut self, row_ids: &[RowId]) -> Result<TransformationOutcome> {
        let op = Operation::DeleteRows(RowSelection::RowIds(row_ids.to_vec()));
        let summary = format!("Deleted {} user-selected row(s)", row_ids.len());
        self.stage(&TransformationPlan::from_operations(&[op]), Some(&summary))
    }

    /// Promote the draft. `Ok(None)` when there was nothing to save.
    pub fn save(&mut self) -> Result<Option<CommitNotice>> {
        let controller = self.draft.as_mut().ok_or(DataOpsError::NoActiveDataset)?;
        let Some(committed) = controller.save() else {
            return Ok(None);
        };
        let committed = committed.clone();
        self.publish(committed, AGENT_STUDIO).map(Some)
    }

    pub fn discard(&mut self) -> Result<()> {
        let controller = self.draft.as_mut().ok_or(DataOpsError::NoActiveDataset)?;
        if controller.has_unsaved_changes() {
            let dropped = controller.draft().version();
            controller.discard();
            self.activity.log(
                AGENT_STUDIO,
                format!("Discarded draft v{dropped}"),
                ActivityKind::Info,
            );
        }
        Ok(())
    }

    // ---- one-shot commits ------------------------------------------------

    /// Execute `plan` against the committed active snapshot and commit the result.
    pub fn apply_to_active(
        &mut self,
        plan: &TransformationPlan,
        summary: Option<&str>,
    ) -> Result<TransformationOutcome> {
        let stamp = self
            .active()
            .map(DatasetSnapshot::stamp)
            .ok_or(DataOpsError::NoActiveDataset)?;
        self.apply_if_current(&stamp, plan, summary)
    }

    /// Like [`Self::apply_to_active`], but only if the active snapshot still
    /// matches `expected`.
    pub fn apply_if_current(
        &mut self,
        expected: &SnapshotStamp,
        plan: &TransformationPlan,
        summary: Option<&str>,
    ) -> Result<TransformationOutcome> {
        let result = self.try_apply(expected, plan, summary);
        match result {
            Ok(outcome) => {
                self.publish(outcome.snapshot.clone(), AGENT_DATAOPS)?;
                Ok(outcome)
            }
            Err(e) => {
                self.record_failure(AGENT_DATAOPS, &e);
                Err(e)
            }
        }
    }

    fn try_apply(
        &self,
        expected: &SnapshotStamp,
        plan: &TransformationPlan,
        summary: Option<&str>,
    ) -> Result<TransformationOutcome> {
        let controller = self.draft.as_ref().ok_or(DataOpsError::NoActiveDataset)?;
        let current = controller.committed();
        if current.stamp() != *expected {
            return Err(DataOpsError::ConcurrentModification(format!(
                "'{}' moved from v{} to v{} while the plan was prepared",
                current.file_name(),
                expected.version,
                current.version()
            )));
        }
        if controller.has_unsaved_changes() {
            return Err(DataOpsError::UnsavedDraft(format!(
                "'{}' has staged changes (draft v{}); save or discard them first",
                current.file_name(),
                controller.draft().version()
            )));
        }
        self.runner.execute(current, plan, summary)
    }

    /// Build the planner request for the active dataset.
    pub fn plan_request(&self, instruction: PlanInstruction) -> Result<PlanRequest> {
        let active = self.active().ok_or(DataOpsError::NoActiveDataset)?;
        Ok(PlanRequest::for_snapshot(
            active,
            instruction,
            self.settings.planner_sample_rows,
        ))
    }

    /// Ask `planner` for a plan and commit it to the active dataset.
    pub async fn plan_and_apply<P: Planner>(
        &mut self,
        planner: &P,
        instruction: PlanInstruction,
    ) -> Result<TransformationOutcome> {
        let request = self.plan_request(instruction)?;
        let stamp = self
            .active()
            .map(DatasetSnapshot::stamp)
            .ok_or(DataOpsError::NoActiveDataset)?;

        let response = match request_plan(planner, &request, &self.settings).await {
            Ok(response) => response,
            Err(e) => {
                self.record_failure(AGENT_PLANNER, &e);
                return Err(e);
            }
        };
        self.apply_if_current(&stamp, &response.plan, response.summary.as_deref())
    }

    // ---- internals -------------------------------------------------------

    fn publish(&mut self, committed: DatasetSnapshot, agent: &str) -> Result<CommitNotice> {
        self.cache.commit(committed.clone())?;
        let notice = CommitNotice::of(&committed);
        // a save already promoted the draft; one-shot commits rebase it
        if let Some(controller) = self.draft.as_mut().filter(|d| {
            d.dataset_id() == committed.id() && d.committed().version() != committed.version()
        }) {
            controller.rebase(committed);
        }

        self.activity.log(
            agent,
            format!("Dataset committed: v{}", notice.version),
            ActivityKind::Action,
        );
        if self.notices.send(notice.clone()).is_err() {
            tracing::debug!("No subscribers for commit of v{}", notice.version);
        }
        Ok(notice)
    }

    fn record_failure(&mut self, agent: &str, err: &DataOpsError) {
        self.activity
            .push(ActivityEntry::new(agent, err.to_string(), ActivityKind::Error));
    }
}

/// Call the planner under the configured timeout.
pub(crate) async fn request_plan<P: Planner>(
    planner: &P,
    request: &PlanRequest,
    settings: &Settings,
) -> Result<PlannerResponse> {
    let start = Instant::now();
    let response = tokio::time::timeout(settings.planner_timeout(), planner.plan(request))
        .await
        .map_err(|_elapsed| {
            DataOpsError::PlannerFailure(format!(
                "Planner timed out after {}s",
                settings.planner_timeout_secs
            ))
        })??;

    if response.plan.is_empty() {
        return Err(DataOpsError::PlannerFailure("Planner returned no operations".to_owned()));
    }
    tracing::info!(
        "Planner produced {} operation(s) for '{}' v{} in {:?}",
        response.plan.len(),
        request.file_name,
        request.version,
        start.elapsed()
    );
    Ok(response)
}
