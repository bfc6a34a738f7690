//! Thread-safe handle around a [`Session`].
//!
//! Every read-modify-write of the draft or the cache happens under one async
//! mutex, so two concurrent quick actions can never both build on the same
//! draft. The planner call runs with the lock released; its plan is committed
//! only if the active snapshot is still the one the request was built from.

use super::{CommitNotice, Session, request_plan};
use crate::dataops::{OperationKind, TransformationOutcome};
use crate::dataset::DatasetSnapshot;
use crate::error::{DataOpsError, Result};
use crate::planner::{PlanInstruction, Planner};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, broadcast};

#[derive(Debug, Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<Session>>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().await
    }

    /// Run `f` with exclusive access to the session.
    pub async fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.inner.lock().await;
        f(&mut session)
    }

    pub async fn quick_action(&self, kind: OperationKind) -> Result<TransformationOutcome> {
        self.with(|s| s.quick_action(kind)).await
    }

    pub async fn save(&self) -> Result<Option<CommitNotice>> {
        self.with(Session::save).await
    }

    pub async fn discard(&self) -> Result<()> {
        self.with(Session::discard).await
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<CommitNotice> {
        self.with(|s| s.subscribe()).await
    }

    /// Plan against the active dataset and commit the result.
    ///
    /// # Errors
    ///
    /// `ConcurrentModification` if another commit landed while the planner
    /// was running; `PlannerFailure` on timeout or an unusable reply.
    pub async fn plan_and_apply<P: Planner>(
        &self,
        planner: &P,
        instruction: PlanInstruction,
    ) -> Result<TransformationOutcome> {
        let (request, stamp, settings) = {
            let session = self.inner.lock().await;
            let request = session.plan_request(instruction)?;
            let stamp = session
                .active()
                .map(DatasetSnapshot::stamp)
                .ok_or(DataOpsError::NoActiveDataset)?;
            (request, stamp, session.settings().clone())
        };

        let response = match request_plan(planner, &request, &settings).await {
            Ok(response) => response,
            Err(e) => {
                self.with(|s| s.record_failure(super::AGENT_PLANNER, &e)).await;
                return Err(e);
            }
        };

        let mut session = self.inner.lock().await;
        session.apply_if_current(&stamp, &response.plan, response.summary.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActivityKind, Settings};
    use crate::dataops::TransformationPlan;
    use crate::planner::{PlanRequest, PlannerResponse, RulePlanner};
    use std::time::Duration;

    const NUMBERS: &str = "x\n1\n1\n2\n\n3\n";

    fn shared(settings: Settings) -> Result<SharedSession> {
        let mut session = Session::new(settings);
        session.upload_text("numbers.csv", NUMBERS)?;
        Ok(SharedSession::new(session))
    }

    /// Sleeps before answering with a dedupe plan.
    struct SlowPlanner(Duration);

    impl Planner for SlowPlanner {
        async fn plan(&self, request: &PlanRequest) -> Result<PlannerResponse> {
            tokio::time::sleep(self.0).await;
            RulePlanner::respond(request)
        }
    }

    #[tokio::test]
    async fn test_concurrent_quick_actions_serialize() -> Result<()> {
        let session = shared(Settings::default())?;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session.quick_action(OperationKind::FillNulls).await
            }));
        }
        for handle in handles {
            handle
                .await
                .map_err(|e| DataOpsError::Other(e.to_string()))??;
        }

        let (version, history) = session
            .with(|s| {
                let draft = s.draft().expect("draft");
                (draft.version(), draft.history().len())
            })
            .await;
        assert_eq!(version, 9);
        assert_eq!(history, 9);
        Ok(())
    }

    #[tokio::test]
    async fn test_commit_during_planning_is_rejected() -> Result<()> {
        let session = shared(Settings::default())?;
        let planner = SlowPlanner(Duration::from_millis(200));

        let racing = session.clone();
        let planning = tokio::spawn(async move {
            racing
                .plan_and_apply(&planner, PlanInstruction::free_text("remove duplicates"))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        session
            .with(|s| s.apply_to_active(&TransformationPlan::single(OperationKind::FillNulls), None))
            .await?;

        let result = planning
            .await
            .map_err(|e| DataOpsError::Other(e.to_string()))?;
        assert!(matches!(result, Err(DataOpsError::ConcurrentModification(_))));

        let version = session.with(|s| s.active().map(DatasetSnapshot::version)).await;
        assert_eq!(version, Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_planner_timeout() -> Result<()> {
        let settings = Settings {
            planner_timeout_secs: 1,
            ..Settings::default()
        };
        let session = shared(settings)?;
        let planner = SlowPlanner(Duration::from_secs(5));

        let result = session
            .plan_and_apply(&planner, PlanInstruction::mode(OperationKind::Deduplicate))
            .await;
        assert!(matches!(result, Err(DataOpsError::PlannerFailure(_))));

        let (version, last_kind) = session
            .with(|s| {
                (
                    s.active().map(DatasetSnapshot::version),
                    s.activity().latest().map(|e| e.kind),
                )
            })
            .await;
        assert_eq!(version, Some(1));
        assert_eq!(last_kind, Some(ActivityKind::Error));
        Ok(())
    }

    #[tokio::test]
    async fn test_save_broadcasts_to_subscribers() -> Result<()> {
        let session = shared(Settings::default())?;
        let mut notices = session.subscribe().await;

        session.quick_action(OperationKind::Deduplicate).await?;
        let saved = session.save().await?;
        let received = notices
            .recv()
            .await
            .map_err(|e| DataOpsError::Other(e.to_string()))?;
        assert_eq!(saved, Some(received));
        Ok(())
    }
}
