//! Integration tests for the editing session
//!
//! Draft isolation, commits, notifications and planner-driven flows, run
//! against the fixture files.

use insight_dataops::config::{ActivityKind, Settings};
use insight_dataops::dataops::{OperationKind, RangePolicy, TransformationPlan};
use insight_dataops::dataset::{CellValue, DatasetSnapshot, RowId};
use insight_dataops::error::{DataOpsError, Result};
use insight_dataops::export::export_snapshot;
use insight_dataops::ingest::ingest_file;
use insight_dataops::planner::{PlanInstruction, RulePlanner, parse_planner_reply};
use insight_dataops::session::{AnalyticsCache, Session, SharedSession};

fn session_with(path: &str) -> Result<Session> {
    let mut session = Session::default();
    session.upload(ingest_file(path)?)?;
    Ok(session)
}

fn active_version(session: &Session) -> Option<u64> {
    session.active().map(DatasetSnapshot::version)
}

#[test]
fn test_draft_isolation_from_v3() -> Result<()> {
    let mut session = session_with("testdata/people.csv")?;
    let id = session.active_id().expect("active dataset");

    session.apply_to_active(&TransformationPlan::single(OperationKind::NormalizeDates), None)?;
    session.apply_to_active(&TransformationPlan::single(OperationKind::FillNulls), None)?;
    let v3 = session.active().cloned().expect("v3");
    assert_eq!(v3.version(), 3);

    session.quick_action(OperationKind::Deduplicate)?;
    session.quick_action(OperationKind::CleanNulls)?;
    assert_eq!(session.draft().map(DatasetSnapshot::version), Some(5));
    assert!(session.has_unsaved_changes());
    assert_eq!(session.draft().map(|d| d.history().len()), Some(5));

    // nothing outside the draft moved
    let cached = session.get(id).expect("cached");
    assert_eq!(cached.version(), 3);
    assert_eq!(cached.version_hash(), v3.version_hash());
    assert_eq!(cached.rows(), v3.rows());
    assert_eq!(session.datasets().first().map(|i| i.version), Some(3));

    session.discard()?;
    let draft = session.draft().expect("draft");
    assert_eq!(draft.version(), 3);
    assert_eq!(draft.version_hash(), v3.version_hash());
    assert!(!session.has_unsaved_changes());
    Ok(())
}

#[test]
fn test_save_publishes_notice_and_invalidates_analytics() -> Result<()> {
    let mut session = session_with("testdata/orders.json")?;
    let mut notices = session.subscribe();
    let id = session.active_id().expect("active dataset");

    let mut analytics = AnalyticsCache::new();
    let hash_v1 = session.active().map(|s| s.version_hash().to_owned()).expect("hash");
    analytics.store(id, hash_v1.clone(), "4 orders".to_owned());

    session.quick_action(OperationKind::Deduplicate)?;
    // staged edits are invisible to consumers
    assert!(notices.try_recv().is_err());
    assert!(analytics.fresh(id, &hash_v1).is_some());

    let notice = session.save()?.expect("notice");
    assert_eq!(notices.try_recv().ok().as_ref(), Some(&notice));
    assert_eq!((notice.version, notice.row_count), (2, 3));
    assert!(analytics.observe(&notice));
    assert!(analytics.is_stale(id, &notice.version_hash));
    assert!(!session.has_unsaved_changes());
    Ok(())
}

#[test]
fn test_identical_content_keeps_analytics_fresh() -> Result<()> {
    let mut session = session_with("testdata/orders.json")?;
    let id = session.active_id().expect("active dataset");
    let hash = session.active().map(|s| s.version_hash().to_owned()).expect("hash");

    let mut analytics = AnalyticsCache::new();
    analytics.store(id, hash.clone(), 42_u32);

    // a filter that matches no row: new version, same content
    let plan = TransformationPlan::from_json(
        r#"{"operations":[{"type":"DELETE_ROWS","params":{"filter":{"column":"customer","op":"eq","value":"Nobody"}}}]}"#,
    )?;
    let outcome = session.apply_to_active(&plan, Some("No-op cleanup"))?;
    assert_eq!(outcome.modifications, 0);
    assert_eq!(outcome.snapshot.version(), 2);
    assert_eq!(outcome.snapshot.version_hash(), hash);

    let notice = session.save()?;
    assert!(notice.is_none(), "one-shot commits leave nothing to save");
    assert_eq!(analytics.fresh(id, outcome.snapshot.version_hash()), Some(&42));
    Ok(())
}

#[test]
fn test_inline_edits_use_stable_row_ids() -> Result<()> {
    let mut session = session_with("testdata/people.csv")?;

    // Carol is r2; deleting r0 first must not shift the edit onto someone else
    session.delete_rows(&[RowId(0)])?;
    session.edit_cell(RowId(2), "city", CellValue::text("Hull West"))?;

    let draft = session.draft().expect("draft");
    let carol = draft.position_of(RowId(2)).and_then(|i| draft.rows().get(i)).expect("carol");
    assert_eq!(carol.get("name"), Some(&CellValue::text("Carol")));
    assert_eq!(carol.get("city"), Some(&CellValue::text("Hull West")));

    // unknown ids are tolerated by default
    let outcome = session.delete_rows(&[RowId(99)])?;
    assert_eq!(outcome.modifications, 0);
    assert_eq!(session.draft().map(DatasetSnapshot::row_count), Some(4));
    Ok(())
}

#[test]
fn test_reject_policy_surfaces_out_of_range() -> Result<()> {
    let settings = Settings {
        out_of_range: RangePolicy::Reject,
        ..Settings::default()
    };
    let mut session = Session::new(settings);
    session.upload(ingest_file("testdata/people.csv")?)?;

    let err = session.delete_rows(&[RowId(99)]).err();
    assert!(matches!(err, Some(DataOpsError::OutOfRange(_))));
    assert!(!session.has_unsaved_changes());
    assert_eq!(
        session.activity().latest().map(|e| e.kind),
        Some(ActivityKind::Error)
    );
    Ok(())
}

#[test]
fn test_external_planner_reply_is_validated() -> Result<()> {
    let mut session = session_with("testdata/people.csv")?;

    let reply = "```json\n{\"plan\":{\"operations\":[{\"type\":\"EDIT_CELL\",\"params\":{\"rowIndex\":0,\"colName\":\"salary\",\"value\":1}}]},\"new_version\":\"v9\"}\n```";
    let response = parse_planner_reply(reply)?;
    let err = session.apply_to_active(&response.plan, response.summary.as_deref()).err();
    assert!(matches!(err, Some(DataOpsError::InvalidOperation { index: 0, .. })));
    assert_eq!(active_version(&session), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_ask_and_export() -> Result<()> {
    let mut session = session_with("testdata/people.csv")?;
    let outcome = session
        .plan_and_apply(&RulePlanner, PlanInstruction::free_text("Delete rows 2 and 5"))
        .await?;
    assert_eq!(outcome.modifications, 2);
    assert_eq!(active_version(&session), Some(2));

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("people_v2.json");
    export_snapshot(&outcome.snapshot, &path)?;
    let exported = ingest_file(&path)?;
    let names: Vec<String> = exported
        .records
        .iter()
        .filter_map(|r| r.get("name").map(CellValue::display_text))
        .collect();
    assert_eq!(names, vec!["Alice", "Carol", "Alice"]);
    Ok(())
}

#[tokio::test]
async fn test_value_filter_request_is_not_read_as_row_numbers() -> Result<()> {
    let mut session = session_with("testdata/people.csv")?;
    let hash = session.active().map(|s| s.version_hash().to_owned()).expect("hash");

    let err = session
        .plan_and_apply(&RulePlanner, PlanInstruction::free_text("delete rows where age is over 65"))
        .await
        .err();
    assert!(matches!(err, Some(DataOpsError::SafetyViolation(_))));
    assert_eq!(active_version(&session), Some(1));
    assert_eq!(session.active().map(DatasetSnapshot::row_count), Some(5));
    assert_eq!(session.active().map(|s| s.version_hash().to_owned()), Some(hash));
    Ok(())
}

#[tokio::test]
async fn test_shared_session_serializes_quick_actions() -> Result<()> {
    let shared = SharedSession::new(session_with("testdata/people.csv")?);

    let tasks: Vec<_> = [
        OperationKind::Deduplicate,
        OperationKind::FillNulls,
        OperationKind::NormalizeDates,
    ]
    .into_iter()
    .map(|kind| {
        let shared = shared.clone();
        tokio::spawn(async move { shared.quick_action(kind).await })
    })
    .collect();
    for task in tasks {
        task.await.map_err(|e| DataOpsError::Other(e.to_string()))??;
    }

    let notice = shared.save().await?.expect("notice");
    assert_eq!(notice.version, 4);
    assert_eq!(notice.row_count, 4);
    Ok(())
}
