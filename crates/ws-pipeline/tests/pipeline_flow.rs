// pipeline_flow.rs — End-to-end lifecycle from inbound signal to won pursuit.
//
// Walks one deal through the whole pipeline:
//
//   1. Ingest a signal and create a candidate from it
//   2. Triage and promote the candidate (pursuit appears in qual)
//   3. Add a "reference check" item required for pink
//   4. Advance to pink → ChecklistIncomplete naming the item
//   5. Complete the item → advance succeeds
//   6. Walk red → submit → won
//
// VERIFY:
//   - The signal ends candidate_created, the candidate promoted
//   - The event log holds one line per mutation in order
//   - A rejected advance writes nothing

use std::fs;

use chrono::{Duration, Utc};
use tempfile::tempdir;

use ws_pipeline::{
    CandidateStatus, ChecklistUpdate, ContactInfo, LogSink, NewCandidate, Pipeline,
    PipelineError, PipelineStore, PromotionRequest, PursuitStage, Signal, SignalSource,
    SignalStatus, ValueBand, WorkEvent,
};

#[test]
fn signal_to_won_with_checklist_gate() {
    let store_dir = tempdir().unwrap();
    let log_dir = tempdir().unwrap();
    let log_path = log_dir.path().join("events.jsonl");

    let mut pipeline = Pipeline::open(store_dir.path()).unwrap();
    pipeline
        .dispatcher_mut()
        .add_sink(Box::new(LogSink::new(&log_path)));

    // ── Signal → candidate ────────────────────────────────────────
    let signal = pipeline
        .ingest_signal(Signal::new(
            "org-1",
            SignalSource::Referral,
            "Partner intro: ACME needs a data platform",
            0.9,
        ))
        .unwrap();
    let candidate = pipeline
        .create_candidate_from_signal(
            signal.signal_id,
            NewCandidate {
                title: "ACME data platform".into(),
                value_band: ValueBand::Large,
                contact: ContactInfo {
                    name: Some("Dana".into()),
                    email: Some("dana@acme.test".into()),
                    phone: None,
                },
                confidence: 70,
            },
        )
        .unwrap();

    pipeline
        .transition_candidate(
            candidate.candidate_id,
            CandidateStatus::Triaged,
            Some("qualified on call".into()),
        )
        .unwrap();

    // ── Promotion ─────────────────────────────────────────────────
    let (candidate, pursuit) = pipeline
        .promote_candidate(
            candidate.candidate_id,
            PromotionRequest {
                title: "ACME data platform".into(),
                forecast_value: 400_000.0,
                due_date: Utc::now() + Duration::days(45),
                win_probability: None,
                checklist_required: true,
            },
        )
        .unwrap();
    assert_eq!(pursuit.stage, PursuitStage::Qual);
    assert_eq!(pursuit.win_probability, 70);
    assert_eq!(candidate.status, CandidateStatus::Promoted);

    // ── Gate ──────────────────────────────────────────────────────
    let item = pipeline
        .add_checklist_item(pursuit.pursuit_id, "reference check", PursuitStage::Pink)
        .unwrap();

    let before = fs::read_to_string(&log_path).unwrap().lines().count();
    let err = pipeline
        .advance_pursuit(pursuit.pursuit_id, PursuitStage::Pink, None)
        .unwrap_err();
    match err {
        PipelineError::ChecklistIncomplete { stage, missing, .. } => {
            assert_eq!(stage, PursuitStage::Pink);
            assert_eq!(missing, vec!["reference check".to_string()]);
        }
        other => panic!("expected ChecklistIncomplete, got {other}"),
    }
    let after = fs::read_to_string(&log_path).unwrap().lines().count();
    assert_eq!(before, after, "rejected advance must not emit events");

    let report = pipeline
        .gate_report(pursuit.pursuit_id, PursuitStage::Pink)
        .unwrap();
    assert!(!report.satisfied);

    pipeline
        .update_checklist(
            pursuit.pursuit_id,
            &[ChecklistUpdate {
                item_id: item.item_id,
                completed: true,
                completed_by: Some("dana".into()),
            }],
        )
        .unwrap();

    let pink = pipeline
        .advance_pursuit(pursuit.pursuit_id, PursuitStage::Pink, None)
        .unwrap();
    assert_eq!(pink.stage, PursuitStage::Pink);

    // ── Through to won ────────────────────────────────────────────
    pipeline
        .advance_pursuit(pursuit.pursuit_id, PursuitStage::Red, None)
        .unwrap();
    pipeline
        .submit_pursuit(pursuit.pursuit_id, Some(420_000.0), None)
        .unwrap();
    let won = pipeline
        .mark_won(pursuit.pursuit_id, Some(415_000.0), Some("signed".into()))
        .unwrap();
    assert_eq!(won.stage, PursuitStage::Won);
    assert_eq!(won.forecast_value, 420_000.0);

    // ── Persisted state, reopened from disk ───────────────────────
    let store = PipelineStore::open(store_dir.path()).unwrap();
    assert_eq!(
        store.signals.require(signal.signal_id).unwrap().status,
        SignalStatus::CandidateCreated
    );
    assert_eq!(
        store
            .candidates
            .require(candidate.candidate_id)
            .unwrap()
            .pursuit_id,
        Some(pursuit.pursuit_id)
    );
    assert_eq!(
        store.pursuits.require(pursuit.pursuit_id).unwrap().stage,
        PursuitStage::Won
    );

    // ── Event log ─────────────────────────────────────────────────
    let events: Vec<WorkEvent> = fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let names: Vec<&str> = events.iter().map(|e| e.event_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "signal_ingested",
            "candidate_created",
            "signal_status_changed",
            "candidate_status_changed",
            "candidate_status_changed",
            "candidate_promoted",
            "checklist_item_updated",
            "pursuit_stage_changed",
            "pursuit_stage_changed",
            "pursuit_stage_changed",
            "pursuit_stage_changed",
        ]
    );
    assert!(events.iter().all(|e| e.org_id == "org-1"));
}
