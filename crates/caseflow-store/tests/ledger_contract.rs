//! Contract tests for the `LedgerStore` trait, run against `MemoryLedger`.
//!
//! Any durable backend must satisfy the same assertions: versioned
//! compare-and-swap, all-or-nothing batches, audit entries committing with
//! their state changes, and the uniqueness constraints.

use chrono::Utc;
use caseflow_store::{
    Assignment, AssignmentId, AuditEntity, AuditEntry, Case, CaseFilter, CaseId, CaseStatus,
    Escalation, EscalationId, EscalationStatus, LedgerStore, MemoryLedger, OrgId, RecordWrite,
    SlaDefinitionId, SlaStatus, SlaTracking, StoreError, WriteBatch, ActorId, Closure,
};

fn sample_case(enterprise: OrgId, tracking: &str) -> Case {
    Case {
        id: CaseId::new(),
        tracking_number: tracking.to_string(),
        customer_name: "Globex".into(),
        amount_due: 12_500.0,
        enterprise,
        due_date: None,
        status: CaseStatus::New,
        aging_days: None,
        aging_bucket: None,
        created_at: Utc::now(),
        closed_at: None,
    }
}

fn insert_case(case: Case) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.push(RecordWrite::InsertCase(case));
    batch
}

#[tokio::test]
async fn point_lookup_by_id_and_tracking_number() {
    let store = MemoryLedger::new();
    let case = sample_case(OrgId::new(), "TRK-100");
    let id = case.id;
    store.commit(insert_case(case)).await.unwrap();

    let by_id = store.case(&id).await.unwrap().unwrap();
    assert_eq!(by_id.record.tracking_number, "TRK-100");
    assert_eq!(by_id.version, 1);

    let by_tracking = store.case_by_tracking("TRK-100").await.unwrap().unwrap();
    assert_eq!(by_tracking.record.id, id);

    assert!(store.case_by_tracking("TRK-999").await.unwrap().is_none());
}

#[tokio::test]
async fn stale_version_is_rejected() {
    let store = MemoryLedger::new();
    let case = sample_case(OrgId::new(), "TRK-101");
    let id = case.id;
    store.commit(insert_case(case)).await.unwrap();

    let read = store.case(&id).await.unwrap().unwrap();
    let mut updated = read.record.clone();
    updated.status = CaseStatus::Pending;

    let mut batch = WriteBatch::new();
    batch.push(RecordWrite::UpdateCase {
        case: updated.clone(),
        expected_version: read.version,
    });
    store.commit(batch).await.unwrap();

    // Replaying the same expected_version must now conflict.
    let mut stale = WriteBatch::new();
    stale.push(RecordWrite::UpdateCase {
        case: updated,
        expected_version: read.version,
    });
    let err = store.commit(stale).await.unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { .. }));

    let current = store.case(&id).await.unwrap().unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(current.record.status, CaseStatus::Pending);
}

#[tokio::test]
async fn failed_batch_applies_nothing() {
    let store = MemoryLedger::new();
    let case = sample_case(OrgId::new(), "TRK-102");
    let id = case.id;
    store.commit(insert_case(case.clone())).await.unwrap();

    // One valid SLA insert plus one stale case update in the same batch.
    let sla = SlaTracking::start(id, SlaDefinitionId::new(), Utc::now());
    let sla_id = sla.id;
    let mut batch = WriteBatch::new();
    batch.push(RecordWrite::InsertSla(sla));
    batch.push(RecordWrite::UpdateCase {
        case,
        expected_version: 99,
    });
    batch.audit(AuditEntry::new(
        AuditEntity::Case,
        id.to_string(),
        "SHOULD_NOT_APPEAR",
        None,
        Utc::now(),
    ));

    assert!(store.commit(batch).await.is_err());

    // Neither the SLA row nor the audit entry may exist.
    assert!(store.sla_tracking(&sla_id).await.unwrap().is_none());
    let audit = store
        .audit_entries(AuditEntity::Case, &id.to_string())
        .await
        .unwrap();
    assert!(audit.is_empty());
}

#[tokio::test]
async fn audit_entries_commit_with_their_batch() {
    let store = MemoryLedger::new();
    let case = sample_case(OrgId::new(), "TRK-103");
    let id = case.id;

    let mut batch = insert_case(case);
    batch.audit(AuditEntry::new(
        AuditEntity::Case,
        id.to_string(),
        "CASE_INGESTED",
        None,
        Utc::now(),
    ));
    store.commit(batch).await.unwrap();

    let audit = store
        .audit_entries(AuditEntity::Case, &id.to_string())
        .await
        .unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, "CASE_INGESTED");
}

#[tokio::test]
async fn duplicate_tracking_number_is_rejected() {
    let store = MemoryLedger::new();
    let org = OrgId::new();
    store
        .commit(insert_case(sample_case(org, "TRK-104")))
        .await
        .unwrap();

    let err = store
        .commit(insert_case(sample_case(org, "TRK-104")))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateRecord(_)));
}

#[tokio::test]
async fn at_most_one_closure_per_case() {
    let store = MemoryLedger::new();
    let case = sample_case(OrgId::new(), "TRK-105");
    let id = case.id;
    store.commit(insert_case(case)).await.unwrap();

    let closure = Closure {
        case_id: id,
        recovered_amount: 8_000.0,
        reason: "RECOVERED".into(),
        closed_by: ActorId::new(),
        closed_at: Utc::now(),
    };
    let mut batch = WriteBatch::new();
    batch.push(RecordWrite::InsertClosure(closure.clone()));
    store.commit(batch).await.unwrap();

    let mut again = WriteBatch::new();
    again.push(RecordWrite::InsertClosure(closure));
    let err = store.commit(again).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateRecord(_)));
}

#[tokio::test]
async fn filtered_scans() {
    let store = MemoryLedger::new();
    let org_a = OrgId::new();
    let org_b = OrgId::new();

    let mut case_a = sample_case(org_a, "TRK-200");
    case_a.status = CaseStatus::Pending;
    let case_a_id = case_a.id;
    let case_b = sample_case(org_b, "TRK-201");
    store.commit(insert_case(case_a)).await.unwrap();
    store.commit(insert_case(case_b)).await.unwrap();

    let for_a = store
        .list_cases(CaseFilter {
            enterprise: Some(org_a),
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(for_a.len(), 1);
    assert_eq!(for_a[0].id, case_a_id);

    let pending = store
        .list_cases(CaseFilter {
            enterprise: None,
            status: Some(CaseStatus::Pending),
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);

    let all = store.list_cases(CaseFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn singleton_lookups_see_only_live_rows() {
    let store = MemoryLedger::new();
    let case = sample_case(OrgId::new(), "TRK-300");
    let id = case.id;
    store.commit(insert_case(case)).await.unwrap();

    let assignment = Assignment {
        id: AssignmentId::new(),
        case_id: id,
        dca: OrgId::new(),
        assigned_by: ActorId::new(),
        assigned_at: Utc::now(),
        unassigned_at: None,
    };
    let escalation = Escalation {
        id: EscalationId::new(),
        case_id: id,
        requested_by: ActorId::new(),
        reason: "no contact".into(),
        status: EscalationStatus::Pending,
        requested_at: Utc::now(),
        decided_by: None,
        decided_at: None,
    };
    let mut batch = WriteBatch::new();
    batch.push(RecordWrite::InsertAssignment(assignment.clone()));
    batch.push(RecordWrite::InsertEscalation(escalation.clone()));
    store.commit(batch).await.unwrap();

    assert!(store.active_assignment(&id).await.unwrap().is_some());
    assert!(store.pending_escalation(&id).await.unwrap().is_some());
    assert_eq!(store.escalation_count(&id).await.unwrap(), 1);

    // End the assignment and decide the escalation; the singleton lookups
    // must come back empty while history remains countable.
    let a_read = store.active_assignment(&id).await.unwrap().unwrap();
    let mut ended = a_read.record.clone();
    ended.unassigned_at = Some(Utc::now());
    let e_read = store.pending_escalation(&id).await.unwrap().unwrap();
    let mut decided = e_read.record.clone();
    decided.status = EscalationStatus::Rejected;

    let mut batch = WriteBatch::new();
    batch.push(RecordWrite::UpdateAssignment {
        assignment: ended,
        expected_version: a_read.version,
    });
    batch.push(RecordWrite::UpdateEscalation {
        escalation: decided,
        expected_version: e_read.version,
    });
    store.commit(batch).await.unwrap();

    assert!(store.active_assignment(&id).await.unwrap().is_none());
    assert!(store.pending_escalation(&id).await.unwrap().is_none());
    assert_eq!(store.escalation_count(&id).await.unwrap(), 1);
}

#[tokio::test]
async fn running_sla_filter_tracks_status() {
    let store = MemoryLedger::new();
    let case = sample_case(OrgId::new(), "TRK-400");
    let id = case.id;
    store.commit(insert_case(case)).await.unwrap();

    let sla = SlaTracking::start(id, SlaDefinitionId::new(), Utc::now());
    let mut batch = WriteBatch::new();
    batch.push(RecordWrite::InsertSla(sla));
    store.commit(batch).await.unwrap();

    let running = store.running_sla(&id).await.unwrap().unwrap();
    assert_eq!(running.record.status, SlaStatus::Running);

    let mut completed = running.record.clone();
    completed.status = SlaStatus::Completed;
    completed.completed_at = Some(Utc::now());
    let mut batch = WriteBatch::new();
    batch.push(RecordWrite::UpdateSla {
        sla: completed,
        expected_version: running.version,
    });
    store.commit(batch).await.unwrap();

    assert!(store.running_sla(&id).await.unwrap().is_none());
}
