//! Integration tests for the escalation workflow: request, approve,
//! reject (with and without a fallback agency), and the direct
//! ESCALATE status path.

use std::sync::Arc;

use chrono::Utc;

use caseflow_core::{
    ActorContext, CaseDraft, EngineError, EscalationDecision, RequestedStatus, Role,
    TransitionEngine,
};
use caseflow_store::{
    ActorId, AuditEntity, Case, CaseStatus, EscalationStatus, LedgerStore, MemoryLedger, OrgId,
    RecordWrite, SlaDefinition, SlaDefinitionId, SlaStatus, SlaTracking, WriteBatch,
};

fn setup() -> (Arc<MemoryLedger>, TransitionEngine, ActorContext, ActorContext) {
    let store = Arc::new(MemoryLedger::new());
    let engine = TransitionEngine::new(store.clone());
    let enterprise = ActorContext::new(ActorId::new(), Role::Enterprise, OrgId::new());
    let agency = ActorContext::new(ActorId::new(), Role::Dca, OrgId::new());
    (store, engine, enterprise, agency)
}

async fn seed_definition(store: &MemoryLedger) {
    store
        .put_sla_definition(SlaDefinition {
            id: SlaDefinitionId::new(),
            name: "standard-resolution".to_string(),
            max_resolution_hours: 72,
            escalation_threshold_hours: Some(48),
            active: true,
        })
        .await
        .unwrap();
}

/// Ingest and assign a case so the DCA holds an active assignment.
async fn assigned_case(
    engine: &TransitionEngine,
    enterprise: ActorContext,
    agency: ActorContext,
) -> Case {
    let case = engine
        .ingest(
            CaseDraft {
                tracking_number: format!("ESC-{}", uuid::Uuid::new_v4()),
                customer_name: "Borealis Logistics AB".to_string(),
                amount_due: 80_000.0,
                enterprise: enterprise.org,
                due_date: Some(Utc::now().date_naive() - chrono::Duration::days(95)),
            },
            enterprise,
        )
        .await
        .unwrap();
    engine.assign(case.id, agency.org, enterprise).await.unwrap();
    case
}

// ── Request ──

#[tokio::test]
async fn request_creates_pending_escalation_and_stops_sla() {
    let (store, engine, enterprise, agency) = setup();
    seed_definition(&store).await;
    let case = assigned_case(&engine, enterprise, agency).await;
    let sla = store.running_sla(&case.id).await.unwrap().unwrap().record;

    let escalation = engine
        .request_escalation(case.id, agency, "customer unreachable for 30 days".into())
        .await
        .unwrap();
    assert_eq!(escalation.status, EscalationStatus::Pending);
    assert_eq!(escalation.requested_by, agency.actor);

    let sla = store.sla_tracking(&sla.id).await.unwrap().unwrap().record;
    assert_eq!(sla.status, SlaStatus::Completed);

    let audits = store
        .audit_entries(AuditEntity::Escalation, &escalation.id.to_string())
        .await
        .unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].action, "ESCALATION_REQUESTED");

    assert_eq!(store.activities_for(&case.id).len(), 1);
    assert_eq!(store.escalation_count(&case.id).await.unwrap(), 1);
}

#[tokio::test]
async fn request_requires_the_assigned_agency() {
    let (_, engine, enterprise, agency) = setup();
    let case = assigned_case(&engine, enterprise, agency).await;

    let err = engine
        .request_escalation(case.id, enterprise, "not my call".into())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let other_agency = ActorContext::new(ActorId::new(), Role::Dca, OrgId::new());
    let err = engine
        .request_escalation(case.id, other_agency, "wrong agency".into())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn second_pending_request_conflicts_and_changes_nothing() {
    let (store, engine, enterprise, agency) = setup();
    let case = assigned_case(&engine, enterprise, agency).await;

    engine
        .request_escalation(case.id, agency, "first".into())
        .await
        .unwrap();

    // Put a fresh clock on the case so the conflicting request has both a
    // pending escalation and a RUNNING tracking it could corrupt.
    let mut batch = WriteBatch::new();
    batch.push(RecordWrite::InsertSla(SlaTracking::start(
        case.id,
        SlaDefinitionId::new(),
        Utc::now(),
    )));
    store.commit(batch).await.unwrap();

    let escalation_before = store.pending_escalation(&case.id).await.unwrap().unwrap();
    let sla_before = store.running_sla(&case.id).await.unwrap().unwrap();

    let err = engine
        .request_escalation(case.id, agency, "second".into())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    // The rejected request left both records byte-for-byte intact.
    let escalation_after = store.pending_escalation(&case.id).await.unwrap().unwrap();
    assert_eq!(escalation_after.record, escalation_before.record);
    assert_eq!(escalation_after.version, escalation_before.version);
    let sla_after = store.running_sla(&case.id).await.unwrap().unwrap();
    assert_eq!(sla_after.record, sla_before.record);
    assert_eq!(sla_after.version, sla_before.version);
    assert_eq!(sla_after.record.status, SlaStatus::Running);
}

#[tokio::test]
async fn blank_reason_is_rejected() {
    let (_, engine, enterprise, agency) = setup();
    let case = assigned_case(&engine, enterprise, agency).await;

    let err = engine
        .request_escalation(case.id, agency, "  ".into())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}

// ── Approve ──

#[tokio::test]
async fn approval_escalates_case_and_ends_assignment() {
    let (store, engine, enterprise, agency) = setup();
    seed_definition(&store).await;
    let case = assigned_case(&engine, enterprise, agency).await;
    engine
        .request_escalation(case.id, agency, "legal action needed".into())
        .await
        .unwrap();

    let escalation = engine
        .decide_escalation(case.id, enterprise, EscalationDecision::Approve)
        .await
        .unwrap();
    assert_eq!(escalation.status, EscalationStatus::Approved);
    assert_eq!(escalation.decided_by, Some(enterprise.actor));
    assert!(escalation.decided_at.is_some());

    let case = store.case(&case.id).await.unwrap().unwrap().record;
    assert_eq!(case.status, CaseStatus::Escalated);
    assert!(store.active_assignment(&case.id).await.unwrap().is_none());
    assert!(store.running_sla(&case.id).await.unwrap().is_none());

    let audits = store
        .audit_entries(AuditEntity::Escalation, &escalation.id.to_string())
        .await
        .unwrap();
    assert_eq!(audits.last().unwrap().action, "ESCALATION_APPROVED");
}

#[tokio::test]
async fn decision_requires_owning_enterprise_and_pending_escalation() {
    let (_, engine, enterprise, agency) = setup();
    let case = assigned_case(&engine, enterprise, agency).await;

    let err = engine
        .decide_escalation(case.id, agency, EscalationDecision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = engine
        .decide_escalation(case.id, enterprise, EscalationDecision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

// ── Reject ──

#[tokio::test]
async fn rejection_returns_case_to_agency_flow() {
    let (store, engine, enterprise, agency) = setup();
    seed_definition(&store).await;
    let case = assigned_case(&engine, enterprise, agency).await;
    engine
        .request_escalation(case.id, agency, "needs review".into())
        .await
        .unwrap();

    let escalation = engine
        .decide_escalation(
            case.id,
            enterprise,
            EscalationDecision::Reject { fallback_dca: None },
        )
        .await
        .unwrap();
    assert_eq!(escalation.status, EscalationStatus::Rejected);

    let case_record = store.case(&case.id).await.unwrap().unwrap().record;
    assert_eq!(case_record.status, CaseStatus::Pending);

    // The original assignment survives and a fresh SLA clock is running
    // (the request completed the previous one).
    let assignment = store.active_assignment(&case.id).await.unwrap().unwrap().record;
    assert_eq!(assignment.dca, agency.org);
    let sla = store.running_sla(&case.id).await.unwrap().unwrap().record;
    assert_eq!(sla.status, SlaStatus::Running);

    let audits = store
        .audit_entries(AuditEntity::Escalation, &escalation.id.to_string())
        .await
        .unwrap();
    assert_eq!(audits.last().unwrap().action, "ESCALATION_REJECTED");
}

/// End the active assignment out-of-band, leaving the pending escalation
/// orphaned from any agency.
async fn end_active_assignment(store: &MemoryLedger, case: &Case) {
    let assignment = store.active_assignment(&case.id).await.unwrap().unwrap();
    let mut record = assignment.record;
    record.unassigned_at = Some(Utc::now());
    let mut batch = WriteBatch::new();
    batch.push(RecordWrite::UpdateAssignment {
        assignment: record,
        expected_version: assignment.version,
    });
    store.commit(batch).await.unwrap();
}

#[tokio::test]
async fn rejection_without_assignment_requires_fallback_dca() {
    let (store, engine, enterprise, agency) = setup();
    let case = assigned_case(&engine, enterprise, agency).await;
    engine
        .request_escalation(case.id, agency, "orphaned".into())
        .await
        .unwrap();
    end_active_assignment(&store, &case).await;

    let err = engine
        .decide_escalation(
            case.id,
            enterprise,
            EscalationDecision::Reject { fallback_dca: None },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    // The failed decision changed nothing: the escalation is still pending.
    let pending = store.pending_escalation(&case.id).await.unwrap();
    assert!(pending.is_some());

    let fallback = OrgId::new();
    engine
        .decide_escalation(
            case.id,
            enterprise,
            EscalationDecision::Reject {
                fallback_dca: Some(fallback),
            },
        )
        .await
        .unwrap();
    let assignment = store.active_assignment(&case.id).await.unwrap().unwrap().record;
    assert_eq!(assignment.dca, fallback);
    assert_eq!(assignment.assigned_by, enterprise.actor);
}

// ── Direct status path ──

#[tokio::test]
async fn dca_may_escalate_directly_through_status_update() {
    let (store, engine, enterprise, agency) = setup();
    let case = assigned_case(&engine, enterprise, agency).await;

    let updated = engine
        .update_status(case.id, agency, RequestedStatus::Escalate, None)
        .await
        .unwrap();
    assert_eq!(updated.status, CaseStatus::Escalated);

    // The shortcut bypasses the formal workflow: no escalation record.
    assert!(store.pending_escalation(&case.id).await.unwrap().is_none());
    assert_eq!(store.escalation_count(&case.id).await.unwrap(), 0);
}
