//! The transition engine — validates and atomically applies every
//! case-status, assignment, SLA, and escalation transition.
//!
//! Each public operation is one atomic unit against the ledger store: all
//! reads validate against a consistent snapshot and the resulting write
//! batch (state changes plus their audit entries) commits indivisibly.
//! Concurrency control is optimistic: every batch updates the case row
//! with the version observed at read time, so two operations racing on the
//! same case collide at commit; the loser retries with fresh reads.
//! `Transient` failures (version conflicts, store timeouts) are retried a
//! bounded number of times with exponential backoff; every other failure
//! kind surfaces to the caller immediately.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use caseflow_store::{
    derive_aging, Assignment, AssignmentId, AuditEntity, AuditEntry, ActivityKind, Case,
    CaseActivity, CaseId, CaseStatus, Closure, Escalation, EscalationId, EscalationStatus,
    LedgerStore, OrgId, Prediction, RecordWrite, SlaTracking, SlaTrackingId, StoreResult,
    Versioned, WriteBatch,
};

use crate::actor::ActorContext;
use crate::error::{EngineError, EngineResult};
use crate::obs;
use crate::scoring;
use crate::transitions::{
    breach_sla, complete_sla, decide_escalation, end_assignment, pause_sla, CloseReason,
    RequestedStatus,
};

/// Audit metadata bound on escalation reasons.
const AUDIT_REASON_MAX_CHARS: usize = 120;

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bounded automatic retries for `Transient` failures (0 = run once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
    /// Deadline for a single store call (milliseconds); elapse is treated
    /// as a `Transient` failure.
    pub store_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 50,
            store_timeout_ms: 5_000,
        }
    }
}

/// Input for case ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDraft {
    pub tracking_number: String,
    pub customer_name: String,
    pub amount_due: f64,
    pub enterprise: OrgId,
    pub due_date: Option<NaiveDate>,
}

/// Decision applied to a pending escalation.
///
/// Rejection may carry a fallback DCA: when the prior assignment lookup
/// finds no active row, the case is re-assigned to this agency. Without a
/// fallback, that situation is a `Conflict` rather than a silently
/// fabricated assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationDecision {
    Approve,
    Reject { fallback_dca: Option<OrgId> },
}

/// Retry a `*_once` operation on `Transient` failures with exponential
/// backoff. Non-transient failures break out immediately.
macro_rules! with_retries {
    ($self:ident, $call:expr) => {{
        let mut attempt: u32 = 0;
        loop {
            match $call {
                Err(err) if err.is_transient() && attempt < $self.config.max_retries => {
                    attempt += 1;
                    let delay =
                        Duration::from_millis($self.config.backoff_base_ms * 2u64.pow(attempt - 1));
                    tokio::time::sleep(delay).await;
                }
                other => break other,
            }
        }
    }};
}

/// The core state machine over the ledger store.
pub struct TransitionEngine {
    store: Arc<dyn LedgerStore>,
    config: EngineConfig,
}

impl TransitionEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Await a store call under the configured deadline; elapse maps to
    /// `Transient`. The sweeper routes its scans through here so every
    /// store access in the crate shares one timeout discipline.
    pub(crate) async fn store_call<T>(
        &self,
        fut: impl std::future::Future<Output = StoreResult<T>>,
    ) -> EngineResult<T> {
        let deadline = Duration::from_millis(self.config.store_timeout_ms);
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::Transient(format!(
                "store call exceeded {}ms",
                self.config.store_timeout_ms
            ))),
        }
    }

    async fn read_case(&self, case_id: &CaseId) -> EngineResult<Versioned<Case>> {
        self.store_call(self.store.case(case_id))
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("case {case_id}")))
    }

    fn require_enterprise_owner(case: &Case, actor: &ActorContext) -> EngineResult<()> {
        if !actor.is_enterprise() {
            return Err(EngineError::Forbidden(
                "operation requires an enterprise actor".into(),
            ));
        }
        if case.enterprise != actor.org {
            return Err(EngineError::Forbidden(format!(
                "case {} is not owned by organization {}",
                case.id, actor.org
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Ingest
    // -----------------------------------------------------------------

    /// Create a case with status NEW, idempotent by tracking number: if a
    /// case already exists for the draft's tracking number it is returned
    /// unchanged. Triggers a score recompute for fresh cases.
    pub async fn ingest(&self, draft: CaseDraft, actor: ActorContext) -> EngineResult<Case> {
        with_retries!(self, self.ingest_once(&draft, actor).await)
    }

    async fn ingest_once(&self, draft: &CaseDraft, actor: ActorContext) -> EngineResult<Case> {
        if draft.tracking_number.trim().is_empty() {
            return Err(EngineError::InvalidArgument("tracking number is required".into()));
        }
        if draft.customer_name.trim().is_empty() {
            return Err(EngineError::InvalidArgument("customer name is required".into()));
        }
        if !(draft.amount_due > 0.0 && draft.amount_due.is_finite()) {
            return Err(EngineError::InvalidArgument(
                "amount due must be a positive number".into(),
            ));
        }

        if let Some(existing) = self
            .store_call(self.store.case_by_tracking(&draft.tracking_number))
            .await?
        {
            return Ok(existing.record);
        }

        let now = Utc::now();
        let aging = derive_aging(draft.due_date, now.date_naive());
        let case = Case {
            id: CaseId::new(),
            tracking_number: draft.tracking_number.clone(),
            customer_name: draft.customer_name.clone(),
            amount_due: draft.amount_due,
            enterprise: draft.enterprise,
            due_date: draft.due_date,
            status: CaseStatus::New,
            aging_days: aging.map(|(days, _)| days),
            aging_bucket: aging.map(|(_, bucket)| bucket),
            created_at: now,
            closed_at: None,
        };

        let mut batch = WriteBatch::new();
        batch.push(RecordWrite::InsertCase(case.clone()));
        batch.audit(
            AuditEntry::new(
                AuditEntity::Case,
                case.id.to_string(),
                "CASE_INGESTED",
                Some(actor.actor),
                now,
            )
            .with_metadata(json!({ "tracking_number": case.tracking_number })),
        );
        self.store_call(self.store.commit(batch)).await?;

        obs::emit_case_ingested(&case.id, &case.tracking_number);
        self.recompute_score_or_warn(case.id).await;
        Ok(case)
    }

    // -----------------------------------------------------------------
    // Assign
    // -----------------------------------------------------------------

    /// Hand the case off to a DCA. Starts the SLA clock against the active
    /// definition when none is running, and advances NEW cases to PENDING.
    pub async fn assign(
        &self,
        case_id: CaseId,
        dca: OrgId,
        actor: ActorContext,
    ) -> EngineResult<Assignment> {
        with_retries!(self, self.assign_once(case_id, dca, actor).await)
    }

    async fn assign_once(
        &self,
        case_id: CaseId,
        dca: OrgId,
        actor: ActorContext,
    ) -> EngineResult<Assignment> {
        let case_read = self.read_case(&case_id).await?;
        Self::require_enterprise_owner(&case_read.record, &actor)?;

        if let Some(active) = self.store_call(self.store.active_assignment(&case_id)).await? {
            return Err(EngineError::Conflict(format!(
                "case {case_id} already has an active assignment to {}",
                active.record.dca
            )));
        }

        let now = Utc::now();
        let assignment = Assignment {
            id: AssignmentId::new(),
            case_id,
            dca,
            assigned_by: actor.actor,
            assigned_at: now,
            unassigned_at: None,
        };

        let mut case = case_read.record;
        let mut batch = WriteBatch::new();
        batch.push(RecordWrite::InsertAssignment(assignment.clone()));

        if case.status == CaseStatus::New {
            case.status = CaseStatus::Pending;
            batch.audit(
                AuditEntry::new(
                    AuditEntity::Case,
                    case_id.to_string(),
                    "CASE_STATUS_CHANGED",
                    Some(actor.actor),
                    now,
                )
                .with_metadata(json!({ "from": "NEW", "to": "PENDING" })),
            );
        }
        // Always rewrite the case row: its version is the per-case
        // serialization point for concurrent operations.
        batch.push(RecordWrite::UpdateCase {
            case,
            expected_version: case_read.version,
        });

        if self.store_call(self.store.running_sla(&case_id)).await?.is_none() {
            if let Some(definition) =
                self.store_call(self.store.active_sla_definition()).await?
            {
                batch.push(RecordWrite::InsertSla(SlaTracking::start(
                    case_id,
                    definition.id,
                    now,
                )));
            }
        }

        batch.audit(
            AuditEntry::new(
                AuditEntity::Assignment,
                assignment.id.to_string(),
                "CASE_ASSIGNED",
                Some(actor.actor),
                now,
            )
            .with_metadata(json!({ "case_id": case_id.to_string(), "dca": dca.to_string() })),
        );

        self.store_call(self.store.commit(batch)).await?;
        obs::emit_case_assigned(&case_id, &dca);
        Ok(assignment)
    }

    // -----------------------------------------------------------------
    // UpdateStatus
    // -----------------------------------------------------------------

    /// Set the case status to a value from the caller's allow-list.
    ///
    /// DCA actors need an active assignment held by their agency and may
    /// request PENDING, PAID, or ESCALATE (which resolves to ESCALATED
    /// without the formal escalation workflow). Enterprise actors must own
    /// the case and may not request ESCALATE.
    pub async fn update_status(
        &self,
        case_id: CaseId,
        actor: ActorContext,
        requested: RequestedStatus,
        note: Option<String>,
    ) -> EngineResult<Case> {
        with_retries!(
            self,
            self.update_status_once(case_id, actor, requested, note.as_deref())
                .await
        )
    }

    async fn update_status_once(
        &self,
        case_id: CaseId,
        actor: ActorContext,
        requested: RequestedStatus,
        note: Option<&str>,
    ) -> EngineResult<Case> {
        let case_read = self.read_case(&case_id).await?;

        if !requested.allowed_for(actor.role) {
            return Err(EngineError::Forbidden(format!(
                "status {} is outside the allow-list for role {:?}",
                requested.as_str(),
                actor.role
            )));
        }

        if actor.is_dca() {
            let active = self.store_call(self.store.active_assignment(&case_id)).await?;
            match active {
                Some(a) if a.record.dca == actor.org => {}
                _ => {
                    return Err(EngineError::NotFound(format!(
                        "no active assignment of case {case_id} to agency {}",
                        actor.org
                    )))
                }
            }
        } else {
            Self::require_enterprise_owner(&case_read.record, &actor)?;
        }

        let now = Utc::now();
        let mut case = case_read.record;
        case.status = requested.target();

        let mut batch = WriteBatch::new();
        batch.push(RecordWrite::UpdateCase {
            case: case.clone(),
            expected_version: case_read.version,
        });
        batch.audit(
            AuditEntry::new(
                AuditEntity::Case,
                case_id.to_string(),
                "CASE_STATUS_UPDATED",
                Some(actor.actor),
                now,
            )
            .with_metadata(json!({
                "requested": requested.as_str(),
                "new_status": case.status,
                "note": note,
            })),
        );

        self.store_call(self.store.commit(batch)).await?;
        obs::emit_status_updated(&case_id, requested.as_str());
        Ok(case)
    }

    // -----------------------------------------------------------------
    // AddNote
    // -----------------------------------------------------------------

    /// Log a free-form note against the case. Human contact stops the SLA
    /// clock: any RUNNING tracking is completed in the same unit of work.
    pub async fn add_note(
        &self,
        case_id: CaseId,
        actor: ActorContext,
        text: String,
    ) -> EngineResult<()> {
        with_retries!(self, self.add_note_once(case_id, actor, &text).await)
    }

    async fn add_note_once(
        &self,
        case_id: CaseId,
        actor: ActorContext,
        text: &str,
    ) -> EngineResult<()> {
        if text.trim().is_empty() {
            return Err(EngineError::InvalidArgument("note text is required".into()));
        }
        let case_read = self.read_case(&case_id).await?;

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        batch.push(RecordWrite::InsertActivity(CaseActivity {
            case_id,
            performed_by: Some(actor.actor),
            kind: ActivityKind::Note,
            description: text.to_string(),
            created_at: now,
        }));
        self.push_sla_completion(&mut batch, &case_id, now).await?;
        batch.push(RecordWrite::UpdateCase {
            case: case_read.record,
            expected_version: case_read.version,
        });

        self.store_call(self.store.commit(batch)).await?;
        Ok(())
    }

    /// If a RUNNING tracking exists for the case, append its completion
    /// (with the matching `SLA_COMPLETED` audit entry) to the batch.
    async fn push_sla_completion(
        &self,
        batch: &mut WriteBatch,
        case_id: &CaseId,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        if let Some(sla_read) = self.store_call(self.store.running_sla(case_id)).await? {
            let mut sla = sla_read.record;
            complete_sla(&mut sla, now);
            batch.audit(
                AuditEntry::new(
                    AuditEntity::Sla,
                    sla.id.to_string(),
                    "SLA_COMPLETED",
                    None,
                    now,
                )
                .with_metadata(json!({
                    "case_id": case_id.to_string(),
                    "sla_definition_id": sla.sla_definition_id.to_string(),
                })),
            );
            batch.push(RecordWrite::UpdateSla {
                sla,
                expected_version: sla_read.version,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // RequestEscalation
    // -----------------------------------------------------------------

    /// Raise an escalation for enterprise review. Completes any RUNNING
    /// SLA tracking and recomputes the case score (escalation count is a
    /// scoring feature).
    pub async fn request_escalation(
        &self,
        case_id: CaseId,
        actor: ActorContext,
        reason: String,
    ) -> EngineResult<Escalation> {
        with_retries!(self, self.request_escalation_once(case_id, actor, &reason).await)
    }

    async fn request_escalation_once(
        &self,
        case_id: CaseId,
        actor: ActorContext,
        reason: &str,
    ) -> EngineResult<Escalation> {
        if reason.trim().is_empty() {
            return Err(EngineError::InvalidArgument(
                "escalation reason is required".into(),
            ));
        }
        let case_read = self.read_case(&case_id).await?;

        if !actor.is_dca() {
            return Err(EngineError::Forbidden(
                "only a DCA actor may request escalation".into(),
            ));
        }
        match self.store_call(self.store.active_assignment(&case_id)).await? {
            Some(a) if a.record.dca == actor.org => {}
            _ => {
                return Err(EngineError::Forbidden(format!(
                    "agency {} holds no active assignment of case {case_id}",
                    actor.org
                )))
            }
        }
        if self
            .store_call(self.store.pending_escalation(&case_id))
            .await?
            .is_some()
        {
            return Err(EngineError::Conflict(format!(
                "an escalation is already pending for case {case_id}"
            )));
        }

        let now = Utc::now();
        let escalation = Escalation {
            id: EscalationId::new(),
            case_id,
            requested_by: actor.actor,
            reason: reason.to_string(),
            status: EscalationStatus::Pending,
            requested_at: now,
            decided_by: None,
            decided_at: None,
        };

        let mut batch = WriteBatch::new();
        batch.push(RecordWrite::InsertEscalation(escalation.clone()));
        batch.push(RecordWrite::InsertActivity(CaseActivity {
            case_id,
            performed_by: Some(actor.actor),
            kind: ActivityKind::StatusUpdate,
            description: format!("Escalation requested: {reason}"),
            created_at: now,
        }));
        self.push_sla_completion(&mut batch, &case_id, now).await?;
        batch.push(RecordWrite::UpdateCase {
            case: case_read.record,
            expected_version: case_read.version,
        });
        batch.audit(
            AuditEntry::new(
                AuditEntity::Escalation,
                escalation.id.to_string(),
                "ESCALATION_REQUESTED",
                Some(actor.actor),
                now,
            )
            .with_metadata(json!({
                "case_id": case_id.to_string(),
                "reason": truncate_chars(reason, AUDIT_REASON_MAX_CHARS),
            })),
        );

        self.store_call(self.store.commit(batch)).await?;
        obs::emit_escalation_requested(&case_id, &escalation.id);
        self.recompute_score_or_warn(case_id).await;
        Ok(escalation)
    }

    // -----------------------------------------------------------------
    // DecideEscalation
    // -----------------------------------------------------------------

    /// Resolve the pending escalation for a case.
    ///
    /// Approval hands the case back to the enterprise: the case becomes
    /// ESCALATED, the active assignment is closed, and any RUNNING SLA
    /// tracking is completed. Rejection returns the case to the DCA flow:
    /// status back to PENDING (unless closed), an active assignment is
    /// ensured, and a fresh SLA clock is started when none is running.
    pub async fn decide_escalation(
        &self,
        case_id: CaseId,
        actor: ActorContext,
        decision: EscalationDecision,
    ) -> EngineResult<Escalation> {
        with_retries!(self, self.decide_escalation_once(case_id, actor, decision).await)
    }

    async fn decide_escalation_once(
        &self,
        case_id: CaseId,
        actor: ActorContext,
        decision: EscalationDecision,
    ) -> EngineResult<Escalation> {
        let case_read = self.read_case(&case_id).await?;
        Self::require_enterprise_owner(&case_read.record, &actor)?;

        let escalation_read = self
            .store_call(self.store.pending_escalation(&case_id))
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("no pending escalation for case {case_id}"))
            })?;

        let now = Utc::now();
        let approve = matches!(decision, EscalationDecision::Approve);
        let mut escalation = escalation_read.record;
        decide_escalation(&mut escalation, approve, actor.actor, now);

        let mut case = case_read.record;
        let mut batch = WriteBatch::new();
        batch.push(RecordWrite::UpdateEscalation {
            escalation: escalation.clone(),
            expected_version: escalation_read.version,
        });

        if approve {
            case.status = CaseStatus::Escalated;
            if let Some(assignment_read) =
                self.store_call(self.store.active_assignment(&case_id)).await?
            {
                let mut assignment = assignment_read.record;
                end_assignment(&mut assignment, now);
                batch.push(RecordWrite::UpdateAssignment {
                    assignment,
                    expected_version: assignment_read.version,
                });
            }
            if let Some(sla_read) = self.store_call(self.store.running_sla(&case_id)).await? {
                let mut sla = sla_read.record;
                complete_sla(&mut sla, now);
                batch.push(RecordWrite::UpdateSla {
                    sla,
                    expected_version: sla_read.version,
                });
            }
            batch.audit(
                AuditEntry::new(
                    AuditEntity::Escalation,
                    escalation.id.to_string(),
                    "ESCALATION_APPROVED",
                    Some(actor.actor),
                    now,
                )
                .with_metadata(json!({ "case_id": case_id.to_string() })),
            );
        } else {
            if case.status != CaseStatus::Closed {
                case.status = CaseStatus::Pending;
            }
            let fallback_dca = match decision {
                EscalationDecision::Reject { fallback_dca } => fallback_dca,
                EscalationDecision::Approve => None,
            };
            let active = self.store_call(self.store.active_assignment(&case_id)).await?;
            if active.is_none() {
                let Some(dca) = fallback_dca else {
                    return Err(EngineError::Conflict(format!(
                        "case {case_id} has no active assignment and no fallback DCA was supplied"
                    )));
                };
                batch.push(RecordWrite::InsertAssignment(Assignment {
                    id: AssignmentId::new(),
                    case_id,
                    dca,
                    assigned_by: actor.actor,
                    assigned_at: now,
                    unassigned_at: None,
                }));
            }
            if case.status != CaseStatus::Closed
                && self.store_call(self.store.running_sla(&case_id)).await?.is_none()
            {
                if let Some(definition) =
                    self.store_call(self.store.active_sla_definition()).await?
                {
                    batch.push(RecordWrite::InsertSla(SlaTracking::start(
                        case_id,
                        definition.id,
                        now,
                    )));
                }
            }
            batch.audit(
                AuditEntry::new(
                    AuditEntity::Escalation,
                    escalation.id.to_string(),
                    "ESCALATION_REJECTED",
                    Some(actor.actor),
                    now,
                )
                .with_metadata(json!({ "case_id": case_id.to_string() })),
            );
        }

        batch.push(RecordWrite::UpdateCase {
            case,
            expected_version: case_read.version,
        });

        self.store_call(self.store.commit(batch)).await?;
        obs::emit_escalation_decided(&case_id, approve);
        Ok(escalation)
    }

    // -----------------------------------------------------------------
    // Close
    // -----------------------------------------------------------------

    /// Close the case with a business outcome, or flag it DISPUTED.
    ///
    /// A dispute pauses the SLA clock and records no closure; any other
    /// reason writes the single Closure row, stamps `closed_at`, and
    /// completes the clock. The audit action label is the reason itself.
    pub async fn close(
        &self,
        case_id: CaseId,
        actor: ActorContext,
        reason: CloseReason,
        recovered_amount: f64,
    ) -> EngineResult<Case> {
        with_retries!(self, self.close_once(case_id, actor, reason, recovered_amount).await)
    }

    async fn close_once(
        &self,
        case_id: CaseId,
        actor: ActorContext,
        reason: CloseReason,
        recovered_amount: f64,
    ) -> EngineResult<Case> {
        let case_read = self.read_case(&case_id).await?;
        Self::require_enterprise_owner(&case_read.record, &actor)?;

        if case_read.record.status == CaseStatus::Closed {
            return Err(EngineError::Conflict(format!("case {case_id} is already closed")));
        }
        if !(recovered_amount >= 0.0 && recovered_amount.is_finite()) {
            return Err(EngineError::InvalidArgument(
                "recovered amount must be a non-negative number".into(),
            ));
        }

        let now = Utc::now();
        let mut case = case_read.record;
        let mut batch = WriteBatch::new();

        if reason.is_dispute() {
            case.status = CaseStatus::Disputed;
            if let Some(sla_read) = self.store_call(self.store.running_sla(&case_id)).await? {
                let mut sla = sla_read.record;
                pause_sla(&mut sla, now);
                batch.push(RecordWrite::UpdateSla {
                    sla,
                    expected_version: sla_read.version,
                });
            }
            batch.audit(AuditEntry::new(
                AuditEntity::Case,
                case_id.to_string(),
                reason.as_str(),
                Some(actor.actor),
                now,
            ));
        } else {
            if self.store_call(self.store.closure(&case_id)).await?.is_some() {
                return Err(EngineError::Conflict(format!(
                    "a closure already exists for case {case_id}"
                )));
            }
            batch.push(RecordWrite::InsertClosure(Closure {
                case_id,
                recovered_amount,
                reason: reason.as_str().to_string(),
                closed_by: actor.actor,
                closed_at: now,
            }));
            case.status = CaseStatus::Closed;
            case.closed_at = Some(now);
            if let Some(sla_read) = self.store_call(self.store.running_sla(&case_id)).await? {
                let mut sla = sla_read.record;
                complete_sla(&mut sla, now);
                batch.push(RecordWrite::UpdateSla {
                    sla,
                    expected_version: sla_read.version,
                });
            }
            batch.audit(
                AuditEntry::new(
                    AuditEntity::Case,
                    case_id.to_string(),
                    reason.as_str(),
                    Some(actor.actor),
                    now,
                )
                .with_metadata(json!({ "recovered_amount": recovered_amount })),
            );
        }

        batch.push(RecordWrite::UpdateCase {
            case: case.clone(),
            expected_version: case_read.version,
        });

        self.store_call(self.store.commit(batch)).await?;
        obs::emit_case_closed(&case_id, reason.as_str());
        if !reason.is_dispute() {
            self.recompute_score_or_warn(case_id).await;
        }
        Ok(case)
    }

    // -----------------------------------------------------------------
    // RecomputeScore
    // -----------------------------------------------------------------

    /// Recompute the recovery-probability and priority scores for a case
    /// and replace its prediction row.
    pub async fn recompute_score(&self, case_id: CaseId) -> EngineResult<Prediction> {
        with_retries!(self, self.recompute_score_once(case_id).await)
    }

    async fn recompute_score_once(&self, case_id: CaseId) -> EngineResult<Prediction> {
        let case = self.read_case(&case_id).await?.record;
        let escalations = self.store_call(self.store.escalation_count(&case_id)).await?;

        let mut ratios = Vec::new();
        for closure in self.store_call(self.store.list_closures()).await? {
            if let Some(closed_case) = self.store_call(self.store.case(&closure.case_id)).await? {
                if closed_case.record.amount_due > 0.0 {
                    ratios.push(closure.recovered_amount / closed_case.record.amount_due);
                }
            }
        }

        let features =
            scoring::build_features(case.aging_bucket, escalations, &ratios, case.amount_due);
        let probability = scoring::recovery_probability(&features);
        let priority = scoring::priority_score(case.aging_bucket, case.amount_due, probability);

        let now = Utc::now();
        let prediction = Prediction {
            case_id,
            recovery_probability: probability,
            priority_score: priority,
            model_version: scoring::MODEL_VERSION.to_string(),
            computed_at: now,
        };

        let mut batch = WriteBatch::new();
        batch.push(RecordWrite::UpsertPrediction(prediction.clone()));
        batch.audit(
            AuditEntry::new(
                AuditEntity::Prediction,
                case_id.to_string(),
                "PREDICTION_UPDATED",
                None,
                now,
            )
            .with_metadata(json!({
                "recovery_probability": probability,
                "priority_score": priority,
                "model_version": scoring::MODEL_VERSION,
            })),
        );
        self.store_call(self.store.commit(batch)).await?;
        Ok(prediction)
    }

    /// Score recomputation requested as a side effect of another
    /// operation: the primary commit has already succeeded, so a failure
    /// here is logged and swallowed.
    async fn recompute_score_or_warn(&self, case_id: CaseId) {
        if let Err(err) = self.recompute_score(case_id).await {
            warn!(case_id = %case_id, error = %err, "score recompute failed");
        }
    }

    // -----------------------------------------------------------------
    // SLA breach (sweeper entry point)
    // -----------------------------------------------------------------

    /// Mark a tracking BREACHED. Returns `Ok(false)` without writing when
    /// the tracking is no longer RUNNING, which makes repeated sweeps
    /// idempotent: no double transition, no duplicate audit entry.
    pub async fn mark_sla_breached(&self, tracking_id: SlaTrackingId) -> EngineResult<bool> {
        with_retries!(self, self.mark_sla_breached_once(tracking_id).await)
    }

    async fn mark_sla_breached_once(&self, tracking_id: SlaTrackingId) -> EngineResult<bool> {
        let sla_read = self
            .store_call(self.store.sla_tracking(&tracking_id))
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("sla tracking {tracking_id}")))?;

        let now = Utc::now();
        let mut sla = sla_read.record;
        if !breach_sla(&mut sla, now) {
            return Ok(false);
        }

        let max_hours = self
            .store_call(self.store.sla_definition(&sla.sla_definition_id))
            .await?
            .map(|d| d.max_resolution_hours);

        let mut batch = WriteBatch::new();
        batch.audit(
            AuditEntry::new(
                AuditEntity::Sla,
                sla.id.to_string(),
                "SLA_BREACHED",
                None,
                now,
            )
            .with_metadata(json!({
                "case_id": sla.case_id.to_string(),
                "sla_definition_id": sla.sla_definition_id.to_string(),
                "max_resolution_hours": max_hours,
            })),
        );
        let case_id = sla.case_id;
        batch.push(RecordWrite::UpdateSla {
            sla,
            expected_version: sla_read.version,
        });

        self.store_call(self.store.commit(batch)).await?;
        obs::emit_sla_breached(&tracking_id, &case_id);
        Ok(true)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
