//! The `LedgerStore` trait — durable, queryable storage for case state.
//!
//! The trait offers point lookups, filtered scans, and one mutation
//! primitive: `commit`, an atomic multi-record write. Every update write
//! carries the version observed at read time; the whole batch fails with
//! `StoreError::VersionConflict` if any check fails, so callers get
//! optimistic concurrency with no partial state. Audit entries ride inside
//! the batch and are appended iff the batch commits — an audit entry never
//! exists without the state change it documents, or vice versa.
//!
//! An in-memory implementation lives in the `memory` module; a durable
//! backend implements the same contract.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::records::*;

/// A record paired with the store version observed at read time.
///
/// Pass the version back in the corresponding update write; the commit is
/// rejected if the record changed in between.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordWrite {
    InsertCase(Case),
    UpdateCase { case: Case, expected_version: u64 },
    InsertAssignment(Assignment),
    UpdateAssignment {
        assignment: Assignment,
        expected_version: u64,
    },
    InsertSla(SlaTracking),
    UpdateSla {
        sla: SlaTracking,
        expected_version: u64,
    },
    InsertEscalation(Escalation),
    UpdateEscalation {
        escalation: Escalation,
        expected_version: u64,
    },
    InsertClosure(Closure),
    UpsertPrediction(Prediction),
    InsertActivity(CaseActivity),
}

/// An atomic unit of work: record writes plus their matching audit entries.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub writes: Vec<RecordWrite>,
    pub audit: Vec<AuditEntry>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: RecordWrite) {
        self.writes.push(write);
    }

    pub fn audit(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.audit.is_empty()
    }
}

/// Filter for case scans.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub enterprise: Option<OrgId>,
    pub status: Option<CaseStatus>,
}

/// Filter for SLA tracking scans. `enterprise` filters through the owning
/// case.
#[derive(Debug, Clone, Default)]
pub struct SlaFilter {
    pub status: Option<SlaStatus>,
    pub enterprise: Option<OrgId>,
}

/// Durable, queryable storage for the six entity kinds plus predictions,
/// SLA definitions, and the activity log.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ---- point lookups ----

    async fn case(&self, id: &CaseId) -> StoreResult<Option<Versioned<Case>>>;

    async fn case_by_tracking(&self, tracking_number: &str)
        -> StoreResult<Option<Versioned<Case>>>;

    /// The assignment with `unassigned_at == None` for the case, if any.
    async fn active_assignment(&self, case_id: &CaseId)
        -> StoreResult<Option<Versioned<Assignment>>>;

    async fn sla_tracking(&self, id: &SlaTrackingId)
        -> StoreResult<Option<Versioned<SlaTracking>>>;

    /// The RUNNING tracking for the case, if any.
    async fn running_sla(&self, case_id: &CaseId) -> StoreResult<Option<Versioned<SlaTracking>>>;

    /// The PENDING escalation for the case, if any.
    async fn pending_escalation(&self, case_id: &CaseId)
        -> StoreResult<Option<Versioned<Escalation>>>;

    async fn closure(&self, case_id: &CaseId) -> StoreResult<Option<Closure>>;

    async fn prediction(&self, case_id: &CaseId) -> StoreResult<Option<Prediction>>;

    async fn sla_definition(&self, id: &SlaDefinitionId) -> StoreResult<Option<SlaDefinition>>;

    /// The definition flagged active, if one exists. Absence means "no SLA
    /// applied", not an error.
    async fn active_sla_definition(&self) -> StoreResult<Option<SlaDefinition>>;

    // ---- filtered scans ----

    async fn list_cases(&self, filter: CaseFilter) -> StoreResult<Vec<Case>>;

    async fn list_slas(&self, filter: SlaFilter) -> StoreResult<Vec<SlaTracking>>;

    async fn list_pending_escalations(&self, enterprise: &OrgId) -> StoreResult<Vec<Escalation>>;

    /// Total escalations ever raised for the case (any status).
    async fn escalation_count(&self, case_id: &CaseId) -> StoreResult<u32>;

    async fn list_closures(&self) -> StoreResult<Vec<Closure>>;

    /// Audit entries for one entity, in append order.
    async fn audit_entries(
        &self,
        entity: AuditEntity,
        entity_id: &str,
    ) -> StoreResult<Vec<AuditEntry>>;

    // ---- mutation ----

    /// Apply a batch atomically: every write succeeds or none do, and the
    /// audit entries are appended in the same unit of work.
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Install or replace an SLA definition (admin/seed path).
    async fn put_sla_definition(&self, definition: SlaDefinition) -> StoreResult<()>;
}
