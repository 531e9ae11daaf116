//! In-memory `LedgerStore` implementation.
//!
//! Backs the integration tests and the daemon's default configuration.
//! A single mutex guards all maps, so a `commit` is trivially atomic;
//! versions are per-record and monotonically increasing.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::records::*;
use crate::traits::*;

#[derive(Debug, Default)]
struct Inner {
    cases: HashMap<CaseId, (Case, u64)>,
    assignments: HashMap<AssignmentId, (Assignment, u64)>,
    slas: HashMap<SlaTrackingId, (SlaTracking, u64)>,
    escalations: HashMap<EscalationId, (Escalation, u64)>,
    closures: HashMap<CaseId, Closure>,
    predictions: HashMap<CaseId, Prediction>,
    definitions: HashMap<SlaDefinitionId, SlaDefinition>,
    activities: Vec<CaseActivity>,
    audit: Vec<AuditEntry>,
}

impl Inner {
    /// Reject the batch if any write would violate a version check or a
    /// uniqueness constraint. Called before any write is applied.
    fn validate(&self, batch: &WriteBatch) -> StoreResult<()> {
        for write in &batch.writes {
            match write {
                RecordWrite::InsertCase(case) => {
                    if self.cases.contains_key(&case.id) {
                        return Err(StoreError::DuplicateRecord(format!("case {}", case.id)));
                    }
                    if self
                        .cases
                        .values()
                        .any(|(c, _)| c.tracking_number == case.tracking_number)
                    {
                        return Err(StoreError::DuplicateRecord(format!(
                            "tracking number {}",
                            case.tracking_number
                        )));
                    }
                }
                RecordWrite::UpdateCase {
                    case,
                    expected_version,
                } => check_version(&self.cases, &case.id, *expected_version, "case")?,
                RecordWrite::InsertAssignment(a) => {
                    if self.assignments.contains_key(&a.id) {
                        return Err(StoreError::DuplicateRecord(format!("assignment {}", a.id)));
                    }
                }
                RecordWrite::UpdateAssignment {
                    assignment,
                    expected_version,
                } => check_version(
                    &self.assignments,
                    &assignment.id,
                    *expected_version,
                    "assignment",
                )?,
                RecordWrite::InsertSla(s) => {
                    if self.slas.contains_key(&s.id) {
                        return Err(StoreError::DuplicateRecord(format!("sla tracking {}", s.id)));
                    }
                }
                RecordWrite::UpdateSla {
                    sla,
                    expected_version,
                } => check_version(&self.slas, &sla.id, *expected_version, "sla tracking")?,
                RecordWrite::InsertEscalation(e) => {
                    if self.escalations.contains_key(&e.id) {
                        return Err(StoreError::DuplicateRecord(format!("escalation {}", e.id)));
                    }
                }
                RecordWrite::UpdateEscalation {
                    escalation,
                    expected_version,
                } => check_version(
                    &self.escalations,
                    &escalation.id,
                    *expected_version,
                    "escalation",
                )?,
                RecordWrite::InsertClosure(c) => {
                    if self.closures.contains_key(&c.case_id) {
                        return Err(StoreError::DuplicateRecord(format!(
                            "closure for case {}",
                            c.case_id
                        )));
                    }
                }
                RecordWrite::UpsertPrediction(_) | RecordWrite::InsertActivity(_) => {}
            }
        }
        Ok(())
    }

    fn apply(&mut self, batch: WriteBatch) {
        for write in batch.writes {
            match write {
                RecordWrite::InsertCase(case) => {
                    self.cases.insert(case.id, (case, 1));
                }
                RecordWrite::UpdateCase { case, .. } => {
                    let slot = self.cases.get_mut(&case.id).expect("validated");
                    *slot = (case, slot.1 + 1);
                }
                RecordWrite::InsertAssignment(a) => {
                    self.assignments.insert(a.id, (a, 1));
                }
                RecordWrite::UpdateAssignment { assignment, .. } => {
                    let slot = self.assignments.get_mut(&assignment.id).expect("validated");
                    *slot = (assignment, slot.1 + 1);
                }
                RecordWrite::InsertSla(s) => {
                    self.slas.insert(s.id, (s, 1));
                }
                RecordWrite::UpdateSla { sla, .. } => {
                    let slot = self.slas.get_mut(&sla.id).expect("validated");
                    *slot = (sla, slot.1 + 1);
                }
                RecordWrite::InsertEscalation(e) => {
                    self.escalations.insert(e.id, (e, 1));
                }
                RecordWrite::UpdateEscalation { escalation, .. } => {
                    let slot = self.escalations.get_mut(&escalation.id).expect("validated");
                    *slot = (escalation, slot.1 + 1);
                }
                RecordWrite::InsertClosure(c) => {
                    self.closures.insert(c.case_id, c);
                }
                RecordWrite::UpsertPrediction(p) => {
                    self.predictions.insert(p.case_id, p);
                }
                RecordWrite::InsertActivity(a) => {
                    self.activities.push(a);
                }
            }
        }
        self.audit.extend(batch.audit);
    }
}

fn check_version<K, V>(
    map: &HashMap<K, (V, u64)>,
    key: &K,
    expected: u64,
    what: &str,
) -> StoreResult<()>
where
    K: std::hash::Hash + Eq + std::fmt::Display,
{
    match map.get(key) {
        None => Err(StoreError::NotFound(format!("{what} {key}"))),
        Some((_, found)) if *found != expected => Err(StoreError::VersionConflict {
            record: format!("{what} {key}"),
            expected,
            found: *found,
        }),
        Some(_) => Ok(()),
    }
}

/// In-memory ledger store backed by mutex-guarded hash maps.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activity entries for a case, in append order (test/inspection hook).
    pub fn activities_for(&self, case_id: &CaseId) -> Vec<CaseActivity> {
        let inner = self.inner.lock().unwrap();
        inner
            .activities
            .iter()
            .filter(|a| a.case_id == *case_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn case(&self, id: &CaseId) -> StoreResult<Option<Versioned<Case>>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.cases.get(id).map(|(c, v)| Versioned {
            record: c.clone(),
            version: *v,
        }))
    }

    async fn case_by_tracking(
        &self,
        tracking_number: &str,
    ) -> StoreResult<Option<Versioned<Case>>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .cases
            .values()
            .find(|(c, _)| c.tracking_number == tracking_number)
            .map(|(c, v)| Versioned {
                record: c.clone(),
                version: *v,
            }))
    }

    async fn active_assignment(
        &self,
        case_id: &CaseId,
    ) -> StoreResult<Option<Versioned<Assignment>>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .assignments
            .values()
            .find(|(a, _)| a.case_id == *case_id && a.is_active())
            .map(|(a, v)| Versioned {
                record: a.clone(),
                version: *v,
            }))
    }

    async fn sla_tracking(
        &self,
        id: &SlaTrackingId,
    ) -> StoreResult<Option<Versioned<SlaTracking>>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.slas.get(id).map(|(s, v)| Versioned {
            record: s.clone(),
            version: *v,
        }))
    }

    async fn running_sla(&self, case_id: &CaseId) -> StoreResult<Option<Versioned<SlaTracking>>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .slas
            .values()
            .find(|(s, _)| s.case_id == *case_id && s.status == SlaStatus::Running)
            .map(|(s, v)| Versioned {
                record: s.clone(),
                version: *v,
            }))
    }

    async fn pending_escalation(
        &self,
        case_id: &CaseId,
    ) -> StoreResult<Option<Versioned<Escalation>>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .escalations
            .values()
            .find(|(e, _)| e.case_id == *case_id && e.status == EscalationStatus::Pending)
            .map(|(e, v)| Versioned {
                record: e.clone(),
                version: *v,
            }))
    }

    async fn closure(&self, case_id: &CaseId) -> StoreResult<Option<Closure>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.closures.get(case_id).cloned())
    }

    async fn prediction(&self, case_id: &CaseId) -> StoreResult<Option<Prediction>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.predictions.get(case_id).cloned())
    }

    async fn sla_definition(&self, id: &SlaDefinitionId) -> StoreResult<Option<SlaDefinition>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.definitions.get(id).cloned())
    }

    async fn active_sla_definition(&self) -> StoreResult<Option<SlaDefinition>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.definitions.values().find(|d| d.active).cloned())
    }

    async fn list_cases(&self, filter: CaseFilter) -> StoreResult<Vec<Case>> {
        let inner = self.inner.lock().unwrap();
        let mut cases: Vec<Case> = inner
            .cases
            .values()
            .filter(|(c, _)| {
                filter.enterprise.map_or(true, |org| c.enterprise == org)
                    && filter.status.map_or(true, |s| c.status == s)
            })
            .map(|(c, _)| c.clone())
            .collect();
        cases.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(cases)
    }

    async fn list_slas(&self, filter: SlaFilter) -> StoreResult<Vec<SlaTracking>> {
        let inner = self.inner.lock().unwrap();
        let mut slas: Vec<SlaTracking> = inner
            .slas
            .values()
            .filter(|(s, _)| {
                let status_ok = filter.status.map_or(true, |st| s.status == st);
                let org_ok = filter.enterprise.map_or(true, |org| {
                    inner
                        .cases
                        .get(&s.case_id)
                        .map_or(false, |(c, _)| c.enterprise == org)
                });
                status_ok && org_ok
            })
            .map(|(s, _)| s.clone())
            .collect();
        slas.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(slas)
    }

    async fn list_pending_escalations(&self, enterprise: &OrgId) -> StoreResult<Vec<Escalation>> {
        let inner = self.inner.lock().unwrap();
        let mut escalations: Vec<Escalation> = inner
            .escalations
            .values()
            .filter(|(e, _)| {
                e.status == EscalationStatus::Pending
                    && inner
                        .cases
                        .get(&e.case_id)
                        .map_or(false, |(c, _)| c.enterprise == *enterprise)
            })
            .map(|(e, _)| e.clone())
            .collect();
        escalations.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(escalations)
    }

    async fn escalation_count(&self, case_id: &CaseId) -> StoreResult<u32> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .escalations
            .values()
            .filter(|(e, _)| e.case_id == *case_id)
            .count() as u32)
    }

    async fn list_closures(&self) -> StoreResult<Vec<Closure>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.closures.values().cloned().collect())
    }

    async fn audit_entries(
        &self,
        entity: AuditEntity,
        entity_id: &str,
    ) -> StoreResult<Vec<AuditEntry>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .audit
            .iter()
            .filter(|e| e.entity == entity && e.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.validate(&batch)?;
        inner.apply(batch);
        Ok(())
    }

    async fn put_sla_definition(&self, definition: SlaDefinition) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.definitions.insert(definition.id, definition);
        Ok(())
    }
}
