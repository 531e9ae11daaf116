//! Structured observability hooks for case lifecycle events.
//!
//! Thin emission functions over `tracing::info!` so the field names for
//! each lifecycle event stay consistent across the engine and the sweeper.

use tracing::info;

use caseflow_store::{CaseId, EscalationId, OrgId, SlaTrackingId};

/// Emit event: case ingested into the ledger.
pub fn emit_case_ingested(case_id: &CaseId, tracking_number: &str) {
    info!(event = "case.ingested", case_id = %case_id, tracking_number = %tracking_number);
}

/// Emit event: case handed off to a collection agency.
pub fn emit_case_assigned(case_id: &CaseId, dca: &OrgId) {
    info!(event = "case.assigned", case_id = %case_id, dca = %dca);
}

/// Emit event: case status updated through the allow-list path.
pub fn emit_status_updated(case_id: &CaseId, requested: &str) {
    info!(event = "case.status_updated", case_id = %case_id, requested = %requested);
}

/// Emit event: escalation raised for enterprise review.
pub fn emit_escalation_requested(case_id: &CaseId, escalation_id: &EscalationId) {
    info!(event = "escalation.requested", case_id = %case_id, escalation_id = %escalation_id);
}

/// Emit event: pending escalation resolved.
pub fn emit_escalation_decided(case_id: &CaseId, approved: bool) {
    info!(event = "escalation.decided", case_id = %case_id, approved = approved);
}

/// Emit event: case closed or disputed, tagged with the outcome label.
pub fn emit_case_closed(case_id: &CaseId, reason: &str) {
    info!(event = "case.closed", case_id = %case_id, reason = %reason);
}

/// Emit event: an SLA tracking crossed its resolution deadline.
pub fn emit_sla_breached(tracking_id: &SlaTrackingId, case_id: &CaseId) {
    info!(event = "sla.breached", tracking_id = %tracking_id, case_id = %case_id);
}

/// Emit event: one sweeper cycle finished.
pub fn emit_sweep_completed(checked: usize, breached: usize, failed: usize) {
    info!(
        event = "sweep.completed",
        checked = checked,
        breached = breached,
        failed = failed,
    );
}
