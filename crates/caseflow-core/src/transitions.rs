//! Pure per-record transition helpers.
//!
//! Each helper mutates one record in place and keeps its status and
//! resolution timestamps mutually consistent. The engine composes these
//! into atomic write batches; keeping them pure makes the individual
//! transitions testable without a store.

use chrono::{DateTime, Utc};

use caseflow_store::{Assignment, CaseStatus, Escalation, EscalationStatus, SlaTracking, SlaStatus};
use caseflow_store::ActorId;

use crate::actor::Role;

/// Stop a RUNNING clock as resolved. Returns `false` (and leaves the
/// record untouched) if the tracking was not RUNNING.
pub fn complete_sla(sla: &mut SlaTracking, now: DateTime<Utc>) -> bool {
    if sla.status != SlaStatus::Running {
        return false;
    }
    sla.status = SlaStatus::Completed;
    sla.completed_at = Some(now);
    true
}

/// Pause a RUNNING clock (dispute path). Returns `false` if not RUNNING.
pub fn pause_sla(sla: &mut SlaTracking, now: DateTime<Utc>) -> bool {
    if sla.status != SlaStatus::Running {
        return false;
    }
    sla.status = SlaStatus::Paused;
    sla.paused_at = Some(now);
    true
}

/// Mark a RUNNING clock breached. Returns `false` if not RUNNING, making
/// repeated breach sweeps idempotent.
pub fn breach_sla(sla: &mut SlaTracking, now: DateTime<Utc>) -> bool {
    if sla.status != SlaStatus::Running {
        return false;
    }
    sla.status = SlaStatus::Breached;
    sla.breached_at = Some(now);
    true
}

/// End an active assignment. Returns `false` if already ended.
pub fn end_assignment(assignment: &mut Assignment, now: DateTime<Utc>) -> bool {
    if assignment.unassigned_at.is_some() {
        return false;
    }
    assignment.unassigned_at = Some(now);
    true
}

/// Resolve a PENDING escalation exactly once.
pub fn decide_escalation(
    escalation: &mut Escalation,
    approve: bool,
    decider: ActorId,
    now: DateTime<Utc>,
) {
    escalation.status = if approve {
        EscalationStatus::Approved
    } else {
        EscalationStatus::Rejected
    };
    escalation.decided_by = Some(decider);
    escalation.decided_at = Some(now);
}

/// A status value a caller may request through `update_status`.
///
/// `Escalate` is a request verb, not a stored status: it maps to
/// `CaseStatus::Escalated` without going through the formal escalation
/// workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestedStatus {
    Pending,
    Paid,
    Escalate,
}

impl RequestedStatus {
    /// Whether the given role may request this status.
    pub fn allowed_for(&self, role: Role) -> bool {
        match role {
            Role::Dca => true,
            Role::Enterprise => !matches!(self, Self::Escalate),
        }
    }

    /// The case status this request resolves to.
    pub fn target(&self) -> CaseStatus {
        match self {
            Self::Pending => CaseStatus::Pending,
            Self::Paid => CaseStatus::Paid,
            Self::Escalate => CaseStatus::Escalated,
        }
    }

    /// Canonical label for audit metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Escalate => "ESCALATE",
        }
    }
}

/// Reason a case is closed. The audit action label is the canonical name,
/// tagging the entry with the business outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    /// Full amount recovered.
    Recovered,
    /// Settled for a negotiated amount.
    Settled,
    /// Written off as uncollectible.
    WrittenOff,
    /// Customer disputes the debt; pauses rather than closes.
    Dispute,
}

impl CloseReason {
    pub fn is_dispute(&self) -> bool {
        matches!(self, Self::Dispute)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recovered => "RECOVERED",
            Self::Settled => "SETTLED",
            Self::WrittenOff => "WRITTEN_OFF",
            Self::Dispute => "DISPUTE",
        }
    }
}
