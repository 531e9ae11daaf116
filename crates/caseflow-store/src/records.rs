//! Record types persisted by the ledger store.
//!
//! Six durable entity kinds (Case, Assignment, SlaTracking, Escalation,
//! Closure, AuditEntry) plus the active SLA definition, the per-case
//! prediction, and the free-form activity log. Statuses are closed
//! enumerations; any legacy external input must be normalised by the
//! adapter layer before it reaches this crate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed opaque identifier newtype.
macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a debt-recovery case.
    CaseId
);
entity_id!(
    /// Identifier of a single case hand-off to a DCA.
    AssignmentId
);
entity_id!(
    /// Identifier of one SLA clock attached to a case.
    SlaTrackingId
);
entity_id!(
    /// Identifier of an SLA definition (the resolution-hour rule set).
    SlaDefinitionId
);
entity_id!(
    /// Identifier of an escalation request.
    EscalationId
);
entity_id!(
    /// Identifier of a human or system actor.
    ActorId
);
entity_id!(
    /// Identifier of an organization (enterprise or DCA).
    OrgId
);

// ---------------------------------------------------------------------------
// Case
// ---------------------------------------------------------------------------

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    New,
    Pending,
    Paid,
    Escalated,
    Disputed,
    Closed,
}

impl CaseStatus {
    /// Whether the case is still actively worked (counted as in-progress).
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::New | Self::Pending)
    }
}

/// Coarse classification of how overdue a case is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgingBucket {
    #[serde(rename = "0-30")]
    Days0To30,
    #[serde(rename = "31-60")]
    Days31To60,
    #[serde(rename = "61-90")]
    Days61To90,
    #[serde(rename = "90+")]
    Days90Plus,
}

impl AgingBucket {
    /// Classify a number of days past due.
    pub fn from_days(days: i64) -> Self {
        if days <= 30 {
            Self::Days0To30
        } else if days <= 60 {
            Self::Days31To60
        } else if days <= 90 {
            Self::Days61To90
        } else {
            Self::Days90Plus
        }
    }

    /// Canonical label, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days0To30 => "0-30",
            Self::Days31To60 => "31-60",
            Self::Days61To90 => "61-90",
            Self::Days90Plus => "90+",
        }
    }
}

/// Derive `(aging_days, bucket)` from a due date. `None` when no due date
/// is known. Days may be negative for not-yet-due cases; those land in the
/// lowest bucket.
pub fn derive_aging(due_date: Option<NaiveDate>, today: NaiveDate) -> Option<(i64, AgingBucket)> {
    let due = due_date?;
    let days = (today - due).num_days();
    Some((days, AgingBucket::from_days(days)))
}

/// A unit of debt owed by a customer, tracked from ingestion through closure.
///
/// Exactly one case exists per tracking number. Cases are created by bulk
/// ingestion, mutated only by the transition engine, and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    /// Externally supplied unique reference for the debt.
    pub tracking_number: String,
    pub customer_name: String,
    /// Outstanding amount; always positive.
    pub amount_due: f64,
    /// Enterprise organization that owns the case.
    pub enterprise: OrgId,
    pub due_date: Option<NaiveDate>,
    pub status: CaseStatus,
    pub aging_days: Option<i64>,
    pub aging_bucket: Option<AgingBucket>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// A hand-off of a case to a DCA for recovery work.
///
/// At most one assignment per case has `unassigned_at == None` (the active
/// assignment). History rows are retained, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub case_id: CaseId,
    /// The collection agency the case is handed to.
    pub dca: OrgId,
    pub assigned_by: ActorId,
    pub assigned_at: DateTime<Utc>,
    pub unassigned_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.unassigned_at.is_none()
    }
}

// ---------------------------------------------------------------------------
// SLA
// ---------------------------------------------------------------------------

/// Status of an SLA clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaStatus {
    Running,
    Breached,
    Completed,
    Paused,
}

/// The rule set an SLA clock runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaDefinition {
    pub id: SlaDefinitionId,
    pub name: String,
    /// Hours allowed from clock start to resolution before a breach.
    pub max_resolution_hours: i64,
    pub escalation_threshold_hours: Option<i64>,
    /// Only the definition flagged active is applied to new trackings.
    pub active: bool,
}

/// The running clock measuring elapsed time against a resolution deadline.
///
/// At most one tracking per case is RUNNING at any time. The resolution
/// timestamps are mutually exclusive: exactly the one matching the terminal
/// status is set, and none while RUNNING.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaTracking {
    pub id: SlaTrackingId,
    pub case_id: CaseId,
    pub sla_definition_id: SlaDefinitionId,
    pub status: SlaStatus,
    pub started_at: DateTime<Utc>,
    pub breached_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
}

impl SlaTracking {
    /// Start a fresh RUNNING clock for a case.
    pub fn start(case_id: CaseId, definition: SlaDefinitionId, now: DateTime<Utc>) -> Self {
        Self {
            id: SlaTrackingId::new(),
            case_id,
            sla_definition_id: definition,
            status: SlaStatus::Running,
            started_at: now,
            breached_at: None,
            completed_at: None,
            paused_at: None,
        }
    }

    /// The instant after which a still-running clock counts as breached.
    pub fn deadline(&self, max_resolution_hours: i64) -> DateTime<Utc> {
        self.started_at + chrono::Duration::hours(max_resolution_hours)
    }
}

// ---------------------------------------------------------------------------
// Escalation
// ---------------------------------------------------------------------------

/// Status of an escalation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationStatus {
    Pending,
    Approved,
    Rejected,
}

/// A DCA-initiated request to return a case to enterprise handling.
///
/// At most one escalation per case is PENDING; each escalation is resolved
/// exactly once and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: EscalationId,
    pub case_id: CaseId,
    pub requested_by: ActorId,
    pub reason: String,
    pub status: EscalationStatus,
    pub requested_at: DateTime<Utc>,
    pub decided_by: Option<ActorId>,
    pub decided_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Closure
// ---------------------------------------------------------------------------

/// Terminal non-dispute closure of a case. At most one per case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    pub case_id: CaseId,
    pub recovered_amount: f64,
    /// Canonical closure reason label (business-outcome tagged).
    pub reason: String,
    pub closed_by: ActorId,
    pub closed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// Deterministic scoring output, one row per case, replaced on recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub case_id: CaseId,
    /// Estimated probability of recovering the debt, in `[0, 1]`.
    pub recovery_probability: f64,
    /// Work-ordering priority, in `[0, 1]`.
    pub priority_score: f64,
    pub model_version: String,
    pub computed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Audit
// ---------------------------------------------------------------------------

/// Entity kind an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEntity {
    Case,
    Assignment,
    Sla,
    Escalation,
    Closure,
    Prediction,
}

/// An immutable record of one state-changing action.
///
/// Append-only: entries are never mutated or deleted. `performed_by` is
/// `None` for system-triggered actions such as breach detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entity: AuditEntity,
    pub entity_id: String,
    pub action: String,
    pub performed_by: Option<ActorId>,
    pub performed_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl AuditEntry {
    /// Build an entry with empty metadata.
    pub fn new(
        entity: AuditEntity,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        performed_by: Option<ActorId>,
        performed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity,
            entity_id: entity_id.into(),
            action: action.into(),
            performed_by,
            performed_at,
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach structured metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// ---------------------------------------------------------------------------
// Activity log
// ---------------------------------------------------------------------------

/// Kind of a case activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    StatusUpdate,
    Note,
    Call,
    Email,
    Visit,
}

/// Free-form activity logged against a case (notes, contact attempts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseActivity {
    pub case_id: CaseId,
    pub performed_by: Option<ActorId>,
    pub kind: ActivityKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
