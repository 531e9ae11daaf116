//! Caseflow ledger store — persistence layer for case lifecycle state.
//!
//! This crate defines the record types for the six durable entity kinds
//! (Case, Assignment, SlaTracking, Escalation, Closure, AuditEntry), the
//! backend-agnostic [`LedgerStore`] trait, and an in-memory implementation.
//!
//! ## Consistency contract
//!
//! - Reads return [`Versioned`] snapshots; updates carry the observed
//!   version and the whole [`WriteBatch`] commits or fails as one unit.
//! - Audit entries travel inside the batch, so state changes and their
//!   audit trail are always committed together.
//! - The audit log and the assignment/escalation/closure histories are
//!   append-only; nothing is ever physically deleted.

mod error;
pub mod memory;
mod records;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryLedger;
pub use records::{
    derive_aging, ActivityKind, ActorId, AgingBucket, Assignment, AssignmentId, AuditEntity,
    AuditEntry, Case, CaseActivity, CaseId, CaseStatus, Closure, Escalation, EscalationId,
    EscalationStatus, OrgId, Prediction, SlaDefinition, SlaDefinitionId, SlaStatus, SlaTracking,
    SlaTrackingId,
};
pub use traits::{CaseFilter, LedgerStore, RecordWrite, SlaFilter, Versioned, WriteBatch};
