//! Caseflow Core Library
//!
//! The transition engine, SLA sweeper, scoring model, and read-side
//! queries for the debt-recovery case lifecycle.

pub mod actor;
pub mod engine;
pub mod error;
pub mod obs;
pub mod query;
pub mod scoring;
pub mod sweeper;
pub mod telemetry;
pub mod transitions;

pub use actor::{ActorContext, Role};
pub use engine::{CaseDraft, EngineConfig, EscalationDecision, TransitionEngine};
pub use error::{EngineError, EngineResult};
pub use query::{CaseQueries, CaseSummary, Overview, SlaStatusRow};
pub use scoring::{CaseFeatures, MODEL_VERSION};
pub use sweeper::{SlaSweeper, SweepReport, SweeperConfig};
pub use transitions::{CloseReason, RequestedStatus};

pub use caseflow_store::{LedgerStore, MemoryLedger};
