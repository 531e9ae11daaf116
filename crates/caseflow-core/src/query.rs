//! Read-only query surface over the ledger.
//!
//! Joins the per-entity stores into the shapes an API or reporting layer
//! consumes. Queries never mutate and never retry; transient store
//! failures surface to the caller as-is.

use std::sync::Arc;

use serde::Serialize;

use caseflow_store::{
    Case, CaseFilter, CaseId, CaseStatus, Closure, Escalation, LedgerStore, OrgId, Prediction,
    SlaFilter, SlaTracking,
};

use crate::error::{EngineError, EngineResult};

/// A case joined with its prediction and closure, when present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseSummary {
    pub case: Case,
    pub prediction: Option<Prediction>,
    pub closure: Option<Closure>,
}

/// Portfolio counts for one enterprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Overview {
    pub total: usize,
    pub in_progress: usize,
    pub escalated: usize,
    pub closed: usize,
}

/// An SLA tracking joined with its definition's name and deadline budget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaStatusRow {
    pub tracking: SlaTracking,
    pub definition_name: Option<String>,
    pub max_resolution_hours: Option<i64>,
}

/// Read-side companion to the transition engine.
pub struct CaseQueries {
    store: Arc<dyn LedgerStore>,
}

impl CaseQueries {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Every case owned by the enterprise, joined with prediction and
    /// closure.
    pub async fn list_cases(&self, enterprise: OrgId) -> EngineResult<Vec<CaseSummary>> {
        let cases = self
            .store
            .list_cases(CaseFilter {
                enterprise: Some(enterprise),
                status: None,
            })
            .await?;

        let mut summaries = Vec::with_capacity(cases.len());
        for case in cases {
            summaries.push(self.summarize(case).await?);
        }
        Ok(summaries)
    }

    /// One case with its prediction and closure.
    pub async fn case_detail(&self, case_id: CaseId) -> EngineResult<CaseSummary> {
        let case = self
            .store
            .case(&case_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("case {case_id}")))?
            .record;
        self.summarize(case).await
    }

    /// Portfolio counts by lifecycle stage.
    pub async fn overview(&self, enterprise: OrgId) -> EngineResult<Overview> {
        let cases = self
            .store
            .list_cases(CaseFilter {
                enterprise: Some(enterprise),
                status: None,
            })
            .await?;

        let mut overview = Overview {
            total: cases.len(),
            ..Overview::default()
        };
        for case in &cases {
            match case.status {
                status if status.is_in_progress() => overview.in_progress += 1,
                CaseStatus::Escalated => overview.escalated += 1,
                CaseStatus::Closed => overview.closed += 1,
                _ => {}
            }
        }
        Ok(overview)
    }

    /// SLA trackings for the enterprise's cases, joined with the governing
    /// definition. A missing definition yields `None` fields rather than
    /// an error: the tracking is still worth reporting.
    pub async fn sla_status(&self, enterprise: OrgId) -> EngineResult<Vec<SlaStatusRow>> {
        let trackings = self
            .store
            .list_slas(SlaFilter {
                status: None,
                enterprise: Some(enterprise),
            })
            .await?;

        let mut rows = Vec::with_capacity(trackings.len());
        for tracking in trackings {
            let definition = self.store.sla_definition(&tracking.sla_definition_id).await?;
            rows.push(SlaStatusRow {
                definition_name: definition.as_ref().map(|d| d.name.clone()),
                max_resolution_hours: definition.map(|d| d.max_resolution_hours),
                tracking,
            });
        }
        Ok(rows)
    }

    /// Escalations awaiting an enterprise decision.
    pub async fn pending_escalations(&self, enterprise: OrgId) -> EngineResult<Vec<Escalation>> {
        Ok(self.store.list_pending_escalations(&enterprise).await?)
    }

    async fn summarize(&self, case: Case) -> EngineResult<CaseSummary> {
        let prediction = self.store.prediction(&case.id).await?;
        let closure = self.store.closure(&case.id).await?;
        Ok(CaseSummary {
            case,
            prediction,
            closure,
        })
    }
}
