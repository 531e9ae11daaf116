//! Background SLA breach detection.
//!
//! The sweeper periodically scans RUNNING trackings, compares each against
//! its definition's resolution deadline, and drives the engine's breach
//! transition for the overdue ones. Detection is best effort and isolated
//! per tracking: one failure is logged and skipped, never aborting the
//! cycle; the tracking stays RUNNING and is picked up again next time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;

use caseflow_store::{LedgerStore, SlaFilter, SlaStatus};

use crate::engine::TransitionEngine;
use crate::error::EngineResult;
use crate::obs;

/// Sweeper tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between sweep cycles.
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// RUNNING trackings examined.
    pub checked: usize,
    /// Trackings transitioned to BREACHED this cycle.
    pub breached: usize,
    /// Trackings skipped after a lookup or transition failure.
    pub failed: usize,
}

/// Periodic breach detector over the engine's ledger.
pub struct SlaSweeper {
    engine: Arc<TransitionEngine>,
    config: SweeperConfig,
}

impl SlaSweeper {
    pub fn new(engine: Arc<TransitionEngine>) -> Self {
        Self::with_config(engine, SweeperConfig::default())
    }

    pub fn with_config(engine: Arc<TransitionEngine>, config: SweeperConfig) -> Self {
        Self { engine, config }
    }

    /// Run one sweep cycle against the clock value `now`.
    ///
    /// Only the initial RUNNING scan can fail the call; everything after is
    /// per-tracking and folded into the report.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        let running = self
            .engine
            .store_call(self.engine.store().list_slas(SlaFilter {
                status: Some(SlaStatus::Running),
                enterprise: None,
            }))
            .await?;

        let mut report = SweepReport {
            checked: running.len(),
            ..SweepReport::default()
        };

        for tracking in running {
            let definition = match self
                .engine
                .store_call(self.engine.store().sla_definition(&tracking.sla_definition_id))
                .await
            {
                Ok(Some(definition)) => definition,
                Ok(None) => {
                    warn!(
                        tracking_id = %tracking.id,
                        sla_definition_id = %tracking.sla_definition_id,
                        "sla definition missing, skipping tracking"
                    );
                    report.failed += 1;
                    continue;
                }
                Err(err) => {
                    warn!(tracking_id = %tracking.id, error = %err, "definition lookup failed");
                    report.failed += 1;
                    continue;
                }
            };

            // Breach only once the deadline has actually passed.
            if now <= tracking.deadline(definition.max_resolution_hours) {
                continue;
            }

            match self.engine.mark_sla_breached(tracking.id).await {
                Ok(true) => report.breached += 1,
                // Lost a race with a completing or breaching writer; the
                // tracking is no longer RUNNING and needs nothing from us.
                Ok(false) => {}
                Err(err) => {
                    warn!(tracking_id = %tracking.id, error = %err, "breach transition failed");
                    report.failed += 1;
                }
            }
        }

        obs::emit_sweep_completed(report.checked, report.breached, report.failed);
        Ok(report)
    }

    /// Sweep on the configured interval until `shutdown` flips to `true`.
    ///
    /// Cancellation stops issuing new cycles but never interrupts an
    /// in-flight `sweep_once`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.sweep_once(Utc::now()).await {
                        warn!(error = %err, "sweep cycle failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }
}
