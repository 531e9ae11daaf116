//! Caseflow daemon.
//!
//! Boots the in-memory ledger, seeds the active SLA definition, and runs
//! the breach sweeper until shutdown. A durable store backend replaces
//! `MemoryLedger` here once one lands; everything above the `LedgerStore`
//! trait stays the same.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, Level};

use caseflow_core::{telemetry, SlaSweeper, SweeperConfig, TransitionEngine};
use caseflow_store::{LedgerStore, MemoryLedger, SlaDefinition, SlaDefinitionId};

#[derive(Parser)]
#[command(name = "caseflowd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Case lifecycle daemon: SLA breach sweeper", long_about = None)]
struct Cli {
    /// Seconds between sweep cycles
    #[arg(long, default_value_t = 300)]
    interval_secs: u64,

    /// Resolution budget (hours) for the seeded SLA definition
    #[arg(long, default_value_t = 72)]
    sla_hours: i64,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json_logs, Level::INFO);

    let store: Arc<MemoryLedger> = Arc::new(MemoryLedger::new());
    store
        .put_sla_definition(SlaDefinition {
            id: SlaDefinitionId::new(),
            name: "standard-resolution".to_string(),
            max_resolution_hours: cli.sla_hours,
            escalation_threshold_hours: None,
            active: true,
        })
        .await?;

    let engine = Arc::new(TransitionEngine::new(store));
    let sweeper = SlaSweeper::with_config(
        engine,
        SweeperConfig {
            interval_secs: cli.interval_secs,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_task = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    info!(
        interval_secs = cli.interval_secs,
        sla_hours = cli.sla_hours,
        "caseflowd started"
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining sweeper");
    shutdown_tx.send(true)?;
    sweeper_task.await?;
    Ok(())
}
