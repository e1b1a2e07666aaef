//! One instance total; walks the confirming rows of every active chain's
//! withdrawal queue each cycle (§4.11).

use std::time::Instant;

use chainops_common::model::ExecutionOutcome;
use chainops_datastore::postgres::PgDatastore;
use chainops_worker::WorkerRuntime;
use chainops_workers::confirmation;
use chainops_workers::config::Config;
use chainops_workers::registry::ChainRegistry;
use clap::Parser;
use log::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.init_logging();

    let ds = PgDatastore::connect(&config.datastore_url, config.datastore_max_connections).await?;
    let registry = ChainRegistry::load(&ds).await?;

    let runtime = WorkerRuntime::new("withdrawal_confirmation", None, None);
    runtime.install_signal_handlers();
    info!("withdrawal-confirmation starting as {}", runtime.worker_id());

    while !runtime.is_shutting_down() {
        let started = Instant::now();
        let gate = runtime.gate(&ds).await?;

        if gate.may_run() {
            match confirmation::run_withdrawal_cycle(&ds, &registry).await {
                Ok(summary) => {
                    let status = if summary.errors.is_empty() { ExecutionOutcome::Success } else { ExecutionOutcome::Fail };
                    let error = (!summary.errors.is_empty()).then(|| summary.errors.join("; "));
                    runtime.record(&ds, "withdrawal_confirmation", started, status, error, None).await?;
                }
                Err(e) => {
                    warn!("withdrawal-confirmation cycle failed: {e}");
                    runtime
                        .record(&ds, "withdrawal_confirmation", started, ExecutionOutcome::Fail, Some(e.to_string()), None)
                        .await?;
                }
            }
        }

        runtime.heartbeat(&ds).await?;
        tokio::time::sleep(config.scan_interval()).await;
    }

    runtime.shutdown(&ds).await?;
    Ok(())
}
