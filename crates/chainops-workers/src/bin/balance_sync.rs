//! One or more instances; horizontally scaled by the general lease on
//! `WalletBalance` rows (§4.6, §5 "Horizontal scaling").

use std::time::Instant;

use chainops_common::model::ExecutionOutcome;
use chainops_datastore::postgres::PgDatastore;
use chainops_worker::WorkerRuntime;
use chainops_workers::balance_sync;
use chainops_workers::config::Config;
use chainops_workers::registry::ChainRegistry;
use clap::Parser;
use log::{info, warn};

const BATCH_SIZE: i64 = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.init_logging();

    let ds = PgDatastore::connect(&config.datastore_url, config.datastore_max_connections).await?;
    let registry = ChainRegistry::load(&ds).await?;

    let runtime = WorkerRuntime::new("balance_sync", None, None);
    runtime.install_signal_handlers();
    info!("balance-sync starting as {}", runtime.worker_id());

    while !runtime.is_shutting_down() {
        let started = Instant::now();
        let gate = runtime.gate(&ds).await?;

        if gate.may_run() {
            match balance_sync::run_cycle(&ds, &registry, runtime.worker_id(), BATCH_SIZE).await {
                Ok(summary) => {
                    let status = if summary.errors == 0 { ExecutionOutcome::Success } else { ExecutionOutcome::Fail };
                    runtime
                        .record(
                            &ds,
                            "balance_sync",
                            started,
                            status,
                            (summary.errors > 0).then(|| format!("{} sync errors", summary.errors)),
                            None,
                        )
                        .await?;
                }
                Err(e) => {
                    warn!("balance-sync cycle failed: {e}");
                    runtime.record(&ds, "balance_sync", started, ExecutionOutcome::Fail, Some(e.to_string()), None).await?;
                }
            }
        }

        runtime.heartbeat(&ds).await?;
        tokio::time::sleep(config.scan_interval()).await;
    }

    runtime.shutdown(&ds).await?;
    Ok(())
}
