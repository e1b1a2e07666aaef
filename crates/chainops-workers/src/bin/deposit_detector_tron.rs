//! One instance per Tron chain (§4.4, §2 "detectors (2 x N chains)").

use std::time::Instant;

use chainops_common::model::ExecutionOutcome;
use chainops_datastore::postgres::PgDatastore;
use chainops_worker::WorkerRuntime;
use chainops_workers::config::Config;
use chainops_workers::registry::ChainRegistry;
use chainops_workers::{detector, error::CycleError};
use clap::Parser;
use log::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.init_logging();

    let ds = PgDatastore::connect(&config.datastore_url, config.datastore_max_connections).await?;
    let registry = ChainRegistry::load(&ds).await?;

    let chain_name = config.required_chain_name()?;
    let chain = registry
        .find_by_name(chain_name)
        .ok_or_else(|| anyhow::anyhow!("chain '{chain_name}' is not active"))?
        .clone();
    let adapter = registry
        .adapter(chain.id)
        .ok_or_else(|| anyhow::anyhow!("no adapter loaded for chain '{chain_name}'"))?
        .clone();

    let runtime = WorkerRuntime::new("deposit_detector", Some(chain_name), Some(chain.id));
    runtime.install_signal_handlers();
    info!("deposit-detector-tron starting as {}", runtime.worker_id());

    while !runtime.is_shutting_down() {
        let started = Instant::now();
        let gate = runtime.gate(&ds).await?;

        if gate.may_run() {
            let result: Result<_, CycleError> =
                detector::run_cycle(&ds, adapter.as_ref(), &chain, config.batch_block_size).await;
            match result {
                Ok(Some(summary)) => {
                    runtime
                        .record(
                            &ds,
                            "deposit_detector",
                            started,
                            ExecutionOutcome::Success,
                            None,
                            serde_json::to_value(&format!("{summary:?}")).ok(),
                        )
                        .await?;
                }
                Ok(None) => {
                    runtime
                        .record(&ds, "deposit_detector", started, ExecutionOutcome::Skip, None, None)
                        .await?;
                }
                Err(e) => {
                    warn!("deposit-detector-tron cycle failed: {e}");
                    runtime
                        .record(&ds, "deposit_detector", started, ExecutionOutcome::Fail, Some(e.to_string()), None)
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
