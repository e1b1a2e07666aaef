//! One instance per Tron chain (§4.8, §4.9, §2 "execution workers (3 x N chains)").

use std::time::Instant;

use chainops_common::model::ExecutionOutcome;
use chainops_datastore::postgres::PgDatastore;
use chainops_signer::SignerClient;
use chainops_worker::WorkerRuntime;
use chainops_workers::config::Config;
use chainops_workers::execution::consolidation;
use chainops_workers::registry::ChainRegistry;
use clap::Parser;
use log::{info, warn};

const BATCH_SIZE: i64 = 25;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.init_logging();

    let ds = PgDatastore::connect(&config.datastore_url, config.datastore_max_connections).await?;
    let registry = ChainRegistry::load(&ds).await?;
    let signer = SignerClient::new(&config.signer_base_url, &config.signer_api_key);

    let chain_name = config.required_chain_name()?;
    let chain = registry
        .find_by_name(chain_name)
        .ok_or_else(|| anyhow::anyhow!("chain '{chain_name}' is not active"))?
        .clone();

    let runtime = WorkerRuntime::new("consolidation_executor", Some(chain_name), Some(chain.id));
    runtime.install_signal_handlers();
    info!("consolidation-executor-tron starting as {}", runtime.worker_id());

    while !runtime.is_shutting_down() {
        let started = Instant::now();
        let gate = runtime.gate(&ds).await?;

        if gate.may_run() {
            match consolidation::run_tron_cycle(&ds, &signer, &chain, runtime.worker_id(), BATCH_SIZE).await {
                Ok(summary) => {
                    let status = if summary.failed == 0 { ExecutionOutcome::Success } else { ExecutionOutcome::Fail };
                    runtime
                        .record(
                            &ds,
                            "consolidation_executor",
                            started,
                            status,
                            None,
                            serde_json::to_value(&format!("{summary:?}")).ok(),
                        )
                        .await?;
                }
                Err(e) => {
                    warn!("consolidation-executor-tron cycle failed: {e}");
                    runtime
                        .record(&ds, "consolidation_executor", started, ExecutionOutcome::Fail, Some(e.to_string()), None)
                        .await?;
                }
            }
        } else {
            runtime.record(&ds, "consolidation_executor", started, ExecutionOutcome::Skip, None, None).await?;
        }

        runtime.heartbeat(&ds).await?;
        tokio::time::sleep(config.scan_interval()).await;
    }

    runtime.shutdown(&ds).await?;
    Ok(())
}
