//! Gas-topup execution cycle (§4.8, §4.9, §4.10): tops a user wallet's
//! native-asset balance up from an operation wallet so a later consolidation
//! can afford its own gas. Always a native-asset transfer — a gas-topup job
//! never moves a token.

use chainops_common::model::Chain;
use chainops_datastore::{Datastore, GasTopupQueueProvider};
use chainops_signer::{SignerClient, TronIntent};
use chrono::Duration;
use log::warn;
use uuid::Uuid;

use crate::error::CycleError;
use crate::execution::common::{
    broadcast_tron_intent, classify_failure, send_evm_transaction, EvmSendParams, ExecutionFailure,
    FailureAction, NATIVE_TRANSFER_GAS_LIMIT,
};

const LEASE_TTL_SECONDS: i64 = 120;

#[derive(Debug, Default)]
pub struct GasTopupSummary {
    pub picked: u64,
    pub broadcast: u64,
    pub retried: u64,
    pub failed: u64,
    pub lease_busy: u64,
}

pub async fn run_tron_cycle(
    ds: &dyn Datastore,
    signer: &SignerClient,
    chain: &Chain,
    worker_id: &str,
    batch_size: i64,
) -> Result<GasTopupSummary, CycleError> {
    let mut summary = GasTopupSummary::default();
    let candidates = GasTopupQueueProvider::pick_candidates(ds, chain.id, batch_size).await?;
    summary.picked = candidates.len() as u64;

    for job in candidates {
        if job.status != chainops_common::model::ExecutionStatus::Pending {
            continue;
        }
        let job_id = job.id;
        GasTopupQueueProvider::mark_processing(ds, job_id).await?;

        if !ds
            .try_acquire_gas_lease(job.wallet_balance_id, worker_id, Duration::seconds(LEASE_TTL_SECONDS))
            .await?
        {
            summary.lease_busy += 1;
            GasTopupQueueProvider::mark_retry(ds, job_id, "gas lease held by another worker", chrono::Utc::now() + Duration::seconds(10))
                .await?;
            continue;
        }

        let outcome = async {
            let from = ds
                .get_operation_wallet(job.destination_wallet_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::FundingWalletNotFound,
                    format!("operation wallet {} not found", job.destination_wallet_id),
                ))?;
            let to = ds
                .resolve_wallet_address(job.wallet_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::InvalidData,
                    format!("wallet {} has no resolvable address", job.wallet_id),
                ))?;

            let intent = TronIntent::SendTrx {
                from: from.address.clone(),
                to: to.address().to_string(),
                amount_sun: job.topup_amount_raw.clone(),
            };
            broadcast_tron_intent(signer, &chain.name, &from.wallet_group_id, from.derivation_index, intent).await
        }
        .await;

        finish_job(ds, job_id, job.wallet_balance_id, job.retry_count, outcome, &mut summary).await?;
    }

    Ok(summary)
}

pub async fn run_evm_cycle(
    ds: &dyn Datastore,
    adapter: &chainops_chain::EvmAdapter,
    signer: &SignerClient,
    chain: &Chain,
    worker_id: &str,
    gas_price_cap_gwei: u64,
    batch_size: i64,
) -> Result<GasTopupSummary, CycleError> {
    let mut summary = GasTopupSummary::default();
    let candidates = GasTopupQueueProvider::pick_candidates(ds, chain.id, batch_size).await?;
    summary.picked = candidates.len() as u64;

    for job in candidates {
        if job.status != chainops_common::model::ExecutionStatus::Pending {
            continue;
        }
        let job_id = job.id;
        GasTopupQueueProvider::mark_processing(ds, job_id).await?;

        if !ds
            .try_acquire_gas_lease(job.wallet_balance_id, worker_id, Duration::seconds(LEASE_TTL_SECONDS))
            .await?
        {
            summary.lease_busy += 1;
            GasTopupQueueProvider::mark_retry(ds, job_id, "gas lease held by another worker", chrono::Utc::now() + Duration::seconds(10))
                .await?;
            continue;
        }

        let outcome = async {
            let from = ds
                .get_operation_wallet(job.destination_wallet_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::FundingWalletNotFound,
                    format!("operation wallet {} not found", job.destination_wallet_id),
                ))?;
            let to = ds
                .resolve_wallet_address(job.wallet_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::InvalidData,
                    format!("wallet {} has no resolvable address", job.wallet_id),
                ))?;

            let params = EvmSendParams {
                from: from.address.clone(),
                to: to.address().to_string(),
                value_wei: job.topup_amount_raw.clone(),
                data: Vec::new(),
                gas_limit: NATIVE_TRANSFER_GAS_LIMIT,
            };
            send_evm_transaction(
                ds,
                adapter,
                signer,
                &chain.name,
                &from.wallet_group_id,
                from.derivation_index,
                chain.chain_id,
                gas_price_cap_gwei,
                params,
            )
            .await
        }
        .await;

        finish_job(ds, job_id, job.wallet_balance_id, job.retry_count, outcome, &mut summary).await?;
    }

    Ok(summary)
}

async fn finish_job(
    ds: &dyn Datastore,
    job_id: Uuid,
    wallet_balance_id: Uuid,
    retry_count: u32,
    outcome: Result<String, ExecutionFailure>,
    summary: &mut GasTopupSummary,
) -> Result<(), CycleError> {
    match outcome {
        Ok(tx_hash) => {
            GasTopupQueueProvider::mark_broadcast(ds, job_id, &tx_hash).await?;
            ds.release_gas_lease(wallet_balance_id).await?;
            summary.broadcast += 1;
        }
        Err(failure) => {
            match classify_failure(&failure, retry_count, chainops_common::error::MAX_RETRIES) {
                FailureAction::Retry { scheduled_at, error_message } => {
                    GasTopupQueueProvider::mark_retry(ds, job_id, &error_message, scheduled_at).await?;
                    summary.retried += 1;
                }
                FailureAction::Fail { error_message } => {
                    GasTopupQueueProvider::mark_failed(ds, job_id, &error_message).await?;
                    summary.failed += 1;
                }
            }
            warn!("gas-topup job {job_id} did not broadcast: {}", failure.detail);
            ds.release_gas_lease(wallet_balance_id).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{asset_on_chain, tron_chain, user_wallet};
    use chainops_datastore::memory::InMemoryDatastore;
    use chainops_datastore::NewGasTopupJob;
    use chainops_common::model::Priority;

    #[tokio::test]
    async fn a_job_already_broadcast_is_never_rebroadcast_on_the_next_cycle() {
        let ds = InMemoryDatastore::new();
        let chain = tron_chain(19);
        let gas_asset = asset_on_chain(chain.id, 6, true);
        let wallet = user_wallet(chain.id, "tuser");
        ds.insert_chain(chain.clone());
        ds.insert_asset(gas_asset.clone());
        ds.insert_user_wallet(wallet.clone());
        let wallet_balance_id = Uuid::new_v4();

        assert!(GasTopupQueueProvider::enqueue(
            &ds,
            NewGasTopupJob {
                chain_id: chain.id,
                wallet_id: wallet.id,
                wallet_balance_id,
                gas_asset_on_chain_id: gas_asset.id,
                destination_wallet_id: Uuid::new_v4(),
                topup_amount_raw: "5000000".to_string(),
                topup_amount_human: "5".to_string(),
                priority: Priority::High,
            },
        )
        .await
        .unwrap());

        let job = GasTopupQueueProvider::pick_candidates(&ds, chain.id, 10)
            .await
            .unwrap()
            .into_iter()
            .next()
            .expect("job was enqueued");

        // Simulate a prior cycle that broadcast successfully and crashed
        // before releasing the lease or advancing past `Confirming`.
        GasTopupQueueProvider::mark_broadcast(&ds, job.id, "already-sent-hash").await.unwrap();

        let signer = SignerClient::new("http://unreachable.invalid", "test-key");
        let summary = run_tron_cycle(&ds, &signer, &chain, "worker-1", 10).await.unwrap();

        assert_eq!(summary.broadcast, 0, "a Confirming job must be skipped, not rebroadcast");
        let reloaded = GasTopupQueueProvider::get(&ds, job.id).await.unwrap().unwrap();
        assert_eq!(reloaded.tx_hash.as_deref(), Some("already-sent-hash"));
        assert_eq!(reloaded.status, chainops_common::model::ExecutionStatus::Confirming);
    }
}
