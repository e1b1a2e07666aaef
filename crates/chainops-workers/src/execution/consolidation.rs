//! Consolidation execution cycle (§4.8, §4.9, §4.10): sweeps a user wallet's
//! balance of one asset into an operation hot wallet. Unlike gas-topup, the
//! asset being moved may be native or a token, so both intent/calldata shapes
//! are built here from the source `WalletBalance` row's asset.

use chainops_common::model::Chain;
use chainops_datastore::{ConsolidationQueueProvider, Datastore};
use chainops_signer::{SignerClient, TronIntent};
use chrono::Duration;
use log::warn;
use uuid::Uuid;

use crate::error::CycleError;
use crate::execution::common::{
    broadcast_tron_intent, classify_failure, send_evm_transaction, EvmSendParams, ExecutionFailure,
    FailureAction, ERC20_TRANSFER_GAS_LIMIT, NATIVE_TRANSFER_GAS_LIMIT,
};

const LEASE_TTL_SECONDS: i64 = 120;

#[derive(Debug, Default)]
pub struct ConsolidationSummary {
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
) -> Result<ConsolidationSummary, CycleError> {
    let mut summary = ConsolidationSummary::default();
    let candidates = ConsolidationQueueProvider::pick_candidates(ds, chain.id, batch_size).await?;
    summary.picked = candidates.len() as u64;

    for job in candidates {
        if job.status != chainops_common::model::ExecutionStatus::Pending {
            continue;
        }
        let job_id = job.id;
        ConsolidationQueueProvider::mark_processing(ds, job_id).await?;

        if !ds
            .try_acquire_consolidation_lease(job.wallet_balance_id, worker_id, Duration::seconds(LEASE_TTL_SECONDS))
            .await?
        {
            summary.lease_busy += 1;
            ConsolidationQueueProvider::mark_retry(
                ds,
                job_id,
                "consolidation lease held by another worker",
                chrono::Utc::now() + Duration::seconds(10),
            )
            .await?;
            continue;
        }

        let outcome = async {
            let balance = ds
                .get_wallet_balance(job.wallet_balance_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::InvalidData,
                    format!("wallet_balance {} no longer exists", job.wallet_balance_id),
                ))?;
            let asset = ds
                .get_asset_on_chain(balance.asset_on_chain_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::InvalidData,
                    format!("asset_on_chain {} no longer exists", balance.asset_on_chain_id),
                ))?;
            let from = ds
                .resolve_wallet_address(job.wallet_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::InvalidData,
                    format!("wallet {} has no resolvable address", job.wallet_id),
                ))?;
            let to = ds
                .get_operation_wallet(job.destination_wallet_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::FundingWalletNotFound,
                    format!("operation wallet {} not found", job.destination_wallet_id),
                ))?;

            let intent = match asset.contract_address.as_ref() {
                Some(contract) => TronIntent::Trc20Transfer {
                    from: from.address().to_string(),
                    to: to.address.clone(),
                    amount_sun: job.amount_raw.clone(),
                    contract_address: contract.clone(),
                },
                None => TronIntent::SendTrx {
                    from: from.address().to_string(),
                    to: to.address.clone(),
                    amount_sun: job.amount_raw.clone(),
                },
            };
            broadcast_tron_intent(signer, &chain.name, from.wallet_group_id(), from.derivation_index(), intent)
                .await
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
) -> Result<ConsolidationSummary, CycleError> {
    let mut summary = ConsolidationSummary::default();
    let candidates = ConsolidationQueueProvider::pick_candidates(ds, chain.id, batch_size).await?;
    summary.picked = candidates.len() as u64;

    for job in candidates {
        if job.status != chainops_common::model::ExecutionStatus::Pending {
            continue;
        }
        let job_id = job.id;
        ConsolidationQueueProvider::mark_processing(ds, job_id).await?;

        if !ds
            .try_acquire_consolidation_lease(job.wallet_balance_id, worker_id, Duration::seconds(LEASE_TTL_SECONDS))
            .await?
        {
            summary.lease_busy += 1;
            ConsolidationQueueProvider::mark_retry(
                ds,
                job_id,
                "consolidation lease held by another worker",
                chrono::Utc::now() + Duration::seconds(10),
            )
            .await?;
            continue;
        }

        let outcome = async {
            let balance = ds
                .get_wallet_balance(job.wallet_balance_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::InvalidData,
                    format!("wallet_balance {} no longer exists", job.wallet_balance_id),
                ))?;
            let asset = ds
                .get_asset_on_chain(balance.asset_on_chain_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::InvalidData,
                    format!("asset_on_chain {} no longer exists", balance.asset_on_chain_id),
                ))?;
            let from = ds
                .resolve_wallet_address(job.wallet_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::InvalidData,
                    format!("wallet {} has no resolvable address", job.wallet_id),
                ))?;
            let to = ds
                .get_operation_wallet(job.destination_wallet_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::FundingWalletNotFound,
                    format!("operation wallet {} not found", job.destination_wallet_id),
                ))?;

            let (to_address, value_wei, data, gas_limit) = match asset.contract_address.as_ref() {
                Some(contract) => (
                    contract.clone(),
                    "0".to_string(),
                    chainops_chain::evm::erc20_transfer_calldata(&to.address, &job.amount_raw)?,
                    ERC20_TRANSFER_GAS_LIMIT,
                ),
                None => (to.address.clone(), job.amount_raw.clone(), Vec::new(), NATIVE_TRANSFER_GAS_LIMIT),
            };

            let params = EvmSendParams {
                from: from.address().to_string(),
                to: to_address,
                value_wei,
                data,
                gas_limit,
            };
            send_evm_transaction(
                ds,
                adapter,
                signer,
                &chain.name,
                from.wallet_group_id(),
                from.derivation_index(),
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
    summary: &mut ConsolidationSummary,
) -> Result<(), CycleError> {
    match outcome {
        Ok(tx_hash) => {
            ConsolidationQueueProvider::mark_broadcast(ds, job_id, &tx_hash).await?;
            ds.release_consolidation_lease(wallet_balance_id, false).await?;
            summary.broadcast += 1;
        }
        Err(failure) => {
            match classify_failure(&failure, retry_count, chainops_common::error::MAX_RETRIES) {
                FailureAction::Retry { scheduled_at, error_message } => {
                    ConsolidationQueueProvider::mark_retry(ds, job_id, &error_message, scheduled_at).await?;
                    summary.retried += 1;
                }
                FailureAction::Fail { error_message } => {
                    ConsolidationQueueProvider::mark_failed(ds, job_id, &error_message).await?;
                    summary.failed += 1;
                }
            }
            warn!("consolidation job {job_id} did not broadcast: {}", failure.detail);
            ds.release_consolidation_lease(wallet_balance_id, false).await?;
        }
    }
    Ok(())
}
