//! Withdrawal execution cycle (§4.8, §4.9, §4.10): broadcasts a
//! `WithdrawalJob` already pinned to a funding operation wallet at enqueue
//! time. Unlike gas-topup and consolidation, no `WalletBalance` lease is
//! taken here — the funding source is an operation wallet, not a
//! user-owned balance row — so only the EVM per-funder advisory lock
//! applies, and only for the EVM family.

use chainops_common::model::Chain;
use chainops_datastore::{Datastore, WithdrawalQueueProvider};
use chainops_signer::{SignerClient, TronIntent};
use log::warn;
use uuid::Uuid;

use crate::error::CycleError;
use crate::execution::common::{
    broadcast_tron_intent, classify_failure, send_evm_transaction, EvmSendParams, ExecutionFailure,
    FailureAction, ERC20_TRANSFER_GAS_LIMIT, NATIVE_TRANSFER_GAS_LIMIT,
};

#[derive(Debug, Default)]
pub struct WithdrawalSummary {
    pub picked: u64,
    pub broadcast: u64,
    pub retried: u64,
    pub failed: u64,
}

pub async fn run_tron_cycle(
    ds: &dyn Datastore,
    signer: &SignerClient,
    chain: &Chain,
    batch_size: i64,
) -> Result<WithdrawalSummary, CycleError> {
    let mut summary = WithdrawalSummary::default();
    let candidates = WithdrawalQueueProvider::pick_candidates(ds, chain.id, batch_size).await?;
    summary.picked = candidates.len() as u64;

    for job in candidates {
        if job.status != chainops_common::model::ExecutionStatus::Pending {
            continue;
        }
        let job_id = job.id;
        WithdrawalQueueProvider::mark_processing(ds, job_id).await?;

        let outcome = async {
            let asset = ds
                .get_asset_on_chain(asset_id_for(ds, job.withdrawal_request_id).await?)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::InvalidData,
                    "withdrawal request's asset no longer exists".to_string(),
                ))?;
            let from = ds
                .get_operation_wallet(job.operation_wallet_address_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::FundingWalletNotFound,
                    format!("operation wallet {} not found", job.operation_wallet_address_id),
                ))?;

            let intent = match asset.contract_address.as_ref() {
                Some(contract) => TronIntent::Trc20Transfer {
                    from: from.address.clone(),
                    to: job.destination_address.clone(),
                    amount_sun: job.amount_raw.clone(),
                    contract_address: contract.clone(),
                },
                None => TronIntent::SendTrx {
                    from: from.address.clone(),
                    to: job.destination_address.clone(),
                    amount_sun: job.amount_raw.clone(),
                },
            };
            broadcast_tron_intent(signer, &chain.name, &from.wallet_group_id, from.derivation_index, intent)
                .await
        }
        .await;

        finish_job(ds, job_id, job.withdrawal_request_id, job.retry_count, job.max_retries, outcome, &mut summary).await?;
    }

    Ok(summary)
}

pub async fn run_evm_cycle(
    ds: &dyn Datastore,
    adapter: &chainops_chain::EvmAdapter,
    signer: &SignerClient,
    chain: &Chain,
    gas_price_cap_gwei: u64,
    batch_size: i64,
) -> Result<WithdrawalSummary, CycleError> {
    let mut summary = WithdrawalSummary::default();
    let candidates = WithdrawalQueueProvider::pick_candidates(ds, chain.id, batch_size).await?;
    summary.picked = candidates.len() as u64;

    for job in candidates {
        if job.status != chainops_common::model::ExecutionStatus::Pending {
            continue;
        }
        let job_id = job.id;
        WithdrawalQueueProvider::mark_processing(ds, job_id).await?;

        let outcome = async {
            let asset = ds
                .get_asset_on_chain(asset_id_for(ds, job.withdrawal_request_id).await?)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::InvalidData,
                    "withdrawal request's asset no longer exists".to_string(),
                ))?;
            let from = ds
                .get_operation_wallet(job.operation_wallet_address_id)
                .await?
                .ok_or_else(|| ExecutionFailure::new(
                    chainops_common::error::ExecutionErrorKind::FundingWalletNotFound,
                    format!("operation wallet {} not found", job.operation_wallet_address_id),
                ))?;

            let (to_address, value_wei, data, gas_limit) = match asset.contract_address.as_ref() {
                Some(contract) => (
                    contract.clone(),
                    "0".to_string(),
                    chainops_chain::evm::erc20_transfer_calldata(&job.destination_address, &job.amount_raw)?,
                    ERC20_TRANSFER_GAS_LIMIT,
                ),
                None => (job.destination_address.clone(), job.amount_raw.clone(), Vec::new(), NATIVE_TRANSFER_GAS_LIMIT),
            };

            let params = EvmSendParams {
                from: from.address.clone(),
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
                &from.wallet_group_id,
                from.derivation_index,
                chain.chain_id,
                gas_price_cap_gwei,
                params,
            )
            .await
        }
        .await;

        finish_job(ds, job_id, job.withdrawal_request_id, job.retry_count, job.max_retries, outcome, &mut summary).await?;
    }

    Ok(summary)
}

/// A `WithdrawalJob` carries no `asset_on_chain_id` of its own — it is
/// reached through the `WithdrawalRequest` it was enqueued from (§3).
async fn asset_id_for(
    ds: &dyn Datastore,
    withdrawal_request_id: Uuid,
) -> Result<Uuid, ExecutionFailure> {
    use chainops_datastore::WithdrawalRequestProvider;
    let request = WithdrawalRequestProvider::get(ds, withdrawal_request_id)
        .await?
        .ok_or_else(|| ExecutionFailure::new(
            chainops_common::error::ExecutionErrorKind::InvalidData,
            format!("withdrawal_request {withdrawal_request_id} no longer exists"),
        ))?;
    Ok(request.asset_on_chain_id)
}

async fn finish_job(
    ds: &dyn Datastore,
    job_id: Uuid,
    withdrawal_request_id: Uuid,
    retry_count: u32,
    max_retries: u32,
    outcome: Result<String, ExecutionFailure>,
    summary: &mut WithdrawalSummary,
) -> Result<(), CycleError> {
    match outcome {
        Ok(tx_hash) => {
            WithdrawalQueueProvider::mark_broadcast(ds, job_id, &tx_hash).await?;
            summary.broadcast += 1;
        }
        Err(failure) => {
            match classify_failure(&failure, retry_count, max_retries) {
                FailureAction::Retry { scheduled_at, error_message } => {
                    WithdrawalQueueProvider::mark_retry(ds, job_id, &error_message, scheduled_at).await?;
                    summary.retried += 1;
                }
                FailureAction::Fail { error_message } => {
                    WithdrawalQueueProvider::mark_failed(ds, job_id, &error_message).await?;
                    // A job that never reaches `confirming` never reaches the
                    // confirmation worker, so the terminal fail-fast has to
                    // propagate to the request here rather than in §4.11.
                    chainops_datastore::WithdrawalRequestProvider::mark_failed(ds, withdrawal_request_id)
                        .await?;
                    summary.failed += 1;
                }
            }
            warn!("withdrawal job {job_id} did not broadcast: {}", failure.detail);
        }
    }
    Ok(())
}
