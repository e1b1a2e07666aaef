//! Confirmation cycle (§4.11), multi-chain: polls every broadcast-but-not-yet-
//! confirmed job in `consolidation_queue`/`gas_topup_queue`/`withdrawal_queue`
//! for a receipt and, once it clears the chain's confirmation threshold,
//! writes the terminal outcome and releases the lease the execution worker
//! left held. `pick_candidates` already returns both `pending` and
//! `confirming` rows (the execution workers filter `pending` out); here it's
//! the other way around — only `confirming` rows with a `tx_hash` are ours.

use chainops_chain::ChainAdapter;
use chainops_common::model::{Chain, Priority};
use chainops_datastore::{
    ConsolidationQueueProvider, Datastore, DatastoreError, GasTopupQueueProvider,
    WithdrawalQueueProvider, WithdrawalRequestProvider,
};
use log::warn;
use uuid::Uuid;

use crate::error::CycleError;
use crate::registry::ChainRegistry;

const BATCH: i64 = 50;

#[derive(Debug, Default)]
pub struct ConfirmationSummary {
    pub confirmed: u64,
    pub receipt_failed: u64,
    pub still_pending: u64,
    pub errors: Vec<String>,
}

/// One resolved outcome for a broadcast job, independent of which queue it
/// came from.
enum Verdict {
    /// No receipt yet, or not enough confirmations.
    NotYet,
    Success { gas_used: Option<String>, gas_price: Option<String> },
    Failure,
}

async fn resolve(
    adapter: &dyn ChainAdapter,
    chain: &Chain,
    tx_hash: &str,
) -> Result<Verdict, CycleError> {
    let Some(receipt) = adapter.get_receipt(tx_hash).await? else {
        return Ok(Verdict::NotYet);
    };
    let current = adapter.current_block().await?;
    let confirmations = adapter.compute_confirmations(receipt.block_number, current);
    if confirmations < chain.confirmation_threshold {
        return Ok(Verdict::NotYet);
    }
    if receipt.success {
        Ok(Verdict::Success { gas_used: receipt.gas_used, gas_price: receipt.gas_price })
    } else {
        Ok(Verdict::Failure)
    }
}

pub async fn run_consolidation_cycle(
    ds: &dyn Datastore,
    registry: &ChainRegistry,
) -> Result<ConfirmationSummary, CycleError> {
    let mut summary = ConfirmationSummary::default();

    for chain in registry.chains() {
        let adapter = match registry.adapter(chain.id) {
            Some(a) => a.as_ref(),
            None => continue,
        };
        let candidates = ConsolidationQueueProvider::pick_candidates(ds, chain.id, BATCH).await?;
        for job in candidates {
            if job.status != chainops_common::model::ExecutionStatus::Confirming {
                continue;
            }
            let Some(tx_hash) = job.tx_hash.clone() else { continue };

            match resolve(adapter, chain, &tx_hash).await {
                Ok(Verdict::NotYet) => summary.still_pending += 1,
                Ok(Verdict::Success { gas_used, gas_price }) => {
                    ConsolidationQueueProvider::mark_confirmed(
                        ds,
                        job.id,
                        gas_used.as_deref(),
                        gas_price.as_deref(),
                    )
                    .await?;
                    // Terminal success clears `needs_consolidation` so the
                    // planner does not immediately re-enqueue this balance.
                    ds.release_consolidation_lease(job.wallet_balance_id, true).await?;
                    summary.confirmed += 1;
                }
                Ok(Verdict::Failure) => {
                    ConsolidationQueueProvider::mark_failed(ds, job.id, "transaction reverted on-chain")
                        .await?;
                    // A reverted sweep leaves the balance still needing
                    // consolidation so the planner retries it.
                    ds.release_consolidation_lease(job.wallet_balance_id, false).await?;
                    summary.receipt_failed += 1;
                }
                Err(e) => {
                    warn!("consolidation confirmation failed for job {}: {e}", job.id);
                    summary.errors.push(format!("{}: {e}", job.id));
                }
            }
        }
    }

    Ok(summary)
}

pub async fn run_gas_topup_cycle(
    ds: &dyn Datastore,
    registry: &ChainRegistry,
) -> Result<ConfirmationSummary, CycleError> {
    let mut summary = ConfirmationSummary::default();

    for chain in registry.chains() {
        let adapter = match registry.adapter(chain.id) {
            Some(a) => a.as_ref(),
            None => continue,
        };
        let candidates = GasTopupQueueProvider::pick_candidates(ds, chain.id, BATCH).await?;
        for job in candidates {
            if job.status != chainops_common::model::ExecutionStatus::Confirming {
                continue;
            }
            let Some(tx_hash) = job.tx_hash.clone() else { continue };

            match resolve(adapter, chain, &tx_hash).await {
                Ok(Verdict::NotYet) => summary.still_pending += 1,
                Ok(Verdict::Success { gas_used, gas_price }) => {
                    GasTopupQueueProvider::mark_confirmed(ds, job.id, gas_used.as_deref(), gas_price.as_deref())
                        .await?;
                    ds.release_gas_lease(job.wallet_balance_id).await?;
                    // The topped-up balance is the native row on `wallet_id`,
                    // not the job's own `wallet_balance_id` (the funding
                    // operation wallet's row) — see gas_topup.rs's header.
                    if let Err(e) = clear_needs_gas(ds, job.wallet_id, job.gas_asset_on_chain_id).await {
                        warn!("could not clear needs_gas after topup {}: {e}", job.id);
                    }
                    summary.confirmed += 1;
                }
                Ok(Verdict::Failure) => {
                    GasTopupQueueProvider::mark_failed(ds, job.id, "transaction reverted on-chain").await?;
                    ds.release_gas_lease(job.wallet_balance_id).await?;
                    summary.receipt_failed += 1;
                }
                Err(e) => {
                    warn!("gas-topup confirmation failed for job {}: {e}", job.id);
                    summary.errors.push(format!("{}: {e}", job.id));
                }
            }
        }
    }

    Ok(summary)
}

async fn clear_needs_gas(
    ds: &dyn Datastore,
    wallet_id: Uuid,
    asset_on_chain_id: Uuid,
) -> Result<(), DatastoreError> {
    if let Some(balance) = ds.get_wallet_balance_by_wallet_asset(wallet_id, asset_on_chain_id).await? {
        ds.set_native_needs_gas(balance.id, false, Priority::Unknown).await?;
    }
    Ok(())
}

pub async fn run_withdrawal_cycle(
    ds: &dyn Datastore,
    registry: &ChainRegistry,
) -> Result<ConfirmationSummary, CycleError> {
    let mut summary = ConfirmationSummary::default();

    for chain in registry.chains() {
        let adapter = match registry.adapter(chain.id) {
            Some(a) => a.as_ref(),
            None => continue,
        };
        let candidates = WithdrawalQueueProvider::pick_candidates(ds, chain.id, BATCH).await?;
        for job in candidates {
            if job.status != chainops_common::model::ExecutionStatus::Confirming {
                continue;
            }
            let Some(tx_hash) = job.tx_hash.clone() else { continue };

            match resolve(adapter, chain, &tx_hash).await {
                Ok(Verdict::NotYet) => summary.still_pending += 1,
                Ok(Verdict::Success { gas_used, gas_price }) => {
                    WithdrawalQueueProvider::mark_confirmed(ds, job.id, gas_used.as_deref(), gas_price.as_deref())
                        .await?;
                    WithdrawalRequestProvider::mark_completed(ds, job.withdrawal_request_id, &tx_hash).await?;
                    summary.confirmed += 1;
                }
                Ok(Verdict::Failure) => {
                    WithdrawalQueueProvider::mark_failed(ds, job.id, "transaction reverted on-chain").await?;
                    WithdrawalRequestProvider::mark_failed(ds, job.withdrawal_request_id).await?;
                    summary.receipt_failed += 1;
                }
                Err(e) => {
                    warn!("withdrawal confirmation failed for job {}: {e}", job.id);
                    summary.errors.push(format!("{}: {e}", job.id));
                }
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tron_chain, FakeAdapter};
    use chainops_chain::TxReceipt;

    #[tokio::test]
    async fn no_receipt_yet_resolves_to_not_yet() {
        let chain = tron_chain(19);
        let adapter = FakeAdapter::new(1000);
        let verdict = resolve(&adapter, &chain, "0xmissing").await.unwrap();
        assert!(matches!(verdict, Verdict::NotYet));
    }

    #[tokio::test]
    async fn receipt_below_threshold_resolves_to_not_yet() {
        let chain = tron_chain(19);
        let adapter = FakeAdapter::new(1000).with_receipt(
            "0xabc",
            TxReceipt { block_number: 990, success: true, gas_used: None, gas_price: None },
        );
        let verdict = resolve(&adapter, &chain, "0xabc").await.unwrap();
        assert!(matches!(verdict, Verdict::NotYet));
    }

    #[tokio::test]
    async fn receipt_at_threshold_with_success_resolves_to_success() {
        let chain = tron_chain(19);
        let adapter = FakeAdapter::new(1000).with_receipt(
            "0xabc",
            TxReceipt {
                block_number: 980,
                success: true,
                gas_used: Some("21000".to_string()),
                gas_price: Some("1".to_string()),
            },
        );
        let verdict = resolve(&adapter, &chain, "0xabc").await.unwrap();
        match verdict {
            Verdict::Success { gas_used, gas_price } => {
                assert_eq!(gas_used.as_deref(), Some("21000"));
                assert_eq!(gas_price.as_deref(), Some("1"));
            }
            _ => panic!("expected Success"),
        }
    }

    #[tokio::test]
    async fn reverted_receipt_resolves_to_failure() {
        let chain = tron_chain(19);
        let adapter = FakeAdapter::new(1000).with_receipt(
            "0xabc",
            TxReceipt { block_number: 980, success: false, gas_used: None, gas_price: None },
        );
        let verdict = resolve(&adapter, &chain, "0xabc").await.unwrap();
        assert!(matches!(verdict, Verdict::Failure));
    }
}
