//! Deposit-confirmation cycle (§4.5), multi-chain: a single worker instance
//! walks every active chain each cycle.

use chainops_chain::ChainAdapter;
use chainops_common::model::{Chain, Deposit, DepositStatus};
use chainops_datastore::Datastore;
use log::warn;
use uuid::Uuid;

use crate::error::CycleError;
use crate::registry::ChainRegistry;
use crate::wallets::monitored_addresses;

const BATCH: i64 = 50;

#[derive(Debug, Default)]
pub struct ConfirmationSummary {
    pub confirmed_and_credited: u64,
    pub advanced_confirmations: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
}

pub async fn run_cycle(
    ds: &dyn Datastore,
    registry: &ChainRegistry,
) -> Result<ConfirmationSummary, CycleError> {
    let mut summary = ConfirmationSummary::default();

    for chain in registry.chains() {
        if let Err(e) = run_for_chain(ds, registry, chain, &mut summary).await {
            warn!("deposit confirmation failed for chain {}: {e}", chain.name);
            summary.errors.push(format!("{}: {e}", chain.name));
        }
    }

    Ok(summary)
}

async fn run_for_chain(
    ds: &dyn Datastore,
    registry: &ChainRegistry,
    chain: &Chain,
    summary: &mut ConfirmationSummary,
) -> Result<(), CycleError> {
    let adapter = registry
        .adapter(chain.id)
        .ok_or_else(|| CycleError::Other(format!("no adapter registered for chain {}", chain.id)))?
        .as_ref();
    let current = adapter.current_block().await?;
    let monitored = monitored_addresses(ds, adapter, chain.id).await?;

    for deposit in ds.list_pending_oldest_first(chain.id, BATCH).await? {
        if let Err(e) = advance_deposit(ds, adapter, chain, &monitored, &deposit, current, summary).await
        {
            warn!("deposit {} confirmation step failed: {e}", deposit.id);
            summary.errors.push(format!("{}: {e}", deposit.id));
        }
    }

    for deposit in ds.list_confirmed_uncredited(chain.id, BATCH).await? {
        if let Err(e) = credit_deposit(ds, adapter, &monitored, &deposit).await {
            warn!("deposit {} credit retry failed: {e}", deposit.id);
            summary.errors.push(format!("{}: {e}", deposit.id));
        } else {
            summary.confirmed_and_credited += 1;
        }
    }

    Ok(())
}

async fn advance_deposit(
    ds: &dyn Datastore,
    adapter: &dyn ChainAdapter,
    chain: &Chain,
    monitored: &std::collections::HashMap<String, Uuid>,
    deposit: &Deposit,
    current_block: u64,
    summary: &mut ConfirmationSummary,
) -> Result<(), CycleError> {
    if current_block < deposit.block_number {
        // Reorg-ish anomaly: wait, per §4.5's "not scope beyond not advancing
        // confirmations prematurely".
        summary.skipped += 1;
        return Ok(());
    }

    let confirmations = adapter.compute_confirmations(deposit.block_number, current_block);
    if confirmations < chain.confirmation_threshold {
        ds.update_confirmations(deposit.id, confirmations).await?;
        summary.advanced_confirmations += 1;
        return Ok(());
    }

    let fresh = ds
        .get_by_tx_log(&deposit.tx_hash, deposit.log_index)
        .await?;
    let Some(fresh) = fresh else {
        summary.skipped += 1;
        return Ok(());
    };
    if fresh.credited_at.is_some() || fresh.status != DepositStatus::Pending {
        summary.skipped += 1;
        return Ok(());
    }

    if !ds.try_mark_confirmed(deposit.id).await? {
        summary.skipped += 1;
        return Ok(());
    }

    credit_deposit(ds, adapter, monitored, deposit).await?;
    summary.confirmed_and_credited += 1;
    Ok(())
}

/// Step 3/4 of §4.5: `credited_at` is the sole idempotency guard — the
/// ledger call itself is not assumed to dedupe.
async fn credit_deposit(
    ds: &dyn Datastore,
    adapter: &dyn ChainAdapter,
    monitored: &std::collections::HashMap<String, Uuid>,
    deposit: &Deposit,
) -> Result<(), CycleError> {
    let normalized_to = adapter.normalize_address(&deposit.to_address);
    let uid = monitored.get(&normalized_to).copied().ok_or_else(|| {
        CycleError::Other(format!(
            "deposit {} has no resolvable uid for address {}",
            deposit.id, deposit.to_address
        ))
    })?;

    ds.credit(uid, deposit.asset_on_chain_id, &deposit.amount_human)
        .await?;
    ds.mark_credited(deposit.id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{asset_on_chain, tron_chain, user_wallet, FakeAdapter};
    use chainops_datastore::memory::InMemoryDatastore;
    use chainops_datastore::NewDeposit;

    async fn seed_deposit(ds: &InMemoryDatastore, chain_id: Uuid, asset_id: Uuid, block_number: u64) -> Deposit {
        ds.insert_pending_if_absent(NewDeposit {
            chain_id,
            asset_on_chain_id: asset_id,
            tx_hash: "0xabc".to_string(),
            log_index: 2,
            from_address: "sender".to_string(),
            to_address: "TUser".to_string(),
            amount_raw: "10000000".to_string(),
            amount_human: "10".to_string(),
            block_number,
        })
        .await
        .unwrap();
        ds.get_by_tx_log("0xabc", 2).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn below_threshold_only_advances_the_confirmation_count() {
        let ds = InMemoryDatastore::new();
        let chain = tron_chain(19);
        let asset = asset_on_chain(chain.id, 6, false);
        let wallet = user_wallet(chain.id, "tuser");
        ds.insert_chain(chain.clone());
        ds.insert_asset(asset.clone());
        ds.insert_user_wallet(wallet.clone());
        let deposit = seed_deposit(&ds, chain.id, asset.id, 990).await;

        let adapter = FakeAdapter::new(1000);
        let monitored = monitored_addresses(&ds, &adapter, chain.id).await.unwrap();
        let mut summary = ConfirmationSummary::default();
        advance_deposit(&ds, &adapter, &chain, &monitored, &deposit, 1000, &mut summary).await.unwrap();

        let reloaded = ds.get_by_tx_log("0xabc", 2).await.unwrap().unwrap();
        assert_eq!(reloaded.status, DepositStatus::Pending);
        assert_eq!(reloaded.confirmations, 11);
        assert_eq!(summary.advanced_confirmations, 1);
    }

    #[tokio::test]
    async fn at_threshold_confirms_and_credits_exactly_once() {
        let ds = InMemoryDatastore::new();
        let chain = tron_chain(19);
        let asset = asset_on_chain(chain.id, 6, false);
        let wallet = user_wallet(chain.id, "tuser");
        ds.insert_chain(chain.clone());
        ds.insert_asset(asset.clone());
        ds.insert_user_wallet(wallet.clone());
        let deposit = seed_deposit(&ds, chain.id, asset.id, 980).await;

        let adapter = FakeAdapter::new(1000);
        let monitored = monitored_addresses(&ds, &adapter, chain.id).await.unwrap();
        let mut summary = ConfirmationSummary::default();
        advance_deposit(&ds, &adapter, &chain, &monitored, &deposit, 1000, &mut summary).await.unwrap();

        let reloaded = ds.get_by_tx_log("0xabc", 2).await.unwrap().unwrap();
        assert_eq!(reloaded.status, DepositStatus::Confirmed);
        assert!(reloaded.confirmed_at.is_some());
        assert!(reloaded.credited_at.is_some());
        assert_eq!(summary.confirmed_and_credited, 1);
        assert_eq!(ds.credit_ledger_entry(wallet.uid, asset.id), Some(rust_decimal::Decimal::from(10)));

        // Re-running the same step again must not double-credit (P1): the
        // deposit is no longer `pending`, so `try_mark_confirmed` can't win
        // twice, and this call is a no-op skip rather than a second credit.
        let mut summary2 = ConfirmationSummary::default();
        advance_deposit(&ds, &adapter, &chain, &monitored, &deposit, 1000, &mut summary2).await.unwrap();
        assert_eq!(summary2.confirmed_and_credited, 0);
        assert_eq!(ds.credit_ledger_entry(wallet.uid, asset.id), Some(rust_decimal::Decimal::from(10)));
    }

    #[tokio::test]
    async fn crash_after_confirm_before_credit_is_recovered_on_the_next_cycle() {
        let ds = InMemoryDatastore::new();
        let chain = tron_chain(19);
        let asset = asset_on_chain(chain.id, 6, false);
        let wallet = user_wallet(chain.id, "tuser");
        ds.insert_chain(chain.clone());
        ds.insert_asset(asset.clone());
        ds.insert_user_wallet(wallet.clone());
        let deposit = seed_deposit(&ds, chain.id, asset.id, 980).await;

        // Simulate the crash: status flips to confirmed but credited_at stays
        // null, as if the process died between steps 2 and 3 of §4.5.
        assert!(ds.try_mark_confirmed(deposit.id).await.unwrap());

        let adapter = FakeAdapter::new(1000);
        let monitored = monitored_addresses(&ds, &adapter, chain.id).await.unwrap();
        for d in ds.list_confirmed_uncredited(chain.id, 50).await.unwrap() {
            credit_deposit(&ds, &adapter, &monitored, &d).await.unwrap();
        }

        let reloaded = ds.get_by_tx_log("0xabc", 2).await.unwrap().unwrap();
        assert!(reloaded.credited_at.is_some());
        assert_eq!(ds.credit_ledger_entry(wallet.uid, asset.id), Some(rust_decimal::Decimal::from(10)));
    }
}
