//! Balance-sync cycle (§4.6): leases a batch of idle `WalletBalance` rows,
//! reads the current on-chain balance for each, and writes the result back.
//! Touches only the balance fields and the general lease — never
//! `needs_*`/priorities, which belong to the planner (§5 "Shared resources").

use chainops_datastore::{AssetProvider, Datastore, WalletProvider};
use chrono::Duration;
use log::warn;

use crate::error::CycleError;
use crate::registry::ChainRegistry;

const LEASE_TTL_SECONDS: i64 = 120;

#[derive(Debug, Default)]
pub struct BalanceSyncSummary {
    pub leased: u64,
    pub synced: u64,
    pub errors: u64,
}

pub async fn run_cycle(
    ds: &dyn Datastore,
    registry: &ChainRegistry,
    worker_id: &str,
    batch_size: i64,
) -> Result<BalanceSyncSummary, CycleError> {
    let mut summary = BalanceSyncSummary::default();

    let leased = ds
        .lease_idle_for_sync(worker_id, Duration::seconds(LEASE_TTL_SECONDS), batch_size)
        .await?;
    summary.leased = leased.len() as u64;

    for balance in leased {
        if let Err(e) = sync_one(ds, registry, balance.id, balance.wallet_id, balance.asset_on_chain_id).await {
            warn!("balance sync failed for wallet_balance {}: {e}", balance.id);
            let _ = ds.record_sync_error(balance.id, &e.to_string()).await;
            summary.errors += 1;
        } else {
            summary.synced += 1;
        }
    }

    Ok(summary)
}

async fn sync_one(
    ds: &dyn Datastore,
    registry: &ChainRegistry,
    balance_id: uuid::Uuid,
    wallet_id: uuid::Uuid,
    asset_on_chain_id: uuid::Uuid,
) -> Result<(), CycleError> {
    let wallet = ds
        .resolve_wallet_address(wallet_id)
        .await?
        .ok_or_else(|| CycleError::Other(format!("wallet {wallet_id} has no resolvable address")))?;

    let asset = ds
        .get_asset_on_chain(asset_on_chain_id)
        .await?
        .ok_or_else(|| {
            CycleError::Other(format!("asset_on_chain {asset_on_chain_id} no longer exists"))
        })?;

    let adapter = registry
        .adapter(wallet.chain_id())
        .ok_or_else(|| CycleError::Other(format!("no adapter for chain {}", wallet.chain_id())))?
        .as_ref();

    let raw = if asset.is_native {
        adapter.get_native_balance(wallet.address()).await?
    } else {
        let contract = asset.contract_address.as_deref().ok_or_else(|| {
            CycleError::Other(format!("asset {asset_on_chain_id} is non-native with no contract_address"))
        })?;
        adapter.get_token_balance(contract, wallet.address()).await?
    };

    let human = adapter.format_amount(&raw, asset.decimals)?;
    ds.write_sync_result(balance_id, &raw, &human).await?;
    Ok(())
}
