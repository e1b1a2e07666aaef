//! Shared monitored-address lookup (§4.4, §4.5): a case-normalized
//! `address -> uid` map over active user wallets on one chain, used by the
//! deposit detector to filter transfers and by deposit-confirmation to
//! resolve the `uid` a deposit's `to_address` belongs to (the `Deposit` row
//! itself carries no `uid` column, per §3).

use std::collections::HashMap;

use chainops_chain::ChainAdapter;
use chainops_datastore::Datastore;
use uuid::Uuid;

use crate::error::CycleError;

pub async fn monitored_addresses(
    ds: &dyn Datastore,
    adapter: &dyn ChainAdapter,
    chain_id: Uuid,
) -> Result<HashMap<String, Uuid>, CycleError> {
    let wallets = ds.list_active_user_addresses_on_chain(chain_id).await?;
    Ok(wallets
        .into_iter()
        .map(|w| (adapter.normalize_address(&w.address), w.uid))
        .collect())
}
