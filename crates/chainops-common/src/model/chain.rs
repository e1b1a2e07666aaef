use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    Tron,
    Evm,
}

/// A configured blockchain, reloaded from the datastore at boot and immutable
/// for the lifetime of a worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub id: Uuid,
    pub name: String,
    pub family: ChainFamily,
    pub rpc_url: String,
    pub confirmation_threshold: u64,
    pub block_time_seconds: u64,
    pub chain_id: Option<u64>,
    pub is_active: bool,
}

/// A logical asset (symbol), independent of any chain deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub symbol: String,
}

/// The deployment of an `Asset` on a specific `Chain`. Exactly one native row
/// exists per active chain (invariant enforced by the datastore, not here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOnChain {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub asset_id: Uuid,
    pub contract_address: Option<String>,
    pub decimals: u32,
    pub is_native: bool,
    pub is_active: bool,
}
