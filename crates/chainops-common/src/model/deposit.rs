use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Unique on `(tx_hash, log_index)`. A public audit surface (§6) — readers
/// outside this core consult it for user-visible deposit status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub asset_on_chain_id: Uuid,
    pub tx_hash: String,
    pub log_index: i64,
    pub from_address: String,
    pub to_address: String,
    pub amount_raw: String,
    pub amount_human: String,
    pub block_number: u64,
    pub first_seen_block: u64,
    pub status: DepositStatus,
    pub confirmations: u64,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub credited_at: Option<DateTime<Utc>>,
}

/// A newly observed on-chain transfer, before it has been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTransfer {
    pub tx_hash: String,
    pub log_index: i64,
    pub from_address: String,
    pub to_address: String,
    pub amount_raw: String,
    pub block_number: u64,
}

/// `WorkerChainState.last_processed_block` — the detector's monotonic cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainCursor {
    pub chain_id: Uuid,
    pub last_processed_block: u64,
}
