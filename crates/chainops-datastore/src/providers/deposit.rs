use async_trait::async_trait;
use chainops_common::model::Deposit;
use uuid::Uuid;

use crate::error::DatastoreError;

/// A not-yet-inserted deposit row, assembled by the detector (§4.4).
#[derive(Debug, Clone)]
pub struct NewDeposit {
    pub chain_id: Uuid,
    pub asset_on_chain_id: Uuid,
    pub tx_hash: String,
    pub log_index: i64,
    pub from_address: String,
    pub to_address: String,
    pub amount_raw: String,
    pub amount_human: String,
    pub block_number: u64,
}

#[async_trait]
pub trait DepositProvider {
    /// Idempotent: a pre-check by `(tx_hash, log_index)` followed by an
    /// insert; a unique-violation on race is treated as success-without-
    /// insert (§4.4, R3). Returns `true` only when this call performed the
    /// insert.
    async fn insert_pending_if_absent(&self, deposit: NewDeposit) -> Result<bool, DatastoreError>;

    async fn get_by_tx_log(
        &self,
        tx_hash: &str,
        log_index: i64,
    ) -> Result<Option<Deposit>, DatastoreError>;

    async fn list_pending_oldest_first(
        &self,
        chain_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Deposit>, DatastoreError>;

    async fn update_confirmations(&self, id: Uuid, confirmations: u64) -> Result<(), DatastoreError>;

    /// Compare-and-set `pending -> confirmed`. Returns whether this call won
    /// the transition (§4.5 step 2).
    async fn try_mark_confirmed(&self, id: Uuid) -> Result<bool, DatastoreError>;

    async fn mark_credited(&self, id: Uuid) -> Result<(), DatastoreError>;

    /// Crash-recovery source for step 4 of §4.5: confirmed but not yet
    /// credited.
    async fn list_confirmed_uncredited(
        &self,
        chain_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Deposit>, DatastoreError>;
}
