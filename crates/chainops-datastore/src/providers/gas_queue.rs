use async_trait::async_trait;
use chainops_common::model::{GasTopupJob, Priority};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatastoreError;

#[derive(Debug, Clone)]
pub struct NewGasTopupJob {
    pub chain_id: Uuid,
    pub wallet_id: Uuid,
    pub wallet_balance_id: Uuid,
    pub gas_asset_on_chain_id: Uuid,
    pub destination_wallet_id: Uuid,
    pub topup_amount_raw: String,
    pub topup_amount_human: String,
    pub priority: Priority,
}

/// Unique active job per `(chain, gas_asset, wallet)` (P5).
#[async_trait]
pub trait GasTopupQueueProvider {
    async fn has_active_job(
        &self,
        chain_id: Uuid,
        gas_asset_on_chain_id: Uuid,
        wallet_id: Uuid,
    ) -> Result<bool, DatastoreError>;

    async fn enqueue(&self, job: NewGasTopupJob) -> Result<bool, DatastoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<GasTopupJob>, DatastoreError>;

    async fn pick_candidates(
        &self,
        chain_id: Uuid,
        limit: i64,
    ) -> Result<Vec<GasTopupJob>, DatastoreError>;

    async fn mark_processing(&self, id: Uuid) -> Result<(), DatastoreError>;

    async fn mark_broadcast(&self, id: Uuid, tx_hash: &str) -> Result<(), DatastoreError>;

    async fn mark_retry(
        &self,
        id: Uuid,
        error_message: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<(), DatastoreError>;

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), DatastoreError>;

    async fn mark_confirmed(
        &self,
        id: Uuid,
        gas_used: Option<&str>,
        gas_price: Option<&str>,
    ) -> Result<(), DatastoreError>;
}
