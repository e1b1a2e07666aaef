use async_trait::async_trait;
use chainops_common::model::{ConsolidationJob, Priority};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatastoreError;

#[derive(Debug, Clone)]
pub struct NewConsolidationJob {
    pub chain_id: Uuid,
    pub wallet_id: Uuid,
    pub wallet_balance_id: Uuid,
    pub destination_wallet_id: Uuid,
    pub amount_raw: String,
    pub amount_human: String,
    pub priority: Priority,
}

/// Unique active job per `wallet_balance_id` over `{pending, processing,
/// confirming}` (P5).
#[async_trait]
pub trait ConsolidationQueueProvider {
    async fn has_active_job(&self, wallet_balance_id: Uuid) -> Result<bool, DatastoreError>;

    /// Idempotent insert; a unique-violation race is swallowed and reported
    /// as `false` (§4.7).
    async fn enqueue(&self, job: NewConsolidationJob) -> Result<bool, DatastoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<ConsolidationJob>, DatastoreError>;

    async fn pick_candidates(
        &self,
        chain_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ConsolidationJob>, DatastoreError>;

    async fn mark_processing(&self, id: Uuid) -> Result<(), DatastoreError>;

    /// Single-statement transition to `confirming` with the broadcast hash
    /// (P2: the only place a `tx_hash` is ever written).
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
