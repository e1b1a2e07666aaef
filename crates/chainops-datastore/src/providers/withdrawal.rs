use async_trait::async_trait;
use chainops_common::model::{Priority, WithdrawalJob, WithdrawalRequest};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatastoreError;

#[derive(Debug, Clone)]
pub struct NewWithdrawalJob {
    pub withdrawal_request_id: Uuid,
    pub chain_id: Uuid,
    pub operation_wallet_address_id: Uuid,
    pub destination_address: String,
    pub amount_raw: String,
    pub amount_human: String,
    pub priority: Priority,
    pub max_retries: u32,
}

/// The two-layer withdrawal model (§3): `WithdrawalRequest` is the
/// user-facing intent, `WithdrawalJob` is the execution-layer row pinned to
/// a funding wallet at enqueue time.
#[async_trait]
pub trait WithdrawalRequestProvider {
    async fn get(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, DatastoreError>;

    async fn mark_queued(&self, id: Uuid) -> Result<(), DatastoreError>;

    async fn mark_completed(&self, id: Uuid, final_tx_hash: &str) -> Result<(), DatastoreError>;

    async fn mark_failed(&self, id: Uuid) -> Result<(), DatastoreError>;
}

/// Unique active job per `withdrawal_request_id` (P5).
#[async_trait]
pub trait WithdrawalQueueProvider {
    async fn has_active_job(&self, withdrawal_request_id: Uuid) -> Result<bool, DatastoreError>;

    async fn enqueue(&self, job: NewWithdrawalJob) -> Result<bool, DatastoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<WithdrawalJob>, DatastoreError>;

    async fn pick_candidates(
        &self,
        chain_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WithdrawalJob>, DatastoreError>;

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
