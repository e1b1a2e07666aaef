use async_trait::async_trait;
use chainops_common::model::{WithdrawalJob, WithdrawalRequest};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatastoreError;
use crate::postgres::rows::{priority_str, withdrawal_job_from_row, withdrawal_request_from_row};
use crate::postgres::PgDatastore;
use crate::providers::{NewWithdrawalJob, WithdrawalQueueProvider, WithdrawalRequestProvider};

fn request_status_str(s: chainops_common::model::WithdrawalRequestStatus) -> &'static str {
    use chainops_common::model::WithdrawalRequestStatus::*;
    match s {
        Pending => "pending",
        Approved => "approved",
        Queued => "queued",
        Completed => "completed",
        Failed => "failed",
    }
}

#[async_trait]
impl WithdrawalRequestProvider for PgDatastore {
    async fn get(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, DatastoreError> {
        let row = sqlx::query("SELECT * FROM withdrawal_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(withdrawal_request_from_row).transpose()
    }

    async fn mark_queued(&self, id: Uuid) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE withdrawal_requests SET status = $1 WHERE id = $2")
            .bind(request_status_str(
                chainops_common::model::WithdrawalRequestStatus::Queued,
            ))
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid, final_tx_hash: &str) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE withdrawal_requests SET status = $1, final_tx_hash = $2 WHERE id = $3",
        )
        .bind(request_status_str(
            chainops_common::model::WithdrawalRequestStatus::Completed,
        ))
        .bind(final_tx_hash)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE withdrawal_requests SET status = $1 WHERE id = $2")
            .bind(request_status_str(
                chainops_common::model::WithdrawalRequestStatus::Failed,
            ))
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WithdrawalQueueProvider for PgDatastore {
    async fn has_active_job(&self, withdrawal_request_id: Uuid) -> Result<bool, DatastoreError> {
        let row = sqlx::query(
            "SELECT 1 FROM withdrawal_queue
             WHERE withdrawal_request_id = $1 AND status IN ('pending', 'processing', 'confirming')",
        )
        .bind(withdrawal_request_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.is_some())
    }

    async fn enqueue(&self, job: NewWithdrawalJob) -> Result<bool, DatastoreError> {
        if self.has_active_job(job.withdrawal_request_id).await? {
            return Ok(false);
        }
        let result = sqlx::query(
            "INSERT INTO withdrawal_queue
                (id, withdrawal_request_id, chain_id, operation_wallet_address_id,
                 destination_address, amount_raw, amount_human, status, priority,
                 retry_count, max_retries, scheduled_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, 0, $9, now())
             ON CONFLICT DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(job.withdrawal_request_id)
        .bind(job.chain_id)
        .bind(job.operation_wallet_address_id)
        .bind(&job.destination_address)
        .bind(&job.amount_raw)
        .bind(&job.amount_human)
        .bind(priority_str(job.priority))
        .bind(job.max_retries as i32)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: Uuid) -> Result<Option<WithdrawalJob>, DatastoreError> {
        let row = sqlx::query("SELECT * FROM withdrawal_queue WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(withdrawal_job_from_row).transpose()
    }

    async fn pick_candidates(
        &self,
        chain_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WithdrawalJob>, DatastoreError> {
        let rows = sqlx::query(
            "SELECT * FROM withdrawal_queue
             WHERE chain_id = $1 AND status IN ('pending', 'confirming') AND scheduled_at <= now()
             LIMIT $2",
        )
        .bind(chain_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        let mut jobs: Vec<WithdrawalJob> =
            rows.iter().map(withdrawal_job_from_row).collect::<Result<_, _>>()?;
        jobs.sort_by_key(|j| (j.priority.rank(), j.scheduled_at));
        Ok(jobs)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE withdrawal_queue SET status = 'processing' WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn mark_broadcast(&self, id: Uuid, tx_hash: &str) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE withdrawal_queue SET status = 'confirming', tx_hash = $1
             WHERE id = $2 AND tx_hash IS NULL",
        )
        .bind(tx_hash)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: Uuid,
        error_message: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE withdrawal_queue SET
                status = 'pending', retry_count = retry_count + 1, error_message = $1, scheduled_at = $2
             WHERE id = $3",
        )
        .bind(error_message)
        .bind(scheduled_at)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE withdrawal_queue SET status = 'failed', error_message = $1, processed_at = now()
             WHERE id = $2",
        )
        .bind(error_message)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn mark_confirmed(
        &self,
        id: Uuid,
        gas_used: Option<&str>,
        gas_price: Option<&str>,
    ) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE withdrawal_queue SET
                status = 'confirmed', processed_at = now(), gas_used = $1, gas_price = $2
             WHERE id = $3",
        )
        .bind(gas_used)
        .bind(gas_price)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
