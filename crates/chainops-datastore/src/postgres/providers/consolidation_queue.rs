use async_trait::async_trait;
use chainops_common::model::ConsolidationJob;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatastoreError;
use crate::postgres::rows::{consolidation_job_from_row, priority_str};
use crate::postgres::PgDatastore;
use crate::providers::{ConsolidationQueueProvider, NewConsolidationJob};

#[async_trait]
impl ConsolidationQueueProvider for PgDatastore {
    async fn has_active_job(&self, wallet_balance_id: Uuid) -> Result<bool, DatastoreError> {
        let row = sqlx::query(
            "SELECT 1 FROM consolidation_queue
             WHERE wallet_balance_id = $1 AND status IN ('pending', 'processing', 'confirming')",
        )
        .bind(wallet_balance_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.is_some())
    }

    async fn enqueue(&self, job: NewConsolidationJob) -> Result<bool, DatastoreError> {
        if self.has_active_job(job.wallet_balance_id).await? {
            return Ok(false);
        }
        let result = sqlx::query(
            "INSERT INTO consolidation_queue
                (id, chain_id, wallet_id, wallet_balance_id, destination_wallet_id,
                 amount_raw, amount_human, status, priority, retry_count, scheduled_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, 0, now())
             ON CONFLICT DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(job.chain_id)
        .bind(job.wallet_id)
        .bind(job.wallet_balance_id)
        .bind(job.destination_wallet_id)
        .bind(&job.amount_raw)
        .bind(&job.amount_human)
        .bind(priority_str(job.priority))
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ConsolidationJob>, DatastoreError> {
        let row = sqlx::query("SELECT * FROM consolidation_queue WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(consolidation_job_from_row).transpose()
    }

    async fn pick_candidates(
        &self,
        chain_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ConsolidationJob>, DatastoreError> {
        let rows = sqlx::query(
            "SELECT * FROM consolidation_queue
             WHERE chain_id = $1 AND status IN ('pending', 'confirming') AND scheduled_at <= now()
             LIMIT $2",
        )
        .bind(chain_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        let mut jobs: Vec<ConsolidationJob> =
            rows.iter().map(consolidation_job_from_row).collect::<Result<_, _>>()?;
        jobs.sort_by_key(|j| (j.priority.rank(), j.scheduled_at));
        Ok(jobs)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE consolidation_queue SET status = 'processing' WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn mark_broadcast(&self, id: Uuid, tx_hash: &str) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE consolidation_queue SET status = 'confirming', tx_hash = $1
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
            "UPDATE consolidation_queue SET
                status = 'pending',
                retry_count = retry_count + 1,
                error_message = $1,
                scheduled_at = $2
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
            "UPDATE consolidation_queue SET status = 'failed', error_message = $1, processed_at = now()
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
            "UPDATE consolidation_queue SET
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
