use async_trait::async_trait;
use chainops_common::model::Deposit;
use uuid::Uuid;

use crate::error::DatastoreError;
use crate::postgres::rows::deposit_from_row;
use crate::postgres::PgDatastore;
use crate::providers::{DepositProvider, NewDeposit};

#[async_trait]
impl DepositProvider for PgDatastore {
    async fn insert_pending_if_absent(&self, deposit: NewDeposit) -> Result<bool, DatastoreError> {
        let existing = sqlx::query("SELECT 1 FROM deposits WHERE tx_hash = $1 AND log_index = $2")
            .bind(&deposit.tx_hash)
            .bind(deposit.log_index)
            .fetch_optional(self.pool())
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let result = sqlx::query(
            "INSERT INTO deposits
                (id, chain_id, asset_on_chain_id, tx_hash, log_index, from_address, to_address,
                 amount_raw, amount_human, block_number, first_seen_block, status, confirmations)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10, 'pending', 0)
             ON CONFLICT (tx_hash, log_index) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(deposit.chain_id)
        .bind(deposit.asset_on_chain_id)
        .bind(&deposit.tx_hash)
        .bind(deposit.log_index)
        .bind(&deposit.from_address)
        .bind(&deposit.to_address)
        .bind(&deposit.amount_raw)
        .bind(&deposit.amount_human)
        .bind(deposit.block_number as i64)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_by_tx_log(
        &self,
        tx_hash: &str,
        log_index: i64,
    ) -> Result<Option<Deposit>, DatastoreError> {
        let row = sqlx::query("SELECT * FROM deposits WHERE tx_hash = $1 AND log_index = $2")
            .bind(tx_hash)
            .bind(log_index)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(deposit_from_row).transpose()
    }

    async fn list_pending_oldest_first(
        &self,
        chain_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Deposit>, DatastoreError> {
        let rows = sqlx::query(
            "SELECT * FROM deposits WHERE chain_id = $1 AND status = 'pending'
             ORDER BY block_number ASC, log_index ASC LIMIT $2",
        )
        .bind(chain_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(deposit_from_row).collect()
    }

    async fn update_confirmations(&self, id: Uuid, confirmations: u64) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE deposits SET confirmations = $1 WHERE id = $2")
            .bind(confirmations as i64)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn try_mark_confirmed(&self, id: Uuid) -> Result<bool, DatastoreError> {
        let result = sqlx::query(
            "UPDATE deposits SET status = 'confirmed', confirmed_at = now()
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_credited(&self, id: Uuid) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE deposits SET credited_at = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn list_confirmed_uncredited(
        &self,
        chain_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Deposit>, DatastoreError> {
        let rows = sqlx::query(
            "SELECT * FROM deposits
             WHERE chain_id = $1 AND status = 'confirmed' AND credited_at IS NULL
             ORDER BY confirmed_at ASC LIMIT $2",
        )
        .bind(chain_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(deposit_from_row).collect()
    }
}
