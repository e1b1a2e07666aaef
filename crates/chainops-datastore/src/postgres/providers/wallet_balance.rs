use async_trait::async_trait;
use chainops_common::model::{Priority, WalletBalance};
use chrono::Duration;
use uuid::Uuid;

use crate::error::DatastoreError;
use crate::postgres::rows::{priority_str, wallet_balance_from_row};
use crate::postgres::PgDatastore;
use crate::providers::WalletBalanceProvider;

#[async_trait]
impl WalletBalanceProvider for PgDatastore {
    async fn get_wallet_balance(&self, id: Uuid) -> Result<Option<WalletBalance>, DatastoreError> {
        let row = sqlx::query("SELECT * FROM wallet_balances WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(wallet_balance_from_row).transpose()
    }

    async fn get_wallet_balance_by_wallet_asset(
        &self,
        wallet_id: Uuid,
        asset_on_chain_id: Uuid,
    ) -> Result<Option<WalletBalance>, DatastoreError> {
        let row = sqlx::query(
            "SELECT * FROM wallet_balances WHERE wallet_id = $1 AND asset_on_chain_id = $2",
        )
        .bind(wallet_id)
        .bind(asset_on_chain_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(wallet_balance_from_row).transpose()
    }

    async fn lease_idle_for_sync(
        &self,
        worker_id: &str,
        ttl: Duration,
        limit: i64,
    ) -> Result<Vec<WalletBalance>, DatastoreError> {
        let rows = sqlx::query(
            "UPDATE wallet_balances SET
                locked_until = now() + ($1 * interval '1 second'),
                locked_by = $2,
                processing_status = 'processing'
             WHERE id IN (
                SELECT id FROM wallet_balances
                WHERE processing_status = 'idle'
                  AND (locked_until IS NULL OR locked_until < now())
                ORDER BY last_checked ASC NULLS FIRST
                LIMIT $3
                FOR UPDATE SKIP LOCKED
             )
             RETURNING *",
        )
        .bind(ttl.num_seconds())
        .bind(worker_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(wallet_balance_from_row).collect()
    }

    async fn write_sync_result(
        &self,
        id: Uuid,
        on_chain_balance_raw: &str,
        on_chain_balance_human: &str,
    ) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE wallet_balances SET
                on_chain_balance_raw = $1,
                on_chain_balance_human = $2,
                sync_count = sync_count + 1,
                last_checked = now(),
                last_error = NULL,
                processing_status = 'idle',
                locked_until = NULL,
                locked_by = NULL
             WHERE id = $3",
        )
        .bind(on_chain_balance_raw)
        .bind(on_chain_balance_human)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn record_sync_error(&self, id: Uuid, message: &str) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE wallet_balances SET
                last_error = $1,
                error_count = error_count + 1,
                processing_status = 'idle',
                locked_until = NULL,
                locked_by = NULL
             WHERE id = $2",
        )
        .bind(message)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn lease_idle_for_planner(
        &self,
        worker_id: &str,
        ttl: Duration,
        limit: i64,
    ) -> Result<Vec<WalletBalance>, DatastoreError> {
        let rows = sqlx::query(
            "UPDATE wallet_balances SET
                locked_until = now() + ($1 * interval '1 second'),
                locked_by = $2
             WHERE id IN (
                SELECT wb.id FROM wallet_balances wb
                JOIN user_wallet_addresses uw ON uw.id = wb.wallet_id AND uw.is_active = true
                WHERE wb.processing_status = 'idle'
                  AND wb.on_chain_balance_raw <> '0'
                  AND (wb.locked_until IS NULL OR wb.locked_until < now())
                LIMIT $3
                FOR UPDATE OF wb SKIP LOCKED
             )
             RETURNING *",
        )
        .bind(ttl.num_seconds())
        .bind(worker_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(wallet_balance_from_row).collect()
    }

    async fn finalize_planner_row(
        &self,
        id: Uuid,
        needs_consolidation: bool,
        consolidation_priority: Priority,
        needs_gas: bool,
        gas_priority: Priority,
    ) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE wallet_balances SET
                needs_consolidation = $1,
                consolidation_priority = $2,
                needs_gas = $3,
                gas_priority = $4,
                locked_until = NULL,
                locked_by = NULL,
                last_error = NULL
             WHERE id = $5",
        )
        .bind(needs_consolidation)
        .bind(priority_str(consolidation_priority))
        .bind(needs_gas)
        .bind(priority_str(gas_priority))
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn record_planner_error(&self, id: Uuid, message: &str) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE wallet_balances SET
                last_error = $1,
                error_count = error_count + 1,
                locked_until = NULL,
                locked_by = NULL
             WHERE id = $2",
        )
        .bind(message)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn set_native_needs_gas(
        &self,
        id: Uuid,
        needs_gas: bool,
        priority: Priority,
    ) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE wallet_balances SET needs_gas = $1, gas_priority = $2 WHERE id = $3")
            .bind(needs_gas)
            .bind(priority_str(priority))
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn try_acquire_consolidation_lease(
        &self,
        id: Uuid,
        worker_id: &str,
        ttl: Duration,
    ) -> Result<bool, DatastoreError> {
        let result = sqlx::query(
            "UPDATE wallet_balances SET
                consolidation_locked_until = now() + ($1 * interval '1 second'),
                consolidation_locked_by = $2
             WHERE id = $3
               AND (consolidation_locked_until IS NULL OR consolidation_locked_until < now())",
        )
        .bind(ttl.num_seconds())
        .bind(worker_id)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn release_consolidation_lease(
        &self,
        id: Uuid,
        clear_needs: bool,
    ) -> Result<(), DatastoreError> {
        if clear_needs {
            sqlx::query(
                "UPDATE wallet_balances SET
                    consolidation_locked_until = NULL,
                    consolidation_locked_by = NULL,
                    needs_consolidation = false,
                    last_consolidation_at = now()
                 WHERE id = $1",
            )
            .bind(id)
            .execute(self.pool())
            .await?;
        } else {
            sqlx::query(
                "UPDATE wallet_balances SET
                    consolidation_locked_until = NULL,
                    consolidation_locked_by = NULL
                 WHERE id = $1",
            )
            .bind(id)
            .execute(self.pool())
            .await?;
        }
        Ok(())
    }

    async fn try_acquire_gas_lease(
        &self,
        id: Uuid,
        worker_id: &str,
        ttl: Duration,
    ) -> Result<bool, DatastoreError> {
        let result = sqlx::query(
            "UPDATE wallet_balances SET
                gas_locked_until = now() + ($1 * interval '1 second'),
                gas_locked_by = $2
             WHERE id = $3
               AND (gas_locked_until IS NULL OR gas_locked_until < now())",
        )
        .bind(ttl.num_seconds())
        .bind(worker_id)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn release_gas_lease(&self, id: Uuid) -> Result<(), DatastoreError> {
        sqlx::query(
            "UPDATE wallet_balances SET gas_locked_until = NULL, gas_locked_by = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
