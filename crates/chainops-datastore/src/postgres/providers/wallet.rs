use async_trait::async_trait;
use chainops_common::model::{OperationRole, OperationWalletAddress, UserWalletAddress, WalletAddress};
use sqlx::Row;
use uuid::Uuid;

use crate::error::DatastoreError;
use crate::postgres::rows::{operation_wallet_from_row, user_wallet_from_row};
use crate::postgres::PgDatastore;
use crate::providers::{OperationWalletProvider, WalletProvider};

fn role_str(role: OperationRole) -> &'static str {
    match role {
        OperationRole::Gas => "gas",
        OperationRole::Hot => "hot",
        OperationRole::Treasury => "treasury",
    }
}

#[async_trait]
impl WalletProvider for PgDatastore {
    async fn resolve_wallet_address(
        &self,
        wallet_id: Uuid,
    ) -> Result<Option<WalletAddress>, DatastoreError> {
        let row = sqlx::query("SELECT * FROM user_wallet_addresses WHERE id = $1")
            .bind(wallet_id)
            .fetch_optional(self.pool())
            .await?;
        if let Some(row) = row {
            return Ok(Some(WalletAddress::User(user_wallet_from_row(&row)?)));
        }

        let row = sqlx::query("SELECT * FROM operation_wallet_addresses WHERE id = $1")
            .bind(wallet_id)
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| operation_wallet_from_row(&r).map(WalletAddress::Operation))
            .transpose()
    }

    async fn is_user_wallet(&self, wallet_id: Uuid) -> Result<bool, DatastoreError> {
        let row = sqlx::query("SELECT 1 FROM user_wallet_addresses WHERE id = $1")
            .bind(wallet_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.is_some())
    }

    async fn list_active_user_wallet_ids(&self) -> Result<Vec<Uuid>, DatastoreError> {
        let rows = sqlx::query("SELECT id FROM user_wallet_addresses WHERE is_active = true")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn list_active_user_addresses_on_chain(
        &self,
        chain_id: Uuid,
    ) -> Result<Vec<UserWalletAddress>, DatastoreError> {
        let rows = sqlx::query(
            "SELECT * FROM user_wallet_addresses WHERE chain_id = $1 AND is_active = true",
        )
        .bind(chain_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(user_wallet_from_row).collect()
    }
}

#[async_trait]
impl OperationWalletProvider for PgDatastore {
    async fn get_operation_wallet(
        &self,
        id: Uuid,
    ) -> Result<Option<OperationWalletAddress>, DatastoreError> {
        let row = sqlx::query("SELECT * FROM operation_wallet_addresses WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(operation_wallet_from_row).transpose()
    }

    async fn pick_round_robin(
        &self,
        chain_id: Uuid,
        role: OperationRole,
    ) -> Result<Option<OperationWalletAddress>, DatastoreError> {
        let row = sqlx::query(
            "SELECT * FROM operation_wallet_addresses
             WHERE chain_id = $1 AND role = $2 AND is_active = true
             ORDER BY last_used_at ASC NULLS FIRST
             LIMIT 1",
        )
        .bind(chain_id)
        .bind(role_str(role))
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(operation_wallet_from_row).transpose()
    }

    async fn touch_last_used(&self, id: Uuid) -> Result<(), DatastoreError> {
        sqlx::query("UPDATE operation_wallet_addresses SET last_used_at = now() WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
