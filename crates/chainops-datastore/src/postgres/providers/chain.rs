use async_trait::async_trait;
use chainops_common::model::{AssetOnChain, Chain};
use sqlx::Row;
use uuid::Uuid;

use crate::error::DatastoreError;
use crate::postgres::rows::{asset_on_chain_from_row, chain_from_row};
use crate::postgres::PgDatastore;
use crate::providers::{AssetProvider, ChainCursorProvider, ChainProvider};

#[async_trait]
impl ChainProvider for PgDatastore {
    async fn list_active_chains(&self) -> Result<Vec<Chain>, DatastoreError> {
        let rows = sqlx::query("SELECT * FROM chains WHERE is_active = true")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(chain_from_row).collect()
    }

    async fn get_chain(&self, id: Uuid) -> Result<Option<Chain>, DatastoreError> {
        let row = sqlx::query("SELECT * FROM chains WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(chain_from_row).transpose()
    }
}

#[async_trait]
impl AssetProvider for PgDatastore {
    async fn list_active_assets_on_chain(
        &self,
        chain_id: Uuid,
    ) -> Result<Vec<AssetOnChain>, DatastoreError> {
        let rows = sqlx::query("SELECT * FROM assets_on_chain WHERE chain_id = $1 AND is_active = true")
            .bind(chain_id)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(asset_on_chain_from_row).collect()
    }

    async fn get_asset_on_chain(&self, id: Uuid) -> Result<Option<AssetOnChain>, DatastoreError> {
        let row = sqlx::query("SELECT * FROM assets_on_chain WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(asset_on_chain_from_row).transpose()
    }

    async fn get_native_asset_on_chain(
        &self,
        chain_id: Uuid,
    ) -> Result<Option<AssetOnChain>, DatastoreError> {
        let row = sqlx::query(
            "SELECT * FROM assets_on_chain WHERE chain_id = $1 AND is_native = true AND is_active = true",
        )
        .bind(chain_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(asset_on_chain_from_row).transpose()
    }
}

#[async_trait]
impl ChainCursorProvider for PgDatastore {
    async fn get_last_processed_block(&self, chain_id: Uuid) -> Result<Option<u64>, DatastoreError> {
        let row = sqlx::query("SELECT last_processed_block FROM worker_chain_state WHERE chain_id = $1")
            .bind(chain_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("last_processed_block") as u64))
    }

    async fn advance_last_processed_block(
        &self,
        chain_id: Uuid,
        to: u64,
    ) -> Result<(), DatastoreError> {
        sqlx::query(
            "INSERT INTO worker_chain_state (chain_id, last_processed_block) VALUES ($1, $2)
             ON CONFLICT (chain_id) DO UPDATE
             SET last_processed_block = GREATEST(worker_chain_state.last_processed_block, EXCLUDED.last_processed_block)",
        )
        .bind(chain_id)
        .bind(to as i64)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}
