use async_trait::async_trait;
use chainops_common::model::{AssetOnChain, Chain};
use uuid::Uuid;

use crate::error::DatastoreError;

/// Reload-on-boot cache source (§3: "Immutable during a run; reloaded at boot").
#[async_trait]
pub trait ChainProvider {
    async fn list_active_chains(&self) -> Result<Vec<Chain>, DatastoreError>;
    async fn get_chain(&self, id: Uuid) -> Result<Option<Chain>, DatastoreError>;
}

#[async_trait]
pub trait AssetProvider {
    async fn list_active_assets_on_chain(
        &self,
        chain_id: Uuid,
    ) -> Result<Vec<AssetOnChain>, DatastoreError>;

    async fn get_asset_on_chain(&self, id: Uuid) -> Result<Option<AssetOnChain>, DatastoreError>;

    /// Exactly one per active chain (§3 invariant).
    async fn get_native_asset_on_chain(
        &self,
        chain_id: Uuid,
    ) -> Result<Option<AssetOnChain>, DatastoreError>;
}

/// `WorkerChainState` (§3): one monotonic cursor per chain (P4).
#[async_trait]
pub trait ChainCursorProvider {
    async fn get_last_processed_block(&self, chain_id: Uuid) -> Result<Option<u64>, DatastoreError>;

    /// No-op if `to` is not greater than the stored value; callers rely on
    /// this to preserve P4 even under concurrent detectors.
    async fn advance_last_processed_block(
        &self,
        chain_id: Uuid,
        to: u64,
    ) -> Result<(), DatastoreError>;
}
