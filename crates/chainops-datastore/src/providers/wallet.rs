use async_trait::async_trait;
use chainops_common::model::{OperationRole, OperationWalletAddress, UserWalletAddress, WalletAddress};
use uuid::Uuid;

use crate::error::DatastoreError;

/// Dual-table resolution (§9 "Dual-table wallet_id"): a `wallet_id` may point
/// into either the user or the operation wallet table, so both are probed.
#[async_trait]
pub trait WalletProvider {
    async fn resolve_wallet_address(
        &self,
        wallet_id: Uuid,
    ) -> Result<Option<WalletAddress>, DatastoreError>;

    async fn is_user_wallet(&self, wallet_id: Uuid) -> Result<bool, DatastoreError>;

    async fn list_active_user_wallet_ids(&self) -> Result<Vec<Uuid>, DatastoreError>;

    /// Case-normalized `address -> UserWalletAddress` map the detector keeps
    /// in memory between cycles (§4.4).
    async fn list_active_user_addresses_on_chain(
        &self,
        chain_id: Uuid,
    ) -> Result<Vec<UserWalletAddress>, DatastoreError>;
}

#[async_trait]
pub trait OperationWalletProvider {
    async fn get_operation_wallet(
        &self,
        id: Uuid,
    ) -> Result<Option<OperationWalletAddress>, DatastoreError>;

    /// Round-robin destination selection (§4.7): oldest `last_used_at` first,
    /// nulls first.
    async fn pick_round_robin(
        &self,
        chain_id: Uuid,
        role: OperationRole,
    ) -> Result<Option<OperationWalletAddress>, DatastoreError>;

    async fn touch_last_used(&self, id: Uuid) -> Result<(), DatastoreError>;
}
