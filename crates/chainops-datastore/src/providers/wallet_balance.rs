use async_trait::async_trait;
use chainops_common::model::{Priority, WalletBalance};
use chrono::Duration;
use uuid::Uuid;

use crate::error::DatastoreError;

/// Operations on `WalletBalance` rows, split by the discipline that owns
/// each field group (§5 "Shared resources"): balance-sync owns the balance
/// fields, the planner owns `needs_*`/priorities, and each of the three
/// lease families is owned by its respective workers.
#[async_trait]
pub trait WalletBalanceProvider {
    async fn get_wallet_balance(&self, id: Uuid) -> Result<Option<WalletBalance>, DatastoreError>;

    async fn get_wallet_balance_by_wallet_asset(
        &self,
        wallet_id: Uuid,
        asset_on_chain_id: Uuid,
    ) -> Result<Option<WalletBalance>, DatastoreError>;

    /// Acquires the general lease on up to `limit` idle rows, oldest
    /// `last_checked` first (§4.6). Returns only the rows this call won.
    async fn lease_idle_for_sync(
        &self,
        worker_id: &str,
        ttl: Duration,
        limit: i64,
    ) -> Result<Vec<WalletBalance>, DatastoreError>;

    async fn write_sync_result(
        &self,
        id: Uuid,
        on_chain_balance_raw: &str,
        on_chain_balance_human: &str,
    ) -> Result<(), DatastoreError>;

    async fn record_sync_error(&self, id: Uuid, message: &str) -> Result<(), DatastoreError>;

    /// Acquires the general lease on idle, non-zero, user-owned rows
    /// (§4.7). Membership is re-checked at row level by the caller.
    async fn lease_idle_for_planner(
        &self,
        worker_id: &str,
        ttl: Duration,
        limit: i64,
    ) -> Result<Vec<WalletBalance>, DatastoreError>;

    async fn finalize_planner_row(
        &self,
        id: Uuid,
        needs_consolidation: bool,
        consolidation_priority: Priority,
        needs_gas: bool,
        gas_priority: Priority,
    ) -> Result<(), DatastoreError>;

    async fn record_planner_error(&self, id: Uuid, message: &str) -> Result<(), DatastoreError>;

    /// Sets `needs_gas`/`gas_priority` on a native-asset row (§4.7 step 2).
    async fn set_native_needs_gas(
        &self,
        id: Uuid,
        needs_gas: bool,
        priority: Priority,
    ) -> Result<(), DatastoreError>;

    async fn try_acquire_consolidation_lease(
        &self,
        id: Uuid,
        worker_id: &str,
        ttl: Duration,
    ) -> Result<bool, DatastoreError>;

    /// `clear_needs` is set by the consolidation-confirmation worker on
    /// terminal success only (§4.11).
    async fn release_consolidation_lease(
        &self,
        id: Uuid,
        clear_needs: bool,
    ) -> Result<(), DatastoreError>;

    async fn try_acquire_gas_lease(
        &self,
        id: Uuid,
        worker_id: &str,
        ttl: Duration,
    ) -> Result<bool, DatastoreError>;

    async fn release_gas_lease(&self, id: Uuid) -> Result<(), DatastoreError>;
}
