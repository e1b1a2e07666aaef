use async_trait::async_trait;
use chainops_common::model::{ConsolidationRule, GasTopupRule, RuleLogEntry};
use uuid::Uuid;

use crate::error::DatastoreError;

#[async_trait]
pub trait RuleProvider {
    async fn list_active_gas_rules(
        &self,
        chain_id: Uuid,
        gas_asset_on_chain_id: Uuid,
    ) -> Result<Vec<GasTopupRule>, DatastoreError>;

    /// Ordered by priority descending (§4.7 step 2).
    async fn list_active_consolidation_rules(
        &self,
        chain_id: Uuid,
        asset_on_chain_id: Uuid,
    ) -> Result<Vec<ConsolidationRule>, DatastoreError>;
}

/// Append-only audit of every rule evaluation (§3 `RuleLogs`).
#[async_trait]
pub trait RuleLogProvider {
    async fn append(&self, entry: RuleLogEntry) -> Result<(), DatastoreError>;
}
