use async_trait::async_trait;
use chainops_common::model::AssetOnChain;

use crate::error::ChainError;

/// A transfer surfaced by `get_transfer_logs`, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransfer {
    pub tx_hash: String,
    pub log_index: i64,
    pub from_address: String,
    pub to_address: String,
    pub amount_raw: String,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub block_number: u64,
    pub success: bool,
    pub gas_used: Option<String>,
    pub gas_price: Option<String>,
}

/// Capability set shared by every chain family (§4.1, §9 "Polymorphism over
/// chains"). Stateless: no field here survives a restart, all cursor state
/// lives in the datastore.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    fn family_name(&self) -> &'static str;

    async fn current_block(&self) -> Result<u64, ChainError>;

    async fn get_transfer_logs(
        &self,
        asset: &AssetOnChain,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawTransfer>, ChainError>;

    async fn get_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, ChainError>;

    async fn get_native_balance(&self, address: &str) -> Result<String, ChainError>;

    async fn get_token_balance(&self, contract: &str, address: &str) -> Result<String, ChainError>;

    /// `current_block - tx_block + 1` (§4.1), the same formula for every
    /// chain family this backplane supports.
    fn compute_confirmations(&self, tx_block: u64, current_block: u64) -> u64 {
        current_block.saturating_sub(tx_block).saturating_add(1)
    }

    fn format_amount(&self, raw: &str, decimals: u32) -> Result<String, ChainError> {
        chainops_common::decimal::raw_to_human(raw, decimals)
            .map_err(|e| ChainError::InvalidData(e.to_string()))
    }

    /// Case-normalized address equality, used by the detector to match a
    /// transfer's `to` against the monitored-address map (§4.4).
    fn normalize_address(&self, address: &str) -> String;
}
