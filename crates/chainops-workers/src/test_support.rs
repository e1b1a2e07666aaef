//! Shared test fixtures for the worker-cycle unit tests (§8 "ADDED test
//! tooling"): a scriptable `ChainAdapter` fake plus small constructors for
//! the model rows every cycle test needs to assemble by hand.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chainops_chain::{ChainAdapter, RawTransfer, TxReceipt};
use chainops_common::model::*;
use chrono::Duration;
use uuid::Uuid;

/// A `ChainAdapter` driven entirely by in-memory scripting: a fixed current
/// block, a canned transfer list per asset, and a canned receipt per hash.
/// No network access, no retries — the point is to drive detector and
/// confirmation cycles deterministically.
#[derive(Default)]
pub struct FakeAdapter {
    pub current_block: u64,
    transfers: Mutex<HashMap<Uuid, Vec<RawTransfer>>>,
    receipts: Mutex<HashMap<String, TxReceipt>>,
}

impl FakeAdapter {
    pub fn new(current_block: u64) -> Self {
        Self { current_block, ..Default::default() }
    }

    pub fn with_transfers(self, asset_id: Uuid, transfers: Vec<RawTransfer>) -> Self {
        self.transfers.lock().unwrap().insert(asset_id, transfers);
        self
    }

    pub fn with_receipt(self, tx_hash: &str, receipt: TxReceipt) -> Self {
        self.receipts.lock().unwrap().insert(tx_hash.to_string(), receipt);
        self
    }
}

#[async_trait]
impl ChainAdapter for FakeAdapter {
    fn family_name(&self) -> &'static str {
        "fake"
    }

    async fn current_block(&self) -> Result<u64, chainops_chain::ChainError> {
        Ok(self.current_block)
    }

    async fn get_transfer_logs(
        &self,
        asset: &AssetOnChain,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawTransfer>, chainops_chain::ChainError> {
        let all = self.transfers.lock().unwrap().get(&asset.id).cloned().unwrap_or_default();
        Ok(all
            .into_iter()
            .filter(|t| t.block_number >= from_block && t.block_number <= to_block)
            .collect())
    }

    async fn get_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, chainops_chain::ChainError> {
        Ok(self.receipts.lock().unwrap().get(tx_hash).cloned())
    }

    async fn get_native_balance(&self, _address: &str) -> Result<String, chainops_chain::ChainError> {
        Ok("0".to_string())
    }

    async fn get_token_balance(&self, _contract: &str, _address: &str) -> Result<String, chainops_chain::ChainError> {
        Ok("0".to_string())
    }

    fn normalize_address(&self, address: &str) -> String {
        address.to_lowercase()
    }
}

pub fn tron_chain(confirmation_threshold: u64) -> Chain {
    Chain {
        id: Uuid::new_v4(),
        name: "tron".to_string(),
        family: ChainFamily::Tron,
        rpc_url: "http://localhost".to_string(),
        confirmation_threshold,
        block_time_seconds: 3,
        chain_id: None,
        is_active: true,
    }
}

pub fn evm_chain(confirmation_threshold: u64) -> Chain {
    Chain {
        id: Uuid::new_v4(),
        name: "bsc".to_string(),
        family: ChainFamily::Evm,
        rpc_url: "http://localhost".to_string(),
        confirmation_threshold,
        block_time_seconds: 3,
        chain_id: Some(56),
        is_active: true,
    }
}

pub fn asset_on_chain(chain_id: Uuid, decimals: u32, is_native: bool) -> AssetOnChain {
    AssetOnChain {
        id: Uuid::new_v4(),
        chain_id,
        asset_id: Uuid::new_v4(),
        contract_address: if is_native { None } else { Some("0xcontract".to_string()) },
        decimals,
        is_native,
        is_active: true,
    }
}

pub fn user_wallet(chain_id: Uuid, address: &str) -> UserWalletAddress {
    UserWalletAddress {
        id: Uuid::new_v4(),
        uid: Uuid::new_v4(),
        chain_id,
        address: address.to_string(),
        wallet_group_id: "group-0".to_string(),
        derivation_index: 0,
        is_active: true,
    }
}

pub fn operation_wallet(chain_id: Uuid, role: OperationRole, address: &str) -> OperationWalletAddress {
    OperationWalletAddress {
        id: Uuid::new_v4(),
        chain_id,
        role,
        wallet_group_id: "ops-group".to_string(),
        derivation_index: 0,
        address: address.to_string(),
        is_active: true,
        last_used_at: None,
    }
}

pub fn idle_wallet_balance(wallet_id: Uuid, asset_on_chain_id: Uuid, balance_human: &str) -> WalletBalance {
    WalletBalance {
        id: Uuid::new_v4(),
        wallet_id,
        asset_on_chain_id,
        on_chain_balance_raw: balance_human.replace('.', ""),
        on_chain_balance_human: balance_human.to_string(),
        processing_status: ProcessingStatus::Idle,
        general_lease: Lease::default(),
        consolidation_lease: Lease::default(),
        gas_lease: Lease::default(),
        needs_consolidation: false,
        consolidation_priority: Priority::Unknown,
        needs_gas: false,
        gas_priority: Priority::Unknown,
        sync_count: 0,
        error_count: 0,
        last_error: None,
        last_checked: None,
        last_processed_at: None,
        last_consolidation_at: None,
    }
}

pub fn gas_rule(chain_id: Uuid, gas_asset_on_chain_id: Uuid, operator: &str, threshold: &str, topup: &str) -> GasTopupRule {
    GasTopupRule {
        id: Uuid::new_v4(),
        chain_id,
        gas_asset_on_chain_id,
        operator: operator.to_string(),
        threshold_human: threshold.to_string(),
        topup_amount_human: topup.to_string(),
        priority: Priority::High,
        is_active: true,
        metadata: None,
    }
}

pub fn consolidation_rule(chain_id: Uuid, asset_on_chain_id: Uuid, operator: &str, threshold: &str) -> ConsolidationRule {
    ConsolidationRule {
        id: Uuid::new_v4(),
        chain_id,
        asset_on_chain_id,
        operator: operator.to_string(),
        threshold_human: threshold.to_string(),
        priority: Priority::Normal,
        is_active: true,
    }
}

pub fn lease_ttl() -> Duration {
    Duration::seconds(120)
}
