//! An in-memory `Datastore` fake used by worker-logic tests so the queue
//! state machines, leases and idempotency invariants can be exercised
//! without a live Postgres instance (§2 "Test tooling", grounded on the
//! teacher's `daemon/src/core/tests/mock_storage.rs`-style in-memory
//! fixture). Not used outside `#[cfg(test)]` call sites in this workspace,
//! but kept unconditionally compiled so downstream crates can reuse it in
//! their own tests too.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chainops_common::model::*;
use chainops_common::time::now;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::DatastoreError;
use crate::providers::*;

#[derive(Default)]
struct State {
    chains: HashMap<Uuid, Chain>,
    assets: HashMap<Uuid, AssetOnChain>,
    cursors: HashMap<Uuid, u64>,
    user_wallets: HashMap<Uuid, UserWalletAddress>,
    op_wallets: HashMap<Uuid, OperationWalletAddress>,
    wallet_balances: HashMap<Uuid, WalletBalance>,
    deposits: HashMap<Uuid, Deposit>,
    consolidation_queue: HashMap<Uuid, ConsolidationJob>,
    gas_queue: HashMap<Uuid, GasTopupJob>,
    withdrawal_requests: HashMap<Uuid, WithdrawalRequest>,
    withdrawal_queue: HashMap<Uuid, WithdrawalJob>,
    gas_rules: Vec<GasTopupRule>,
    consolidation_rules: Vec<ConsolidationRule>,
    rule_logs: Vec<RuleLogEntry>,
    worker_status: HashMap<String, WorkerStatus>,
    executions: Vec<ExecutionLogEntry>,
    incident_mode: IncidentMode,
    maintenance: bool,
    credit_ledger: HashMap<(Uuid, Uuid), Decimal>,
    evm_locks: std::collections::HashSet<String>,
}

/// An in-process `Datastore`. All state lives behind a single `Mutex` —
/// simplicity over throughput, since this exists purely to drive
/// single-threaded worker-logic tests deterministically.
pub struct InMemoryDatastore {
    state: std::sync::Arc<Mutex<State>>,
}

impl Default for InMemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self {
            state: std::sync::Arc::new(Mutex::new(State::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("in-memory datastore mutex poisoned")
    }

    pub fn insert_chain(&self, chain: Chain) {
        self.lock().chains.insert(chain.id, chain);
    }

    pub fn insert_asset(&self, asset: AssetOnChain) {
        self.lock().assets.insert(asset.id, asset);
    }

    pub fn insert_user_wallet(&self, wallet: UserWalletAddress) {
        self.lock().user_wallets.insert(wallet.id, wallet);
    }

    pub fn insert_operation_wallet(&self, wallet: OperationWalletAddress) {
        self.lock().op_wallets.insert(wallet.id, wallet);
    }

    pub fn insert_wallet_balance(&self, balance: WalletBalance) {
        self.lock().wallet_balances.insert(balance.id, balance);
    }

    pub fn insert_gas_rule(&self, rule: GasTopupRule) {
        self.lock().gas_rules.push(rule);
    }

    pub fn insert_consolidation_rule(&self, rule: ConsolidationRule) {
        self.lock().consolidation_rules.push(rule);
    }

    pub fn rule_log_count(&self) -> usize {
        self.lock().rule_logs.len()
    }

    pub fn credit_ledger_entry(&self, uid: Uuid, asset_on_chain_id: Uuid) -> Option<Decimal> {
        self.lock().credit_ledger.get(&(uid, asset_on_chain_id)).copied()
    }
}

#[async_trait]
impl ChainProvider for InMemoryDatastore {
    async fn list_active_chains(&self) -> Result<Vec<Chain>, DatastoreError> {
        Ok(self.lock().chains.values().filter(|c| c.is_active).cloned().collect())
    }

    async fn get_chain(&self, id: Uuid) -> Result<Option<Chain>, DatastoreError> {
        Ok(self.lock().chains.get(&id).cloned())
    }
}

#[async_trait]
impl AssetProvider for InMemoryDatastore {
    async fn list_active_assets_on_chain(&self, chain_id: Uuid) -> Result<Vec<AssetOnChain>, DatastoreError> {
        Ok(self
            .lock()
            .assets
            .values()
            .filter(|a| a.chain_id == chain_id && a.is_active)
            .cloned()
            .collect())
    }

    async fn get_asset_on_chain(&self, id: Uuid) -> Result<Option<AssetOnChain>, DatastoreError> {
        Ok(self.lock().assets.get(&id).cloned())
    }

    async fn get_native_asset_on_chain(&self, chain_id: Uuid) -> Result<Option<AssetOnChain>, DatastoreError> {
        Ok(self
            .lock()
            .assets
            .values()
            .find(|a| a.chain_id == chain_id && a.is_native && a.is_active)
            .cloned())
    }
}

#[async_trait]
impl ChainCursorProvider for InMemoryDatastore {
    async fn get_last_processed_block(&self, chain_id: Uuid) -> Result<Option<u64>, DatastoreError> {
        Ok(self.lock().cursors.get(&chain_id).copied())
    }

    async fn advance_last_processed_block(&self, chain_id: Uuid, to: u64) -> Result<(), DatastoreError> {
        let mut state = self.lock();
        let entry = state.cursors.entry(chain_id).or_insert(0);
        if to > *entry {
            *entry = to;
        }
        Ok(())
    }
}

#[async_trait]
impl WalletProvider for InMemoryDatastore {
    async fn resolve_wallet_address(&self, wallet_id: Uuid) -> Result<Option<WalletAddress>, DatastoreError> {
        let state = self.lock();
        if let Some(w) = state.user_wallets.get(&wallet_id) {
            return Ok(Some(WalletAddress::User(w.clone())));
        }
        Ok(state.op_wallets.get(&wallet_id).cloned().map(WalletAddress::Operation))
    }

    async fn is_user_wallet(&self, wallet_id: Uuid) -> Result<bool, DatastoreError> {
        Ok(self.lock().user_wallets.contains_key(&wallet_id))
    }

    async fn list_active_user_wallet_ids(&self) -> Result<Vec<Uuid>, DatastoreError> {
        Ok(self
            .lock()
            .user_wallets
            .values()
            .filter(|w| w.is_active)
            .map(|w| w.id)
            .collect())
    }

    async fn list_active_user_addresses_on_chain(
        &self,
        chain_id: Uuid,
    ) -> Result<Vec<UserWalletAddress>, DatastoreError> {
        Ok(self
            .lock()
            .user_wallets
            .values()
            .filter(|w| w.chain_id == chain_id && w.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl OperationWalletProvider for InMemoryDatastore {
    async fn get_operation_wallet(&self, id: Uuid) -> Result<Option<OperationWalletAddress>, DatastoreError> {
        Ok(self.lock().op_wallets.get(&id).cloned())
    }

    async fn pick_round_robin(
        &self,
        chain_id: Uuid,
        role: OperationRole,
    ) -> Result<Option<OperationWalletAddress>, DatastoreError> {
        let state = self.lock();
        Ok(state
            .op_wallets
            .values()
            .filter(|w| w.chain_id == chain_id && w.role == role && w.is_active)
            .min_by_key(|w| w.last_used_at.map(|t| t.timestamp_micros()).unwrap_or(i64::MIN))
            .cloned())
    }

    async fn touch_last_used(&self, id: Uuid) -> Result<(), DatastoreError> {
        if let Some(w) = self.lock().op_wallets.get_mut(&id) {
            w.last_used_at = Some(now());
        }
        Ok(())
    }
}

#[async_trait]
impl WalletBalanceProvider for InMemoryDatastore {
    async fn get_wallet_balance(&self, id: Uuid) -> Result<Option<WalletBalance>, DatastoreError> {
        Ok(self.lock().wallet_balances.get(&id).cloned())
    }

    async fn get_wallet_balance_by_wallet_asset(
        &self,
        wallet_id: Uuid,
        asset_on_chain_id: Uuid,
    ) -> Result<Option<WalletBalance>, DatastoreError> {
        Ok(self
            .lock()
            .wallet_balances
            .values()
            .find(|b| b.wallet_id == wallet_id && b.asset_on_chain_id == asset_on_chain_id)
            .cloned())
    }

    async fn lease_idle_for_sync(
        &self,
        worker_id: &str,
        ttl: Duration,
        limit: i64,
    ) -> Result<Vec<WalletBalance>, DatastoreError> {
        let mut state = self.lock();
        let t = now();
        let mut ids: Vec<Uuid> = state
            .wallet_balances
            .values()
            .filter(|b| b.processing_status == ProcessingStatus::Idle && b.general_lease.is_free(t))
            .map(|b| b.id)
            .collect();
        ids.sort_by_key(|id| {
            state
                .wallet_balances
                .get(id)
                .and_then(|b| b.last_checked)
                .map(|t| t.timestamp_micros())
                .unwrap_or(i64::MIN)
        });
        ids.truncate(limit.max(0) as usize);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let b = state.wallet_balances.get_mut(&id).unwrap();
            b.general_lease = Lease::acquire(worker_id, t, ttl);
            b.processing_status = ProcessingStatus::Processing;
            out.push(b.clone());
        }
        Ok(out)
    }

    async fn write_sync_result(
        &self,
        id: Uuid,
        on_chain_balance_raw: &str,
        on_chain_balance_human: &str,
    ) -> Result<(), DatastoreError> {
        if let Some(b) = self.lock().wallet_balances.get_mut(&id) {
            b.on_chain_balance_raw = on_chain_balance_raw.to_string();
            b.on_chain_balance_human = on_chain_balance_human.to_string();
            b.sync_count += 1;
            b.last_checked = Some(now());
            b.last_error = None;
            b.processing_status = ProcessingStatus::Idle;
            b.general_lease = Lease::release();
        }
        Ok(())
    }

    async fn record_sync_error(&self, id: Uuid, message: &str) -> Result<(), DatastoreError> {
        if let Some(b) = self.lock().wallet_balances.get_mut(&id) {
            b.last_error = Some(message.to_string());
            b.error_count += 1;
            b.processing_status = ProcessingStatus::Idle;
            b.general_lease = Lease::release();
        }
        Ok(())
    }

    async fn lease_idle_for_planner(
        &self,
        worker_id: &str,
        ttl: Duration,
        limit: i64,
    ) -> Result<Vec<WalletBalance>, DatastoreError> {
        let mut state = self.lock();
        let t = now();
        let user_wallet_ids: std::collections::HashSet<Uuid> = state
            .user_wallets
            .values()
            .filter(|w| w.is_active)
            .map(|w| w.id)
            .collect();
        let mut ids: Vec<Uuid> = state
            .wallet_balances
            .values()
            .filter(|b| {
                b.processing_status == ProcessingStatus::Idle
                    && b.on_chain_balance_raw != "0"
                    && b.general_lease.is_free(t)
                    && user_wallet_ids.contains(&b.wallet_id)
            })
            .map(|b| b.id)
            .collect();
        ids.truncate(limit.max(0) as usize);
        let mut out = Vec::with_capacity(ids.len());
        for id in &ids {
            let b = state.wallet_balances.get_mut(id).unwrap();
            b.general_lease = Lease::acquire(worker_id, t, ttl);
            out.push(b.clone());
        }
        Ok(out)
    }

    async fn finalize_planner_row(
        &self,
        id: Uuid,
        needs_consolidation: bool,
        consolidation_priority: Priority,
        needs_gas: bool,
        gas_priority: Priority,
    ) -> Result<(), DatastoreError> {
        if let Some(b) = self.lock().wallet_balances.get_mut(&id) {
            b.needs_consolidation = needs_consolidation;
            b.consolidation_priority = consolidation_priority;
            b.needs_gas = needs_gas;
            b.gas_priority = gas_priority;
            b.general_lease = Lease::release();
            b.last_error = None;
        }
        Ok(())
    }

    async fn record_planner_error(&self, id: Uuid, message: &str) -> Result<(), DatastoreError> {
        if let Some(b) = self.lock().wallet_balances.get_mut(&id) {
            b.last_error = Some(message.to_string());
            b.error_count += 1;
            b.general_lease = Lease::release();
        }
        Ok(())
    }

    async fn set_native_needs_gas(&self, id: Uuid, needs_gas: bool, priority: Priority) -> Result<(), DatastoreError> {
        if let Some(b) = self.lock().wallet_balances.get_mut(&id) {
            b.needs_gas = needs_gas;
            b.gas_priority = priority;
        }
        Ok(())
    }

    async fn try_acquire_consolidation_lease(
        &self,
        id: Uuid,
        worker_id: &str,
        ttl: Duration,
    ) -> Result<bool, DatastoreError> {
        let mut state = self.lock();
        let t = now();
        match state.wallet_balances.get_mut(&id) {
            Some(b) if b.consolidation_lease.is_free(t) => {
                b.consolidation_lease = Lease::acquire(worker_id, t, ttl);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn release_consolidation_lease(&self, id: Uuid, clear_needs: bool) -> Result<(), DatastoreError> {
        if let Some(b) = self.lock().wallet_balances.get_mut(&id) {
            b.consolidation_lease = Lease::release();
            if clear_needs {
                b.needs_consolidation = false;
                b.last_consolidation_at = Some(now());
            }
        }
        Ok(())
    }

    async fn try_acquire_gas_lease(&self, id: Uuid, worker_id: &str, ttl: Duration) -> Result<bool, DatastoreError> {
        let mut state = self.lock();
        let t = now();
        match state.wallet_balances.get_mut(&id) {
            Some(b) if b.gas_lease.is_free(t) => {
                b.gas_lease = Lease::acquire(worker_id, t, ttl);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn release_gas_lease(&self, id: Uuid) -> Result<(), DatastoreError> {
        if let Some(b) = self.lock().wallet_balances.get_mut(&id) {
            b.gas_lease = Lease::release();
        }
        Ok(())
    }
}

#[async_trait]
impl DepositProvider for InMemoryDatastore {
    async fn insert_pending_if_absent(&self, deposit: NewDeposit) -> Result<bool, DatastoreError> {
        let mut state = self.lock();
        let exists = state
            .deposits
            .values()
            .any(|d| d.tx_hash == deposit.tx_hash && d.log_index == deposit.log_index);
        if exists {
            return Ok(false);
        }
        let id = Uuid::new_v4();
        state.deposits.insert(
            id,
            Deposit {
                id,
                chain_id: deposit.chain_id,
                asset_on_chain_id: deposit.asset_on_chain_id,
                tx_hash: deposit.tx_hash,
                log_index: deposit.log_index,
                from_address: deposit.from_address,
                to_address: deposit.to_address,
                amount_raw: deposit.amount_raw,
                amount_human: deposit.amount_human,
                block_number: deposit.block_number,
                first_seen_block: deposit.block_number,
                status: DepositStatus::Pending,
                confirmations: 0,
                confirmed_at: None,
                credited_at: None,
            },
        );
        Ok(true)
    }

    async fn get_by_tx_log(&self, tx_hash: &str, log_index: i64) -> Result<Option<Deposit>, DatastoreError> {
        Ok(self
            .lock()
            .deposits
            .values()
            .find(|d| d.tx_hash == tx_hash && d.log_index == log_index)
            .cloned())
    }

    async fn list_pending_oldest_first(&self, chain_id: Uuid, limit: i64) -> Result<Vec<Deposit>, DatastoreError> {
        let state = self.lock();
        let mut rows: Vec<Deposit> = state
            .deposits
            .values()
            .filter(|d| d.chain_id == chain_id && d.status == DepositStatus::Pending)
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.block_number);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn update_confirmations(&self, id: Uuid, confirmations: u64) -> Result<(), DatastoreError> {
        if let Some(d) = self.lock().deposits.get_mut(&id) {
            d.confirmations = confirmations;
        }
        Ok(())
    }

    async fn try_mark_confirmed(&self, id: Uuid) -> Result<bool, DatastoreError> {
        let mut state = self.lock();
        match state.deposits.get_mut(&id) {
            Some(d) if d.status == DepositStatus::Pending => {
                d.status = DepositStatus::Confirmed;
                d.confirmed_at = Some(now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_credited(&self, id: Uuid) -> Result<(), DatastoreError> {
        if let Some(d) = self.lock().deposits.get_mut(&id) {
            d.credited_at = Some(now());
        }
        Ok(())
    }

    async fn list_confirmed_uncredited(&self, chain_id: Uuid, limit: i64) -> Result<Vec<Deposit>, DatastoreError> {
        let state = self.lock();
        let mut rows: Vec<Deposit> = state
            .deposits
            .values()
            .filter(|d| d.chain_id == chain_id && d.status == DepositStatus::Confirmed && d.credited_at.is_none())
            .cloned()
            .collect();
        rows.sort_by_key(|d| d.block_number);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[async_trait]
impl ConsolidationQueueProvider for InMemoryDatastore {
    async fn has_active_job(&self, wallet_balance_id: Uuid) -> Result<bool, DatastoreError> {
        Ok(self
            .lock()
            .consolidation_queue
            .values()
            .any(|j| j.wallet_balance_id == wallet_balance_id && j.status.is_active()))
    }

    async fn enqueue(&self, job: NewConsolidationJob) -> Result<bool, DatastoreError> {
        let mut state = self.lock();
        let active = state
            .consolidation_queue
            .values()
            .any(|j| j.wallet_balance_id == job.wallet_balance_id && j.status.is_active());
        if active {
            return Ok(false);
        }
        let id = Uuid::new_v4();
        state.consolidation_queue.insert(
            id,
            ConsolidationJob {
                id,
                chain_id: job.chain_id,
                wallet_id: job.wallet_id,
                wallet_balance_id: job.wallet_balance_id,
                destination_wallet_id: job.destination_wallet_id,
                amount_raw: job.amount_raw,
                amount_human: job.amount_human,
                status: ExecutionStatus::Pending,
                priority: job.priority,
                tx_hash: None,
                retry_count: 0,
                error_message: None,
                scheduled_at: now(),
                processed_at: None,
                gas_used: None,
                gas_price: None,
            },
        );
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ConsolidationJob>, DatastoreError> {
        Ok(self.lock().consolidation_queue.get(&id).cloned())
    }

    async fn pick_candidates(&self, chain_id: Uuid, limit: i64) -> Result<Vec<ConsolidationJob>, DatastoreError> {
        let state = self.lock();
        let t = now();
        let mut rows: Vec<ConsolidationJob> = state
            .consolidation_queue
            .values()
            .filter(|j| {
                j.chain_id == chain_id
                    && matches!(j.status, ExecutionStatus::Pending | ExecutionStatus::Confirming)
                    && j.scheduled_at <= t
            })
            .cloned()
            .collect();
        rows.sort_by_key(|j| (j.priority.rank(), j.scheduled_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().consolidation_queue.get_mut(&id) {
            j.status = ExecutionStatus::Processing;
        }
        Ok(())
    }

    async fn mark_broadcast(&self, id: Uuid, tx_hash: &str) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().consolidation_queue.get_mut(&id) {
            if j.tx_hash.is_none() {
                j.tx_hash = Some(tx_hash.to_string());
                j.status = ExecutionStatus::Confirming;
            }
        }
        Ok(())
    }

    async fn mark_retry(&self, id: Uuid, error_message: &str, scheduled_at: DateTime<Utc>) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().consolidation_queue.get_mut(&id) {
            j.status = ExecutionStatus::Pending;
            j.retry_count += 1;
            j.error_message = Some(error_message.to_string());
            j.scheduled_at = scheduled_at;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().consolidation_queue.get_mut(&id) {
            j.status = ExecutionStatus::Failed;
            j.error_message = Some(error_message.to_string());
            j.processed_at = Some(now());
        }
        Ok(())
    }

    async fn mark_confirmed(&self, id: Uuid, gas_used: Option<&str>, gas_price: Option<&str>) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().consolidation_queue.get_mut(&id) {
            j.status = ExecutionStatus::Confirmed;
            j.processed_at = Some(now());
            j.gas_used = gas_used.map(str::to_string);
            j.gas_price = gas_price.map(str::to_string);
        }
        Ok(())
    }
}

#[async_trait]
impl GasTopupQueueProvider for InMemoryDatastore {
    async fn has_active_job(&self, chain_id: Uuid, gas_asset_on_chain_id: Uuid, wallet_id: Uuid) -> Result<bool, DatastoreError> {
        Ok(self.lock().gas_queue.values().any(|j| {
            j.chain_id == chain_id && j.gas_asset_on_chain_id == gas_asset_on_chain_id && j.wallet_id == wallet_id && j.status.is_active()
        }))
    }

    async fn enqueue(&self, job: NewGasTopupJob) -> Result<bool, DatastoreError> {
        let mut state = self.lock();
        let active = state.gas_queue.values().any(|j| {
            j.chain_id == job.chain_id
                && j.gas_asset_on_chain_id == job.gas_asset_on_chain_id
                && j.wallet_id == job.wallet_id
                && j.status.is_active()
        });
        if active {
            return Ok(false);
        }
        let id = Uuid::new_v4();
        state.gas_queue.insert(
            id,
            GasTopupJob {
                id,
                chain_id: job.chain_id,
                gas_asset_on_chain_id: job.gas_asset_on_chain_id,
                wallet_id: job.wallet_id,
                wallet_balance_id: job.wallet_balance_id,
                destination_wallet_id: job.destination_wallet_id,
                topup_amount_raw: job.topup_amount_raw,
                topup_amount_human: job.topup_amount_human,
                status: ExecutionStatus::Pending,
                priority: job.priority,
                tx_hash: None,
                retry_count: 0,
                error_message: None,
                scheduled_at: now(),
                processed_at: None,
                gas_used: None,
                gas_price: None,
            },
        );
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> Result<Option<GasTopupJob>, DatastoreError> {
        Ok(self.lock().gas_queue.get(&id).cloned())
    }

    async fn pick_candidates(&self, chain_id: Uuid, limit: i64) -> Result<Vec<GasTopupJob>, DatastoreError> {
        let state = self.lock();
        let t = now();
        let mut rows: Vec<GasTopupJob> = state
            .gas_queue
            .values()
            .filter(|j| {
                j.chain_id == chain_id
                    && matches!(j.status, ExecutionStatus::Pending | ExecutionStatus::Confirming)
                    && j.scheduled_at <= t
            })
            .cloned()
            .collect();
        rows.sort_by_key(|j| (j.priority.rank(), j.scheduled_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().gas_queue.get_mut(&id) {
            j.status = ExecutionStatus::Processing;
        }
        Ok(())
    }

    async fn mark_broadcast(&self, id: Uuid, tx_hash: &str) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().gas_queue.get_mut(&id) {
            if j.tx_hash.is_none() {
                j.tx_hash = Some(tx_hash.to_string());
                j.status = ExecutionStatus::Confirming;
            }
        }
        Ok(())
    }

    async fn mark_retry(&self, id: Uuid, error_message: &str, scheduled_at: DateTime<Utc>) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().gas_queue.get_mut(&id) {
            j.status = ExecutionStatus::Pending;
            j.retry_count += 1;
            j.error_message = Some(error_message.to_string());
            j.scheduled_at = scheduled_at;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().gas_queue.get_mut(&id) {
            j.status = ExecutionStatus::Failed;
            j.error_message = Some(error_message.to_string());
            j.processed_at = Some(now());
        }
        Ok(())
    }

    async fn mark_confirmed(&self, id: Uuid, gas_used: Option<&str>, gas_price: Option<&str>) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().gas_queue.get_mut(&id) {
            j.status = ExecutionStatus::Confirmed;
            j.processed_at = Some(now());
            j.gas_used = gas_used.map(str::to_string);
            j.gas_price = gas_price.map(str::to_string);
        }
        Ok(())
    }
}

#[async_trait]
impl WithdrawalRequestProvider for InMemoryDatastore {
    async fn get(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, DatastoreError> {
        Ok(self.lock().withdrawal_requests.get(&id).cloned())
    }

    async fn mark_queued(&self, id: Uuid) -> Result<(), DatastoreError> {
        if let Some(r) = self.lock().withdrawal_requests.get_mut(&id) {
            r.status = WithdrawalRequestStatus::Queued;
        }
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid, final_tx_hash: &str) -> Result<(), DatastoreError> {
        if let Some(r) = self.lock().withdrawal_requests.get_mut(&id) {
            r.status = WithdrawalRequestStatus::Completed;
            r.final_tx_hash = Some(final_tx_hash.to_string());
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), DatastoreError> {
        if let Some(r) = self.lock().withdrawal_requests.get_mut(&id) {
            r.status = WithdrawalRequestStatus::Failed;
        }
        Ok(())
    }
}

#[async_trait]
impl WithdrawalQueueProvider for InMemoryDatastore {
    async fn has_active_job(&self, withdrawal_request_id: Uuid) -> Result<bool, DatastoreError> {
        Ok(self
            .lock()
            .withdrawal_queue
            .values()
            .any(|j| j.withdrawal_request_id == withdrawal_request_id && j.status.is_active()))
    }

    async fn enqueue(&self, job: NewWithdrawalJob) -> Result<bool, DatastoreError> {
        let mut state = self.lock();
        let active = state
            .withdrawal_queue
            .values()
            .any(|j| j.withdrawal_request_id == job.withdrawal_request_id && j.status.is_active());
        if active {
            return Ok(false);
        }
        let id = Uuid::new_v4();
        state.withdrawal_queue.insert(
            id,
            WithdrawalJob {
                id,
                withdrawal_request_id: job.withdrawal_request_id,
                chain_id: job.chain_id,
                operation_wallet_address_id: job.operation_wallet_address_id,
                destination_address: job.destination_address,
                amount_raw: job.amount_raw,
                amount_human: job.amount_human,
                status: ExecutionStatus::Pending,
                priority: job.priority,
                tx_hash: None,
                retry_count: 0,
                max_retries: job.max_retries,
                error_message: None,
                scheduled_at: now(),
                processed_at: None,
                gas_used: None,
                gas_price: None,
            },
        );
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> Result<Option<WithdrawalJob>, DatastoreError> {
        Ok(self.lock().withdrawal_queue.get(&id).cloned())
    }

    async fn pick_candidates(&self, chain_id: Uuid, limit: i64) -> Result<Vec<WithdrawalJob>, DatastoreError> {
        let state = self.lock();
        let t = now();
        let mut rows: Vec<WithdrawalJob> = state
            .withdrawal_queue
            .values()
            .filter(|j| {
                j.chain_id == chain_id
                    && matches!(j.status, ExecutionStatus::Pending | ExecutionStatus::Confirming)
                    && j.scheduled_at <= t
            })
            .cloned()
            .collect();
        rows.sort_by_key(|j| (j.priority.rank(), j.scheduled_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn mark_processing(&self, id: Uuid) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().withdrawal_queue.get_mut(&id) {
            j.status = ExecutionStatus::Processing;
        }
        Ok(())
    }

    async fn mark_broadcast(&self, id: Uuid, tx_hash: &str) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().withdrawal_queue.get_mut(&id) {
            if j.tx_hash.is_none() {
                j.tx_hash = Some(tx_hash.to_string());
                j.status = ExecutionStatus::Confirming;
            }
        }
        Ok(())
    }

    async fn mark_retry(&self, id: Uuid, error_message: &str, scheduled_at: DateTime<Utc>) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().withdrawal_queue.get_mut(&id) {
            j.status = ExecutionStatus::Pending;
            j.retry_count += 1;
            j.error_message = Some(error_message.to_string());
            j.scheduled_at = scheduled_at;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().withdrawal_queue.get_mut(&id) {
            j.status = ExecutionStatus::Failed;
            j.error_message = Some(error_message.to_string());
            j.processed_at = Some(now());
        }
        Ok(())
    }

    async fn mark_confirmed(&self, id: Uuid, gas_used: Option<&str>, gas_price: Option<&str>) -> Result<(), DatastoreError> {
        if let Some(j) = self.lock().withdrawal_queue.get_mut(&id) {
            j.status = ExecutionStatus::Confirmed;
            j.processed_at = Some(now());
            j.gas_used = gas_used.map(str::to_string);
            j.gas_price = gas_price.map(str::to_string);
        }
        Ok(())
    }
}

#[async_trait]
impl RuleProvider for InMemoryDatastore {
    async fn list_active_gas_rules(
        &self,
        chain_id: Uuid,
        gas_asset_on_chain_id: Uuid,
    ) -> Result<Vec<GasTopupRule>, DatastoreError> {
        Ok(self
            .lock()
            .gas_rules
            .iter()
            .filter(|r| r.chain_id == chain_id && r.gas_asset_on_chain_id == gas_asset_on_chain_id && r.is_active)
            .cloned()
            .collect())
    }

    async fn list_active_consolidation_rules(
        &self,
        chain_id: Uuid,
        asset_on_chain_id: Uuid,
    ) -> Result<Vec<ConsolidationRule>, DatastoreError> {
        let mut rows: Vec<ConsolidationRule> = self
            .lock()
            .consolidation_rules
            .iter()
            .filter(|r| r.chain_id == chain_id && r.asset_on_chain_id == asset_on_chain_id && r.is_active)
            .cloned()
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.priority.rank()));
        Ok(rows)
    }
}

#[async_trait]
impl RuleLogProvider for InMemoryDatastore {
    async fn append(&self, entry: RuleLogEntry) -> Result<(), DatastoreError> {
        self.lock().rule_logs.push(entry);
        Ok(())
    }
}

#[async_trait]
impl ControlPlaneProvider for InMemoryDatastore {
    async fn heartbeat(&self, status: &WorkerStatus) -> Result<(), DatastoreError> {
        self.lock().worker_status.insert(status.worker_id.clone(), status.clone());
        Ok(())
    }

    async fn mark_stopped(&self, worker_id: &str) -> Result<(), DatastoreError> {
        if let Some(s) = self.lock().worker_status.get_mut(worker_id) {
            s.state = WorkerState::Stopped;
        }
        Ok(())
    }

    async fn get_incident_mode(&self) -> Result<IncidentMode, DatastoreError> {
        Ok(self.lock().incident_mode)
    }

    async fn is_maintenance_mode(&self) -> Result<bool, DatastoreError> {
        Ok(self.lock().maintenance)
    }

    async fn record_execution(&self, entry: &ExecutionLogEntry) -> Result<(), DatastoreError> {
        self.lock().executions.push(entry.clone());
        Ok(())
    }
}

impl InMemoryDatastore {
    pub fn set_incident_mode(&self, mode: IncidentMode) {
        self.lock().incident_mode = mode;
    }

    pub fn set_maintenance_mode(&self, on: bool) {
        self.lock().maintenance = on;
    }

    pub fn execution_log(&self) -> Vec<ExecutionLogEntry> {
        self.lock().executions.clone()
    }
}

#[async_trait]
impl CreditLedgerProvider for InMemoryDatastore {
    async fn credit(&self, uid: Uuid, asset_on_chain_id: Uuid, amount_human: &str) -> Result<(), DatastoreError> {
        let delta = Decimal::from_str(amount_human)
            .map_err(|e| DatastoreError::InvalidData(format!("bad amount_human {amount_human}: {e}")))?;
        let mut state = self.lock();
        let entry = state.credit_ledger.entry((uid, asset_on_chain_id)).or_insert(Decimal::ZERO);
        *entry += delta;
        Ok(())
    }
}

struct MemoryFunderLock {
    state: std::sync::Arc<Mutex<State>>,
    key: String,
}

#[async_trait]
impl EvmFunderLock for MemoryFunderLock {
    async fn unlock(self: Box<Self>) -> Result<(), DatastoreError> {
        self.state
            .lock()
            .expect("in-memory datastore mutex poisoned")
            .evm_locks
            .remove(&self.key);
        Ok(())
    }
}

#[async_trait]
impl AdvisoryLockProvider for InMemoryDatastore {
    async fn lock_evm_funder(&self, key: &str) -> Result<Box<dyn EvmFunderLock>, DatastoreError> {
        let mut state = self.lock();
        if state.evm_locks.insert(key.to_string()) {
            Ok(Box::new(MemoryFunderLock { state: self.state.clone(), key: key.to_string() }))
        } else {
            Err(DatastoreError::Connection(format!("funder lock {key} already held")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chain() -> Chain {
        Chain {
            id: Uuid::new_v4(),
            name: "tron".into(),
            family: ChainFamily::Tron,
            rpc_url: "https://example".into(),
            confirmation_threshold: 19,
            block_time_seconds: 3,
            chain_id: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn deposit_insert_is_idempotent_by_tx_hash_and_log_index() {
        let ds = InMemoryDatastore::new();
        let chain = sample_chain();
        let asset_id = Uuid::new_v4();
        let new_deposit = NewDeposit {
            chain_id: chain.id,
            asset_on_chain_id: asset_id,
            tx_hash: "0xabc".into(),
            log_index: 2,
            from_address: "from".into(),
            to_address: "to".into(),
            amount_raw: "10000000".into(),
            amount_human: "10".into(),
            block_number: 980,
        };
        assert!(ds.insert_pending_if_absent(new_deposit.clone()).await.unwrap());
        assert!(!ds.insert_pending_if_absent(new_deposit).await.unwrap());
        assert_eq!(ds.list_pending_oldest_first(chain.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cursor_never_decreases() {
        let ds = InMemoryDatastore::new();
        let chain_id = Uuid::new_v4();
        ds.advance_last_processed_block(chain_id, 100).await.unwrap();
        ds.advance_last_processed_block(chain_id, 50).await.unwrap();
        assert_eq!(ds.get_last_processed_block(chain_id).await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn consolidation_enqueue_is_unique_per_wallet_balance() {
        let ds = InMemoryDatastore::new();
        let job = NewConsolidationJob {
            chain_id: Uuid::new_v4(),
            wallet_id: Uuid::new_v4(),
            wallet_balance_id: Uuid::new_v4(),
            destination_wallet_id: Uuid::new_v4(),
            amount_raw: "1".into(),
            amount_human: "0.000001".into(),
            priority: Priority::Normal,
        };
        assert!(ConsolidationQueueProvider::enqueue(&ds, job.clone()).await.unwrap());
        assert!(!ConsolidationQueueProvider::enqueue(&ds, job).await.unwrap());
    }

    #[tokio::test]
    async fn a_second_worker_blocks_on_the_same_funder_until_the_first_unlocks() {
        let ds = InMemoryDatastore::new();
        let addr = "0xfunder";

        let lock_a = AdvisoryLockProvider::lock_evm_funder(&ds, addr).await.unwrap();
        assert!(
            AdvisoryLockProvider::lock_evm_funder(&ds, addr).await.is_err(),
            "a second worker must not acquire the same funder lock while A holds it"
        );

        lock_a.unlock().await.unwrap();
        assert!(
            AdvisoryLockProvider::lock_evm_funder(&ds, addr).await.is_ok(),
            "once released, the next worker can take the lock and fetch a fresh nonce"
        );
    }
}
