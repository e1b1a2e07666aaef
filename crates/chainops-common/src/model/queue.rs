use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::wallet::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Processing,
    Confirming,
    Confirmed,
    Failed,
}

impl ExecutionStatus {
    /// Active statuses that count against the "one active job" uniqueness
    /// invariant (P5).
    pub const ACTIVE: [Self; 3] = [Self::Pending, Self::Processing, Self::Confirming];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationJob {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub wallet_id: Uuid,
    pub wallet_balance_id: Uuid,
    pub destination_wallet_id: Uuid,
    pub amount_raw: String,
    pub amount_human: String,
    pub status: ExecutionStatus,
    pub priority: Priority,
    pub tx_hash: Option<String>,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub gas_used: Option<String>,
    pub gas_price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasTopupJob {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub gas_asset_on_chain_id: Uuid,
    pub wallet_id: Uuid,
    pub wallet_balance_id: Uuid,
    pub destination_wallet_id: Uuid,
    pub topup_amount_raw: String,
    pub topup_amount_human: String,
    pub status: ExecutionStatus,
    pub priority: Priority,
    pub tx_hash: Option<String>,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub gas_used: Option<String>,
    pub gas_price: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalRequestStatus {
    Pending,
    Approved,
    Queued,
    Completed,
    Failed,
}

/// The intent layer (§3) — distinct from `WithdrawalQueue`, the execution layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub uid: Uuid,
    pub chain_id: Uuid,
    pub asset_on_chain_id: Uuid,
    pub destination_address: String,
    pub amount_raw: String,
    pub amount_human: String,
    pub status: WithdrawalRequestStatus,
    pub final_tx_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalJob {
    pub id: Uuid,
    pub withdrawal_request_id: Uuid,
    pub chain_id: Uuid,
    pub operation_wallet_address_id: Uuid,
    pub destination_address: String,
    pub amount_raw: String,
    pub amount_human: String,
    pub status: ExecutionStatus,
    pub priority: Priority,
    pub tx_hash: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error_message: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub gas_used: Option<String>,
    pub gas_price: Option<String>,
}

/// Which queue family a lease/pick-next operation concerns — used to route
/// generic execution-worker code to the right table without duplicating it
/// three times (§2 "execution workers (3 x 2 chains)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    GasTopup,
    Consolidation,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    GasTopup,
    Consolidation,
}

/// Append-only audit row written for every rule evaluation, matched or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLogEntry {
    pub id: Uuid,
    pub kind: RuleKind,
    pub rule_id: Option<Uuid>,
    pub wallet_balance_id: Uuid,
    pub matched: bool,
    pub detail: String,
    pub evaluated_at: DateTime<Utc>,
}
