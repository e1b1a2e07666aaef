use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's custodial deposit address. Never the executor of gas/hot/treasury flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserWalletAddress {
    pub id: Uuid,
    pub uid: Uuid,
    pub chain_id: Uuid,
    pub address: String,
    pub wallet_group_id: String,
    pub derivation_index: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationRole {
    Gas,
    Hot,
    Treasury,
}

/// A funded address that sends transactions on behalf of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationWalletAddress {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub role: OperationRole,
    pub wallet_group_id: String,
    pub derivation_index: i64,
    pub address: String,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Either wallet table `wallet_id` may point into (§9 "Dual-table wallet_id").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletAddress {
    User(UserWalletAddress),
    Operation(OperationWalletAddress),
}

impl WalletAddress {
    pub fn chain_id(&self) -> Uuid {
        match self {
            Self::User(w) => w.chain_id,
            Self::Operation(w) => w.chain_id,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Self::User(w) => &w.address,
            Self::Operation(w) => &w.address,
        }
    }

    pub fn wallet_group_id(&self) -> &str {
        match self {
            Self::User(w) => &w.wallet_group_id,
            Self::Operation(w) => &w.wallet_group_id,
        }
    }

    pub fn derivation_index(&self) -> i64 {
        match self {
            Self::User(w) => w.derivation_index,
            Self::Operation(w) => w.derivation_index,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Idle,
    Processing,
    ConsolidationProcessing,
    GasProcessing,
}

/// A time-bounded claim of exclusive processing rights over a row (§ Glossary).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lease {
    pub locked_until: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
}

impl Lease {
    pub fn is_free(&self, now: DateTime<Utc>) -> bool {
        match self.locked_until {
            None => true,
            Some(until) => until <= now,
        }
    }

    pub fn acquire(worker_id: &str, now: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            locked_until: Some(now + ttl),
            locked_by: Some(worker_id.to_string()),
        }
    }

    pub fn release() -> Self {
        Self {
            locked_until: None,
            locked_by: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Normal,
    Low,
    Unknown,
}

impl Priority {
    /// `high=0, normal=1, low=2, unknown=3` — lower sorts first (§4.8).
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
            Self::Unknown => 3,
        }
    }
}

/// Primary row per `(wallet_id, asset_on_chain_id)`; the single source of truth
/// for on-chain balances and the three disjoint lease families (§9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletBalance {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub asset_on_chain_id: Uuid,
    pub on_chain_balance_raw: String,
    pub on_chain_balance_human: String,
    pub processing_status: ProcessingStatus,
    pub general_lease: Lease,
    pub consolidation_lease: Lease,
    pub gas_lease: Lease,
    pub needs_consolidation: bool,
    pub consolidation_priority: Priority,
    pub needs_gas: bool,
    pub gas_priority: Priority,
    pub sync_count: i64,
    pub error_count: i64,
    pub last_error: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub last_consolidation_at: Option<DateTime<Utc>>,
}
