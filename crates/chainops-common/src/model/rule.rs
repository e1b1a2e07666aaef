use serde_json::Value;
use uuid::Uuid;

use crate::decimal::ComparisonOp;

use super::wallet::Priority;

/// A gas-topup rule: compared against the native-asset wallet-balance row's
/// human balance (§4.7 step 1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasTopupRule {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub gas_asset_on_chain_id: Uuid,
    pub operator: String,
    pub threshold_human: String,
    pub topup_amount_human: String,
    pub priority: Priority,
    pub is_active: bool,
    pub metadata: Option<Value>,
}

impl GasTopupRule {
    pub fn operator(&self) -> Option<ComparisonOp> {
        ComparisonOp::parse(&self.operator)
    }

    /// A preferred destination wallet id pinned in rule metadata, honored only
    /// if it still resolves to an active wallet on this chain (§4.7).
    pub fn preferred_wallet_id(&self) -> Option<Uuid> {
        self.metadata
            .as_ref()?
            .get("preferred_wallet_id")?
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

/// A consolidation rule: compared against the current wallet-balance row's
/// human balance (§4.7 step 2/3), ordered by priority desc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationRule {
    pub id: Uuid,
    pub chain_id: Uuid,
    pub asset_on_chain_id: Uuid,
    pub operator: String,
    pub threshold_human: String,
    pub priority: Priority,
    pub is_active: bool,
}

impl ConsolidationRule {
    pub fn operator(&self) -> Option<ComparisonOp> {
        ComparisonOp::parse(&self.operator)
    }
}
