use chainops_common::model::{
    Chain, ChainFamily, ConsolidationJob, ConsolidationRule, Deposit, DepositStatus,
    ExecutionStatus, GasTopupJob, GasTopupRule, Lease, OperationRole, OperationWalletAddress,
    Priority, ProcessingStatus, UserWalletAddress, WalletBalance, WithdrawalJob,
    WithdrawalRequest, WithdrawalRequestStatus,
};
use chainops_common::model::AssetOnChain;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::error::DatastoreError;

type R<T> = Result<T, DatastoreError>;

fn invalid(col: &str, e: impl std::fmt::Display) -> DatastoreError {
    DatastoreError::InvalidData(format!("{col}: {e}"))
}

fn parse_family(s: &str) -> R<ChainFamily> {
    match s {
        "tron" => Ok(ChainFamily::Tron),
        "evm" => Ok(ChainFamily::Evm),
        other => Err(DatastoreError::InvalidData(format!("unknown chain family {other}"))),
    }
}

fn parse_role(s: &str) -> R<OperationRole> {
    match s {
        "gas" => Ok(OperationRole::Gas),
        "hot" => Ok(OperationRole::Hot),
        "treasury" => Ok(OperationRole::Treasury),
        other => Err(DatastoreError::InvalidData(format!("unknown operation role {other}"))),
    }
}

fn parse_processing_status(s: &str) -> R<ProcessingStatus> {
    match s {
        "idle" => Ok(ProcessingStatus::Idle),
        "processing" => Ok(ProcessingStatus::Processing),
        "consolidation_processing" => Ok(ProcessingStatus::ConsolidationProcessing),
        "gas_processing" => Ok(ProcessingStatus::GasProcessing),
        other => Err(DatastoreError::InvalidData(format!("unknown processing status {other}"))),
    }
}

pub(crate) fn parse_priority(s: &str) -> R<Priority> {
    match s {
        "high" => Ok(Priority::High),
        "normal" => Ok(Priority::Normal),
        "low" => Ok(Priority::Low),
        _ => Ok(Priority::Unknown),
    }
}

pub(crate) fn priority_str(p: Priority) -> &'static str {
    match p {
        Priority::High => "high",
        Priority::Normal => "normal",
        Priority::Low => "low",
        Priority::Unknown => "unknown",
    }
}

fn parse_deposit_status(s: &str) -> R<DepositStatus> {
    match s {
        "pending" => Ok(DepositStatus::Pending),
        "confirmed" => Ok(DepositStatus::Confirmed),
        "failed" => Ok(DepositStatus::Failed),
        other => Err(DatastoreError::InvalidData(format!("unknown deposit status {other}"))),
    }
}

pub(crate) fn parse_execution_status(s: &str) -> R<ExecutionStatus> {
    match s {
        "pending" => Ok(ExecutionStatus::Pending),
        "processing" => Ok(ExecutionStatus::Processing),
        "confirming" => Ok(ExecutionStatus::Confirming),
        "confirmed" => Ok(ExecutionStatus::Confirmed),
        "failed" => Ok(ExecutionStatus::Failed),
        other => Err(DatastoreError::InvalidData(format!("unknown execution status {other}"))),
    }
}

pub(crate) fn execution_status_str(s: ExecutionStatus) -> &'static str {
    match s {
        ExecutionStatus::Pending => "pending",
        ExecutionStatus::Processing => "processing",
        ExecutionStatus::Confirming => "confirming",
        ExecutionStatus::Confirmed => "confirmed",
        ExecutionStatus::Failed => "failed",
    }
}

fn parse_withdrawal_request_status(s: &str) -> R<WithdrawalRequestStatus> {
    match s {
        "pending" => Ok(WithdrawalRequestStatus::Pending),
        "approved" => Ok(WithdrawalRequestStatus::Approved),
        "queued" => Ok(WithdrawalRequestStatus::Queued),
        "completed" => Ok(WithdrawalRequestStatus::Completed),
        "failed" => Ok(WithdrawalRequestStatus::Failed),
        other => Err(DatastoreError::InvalidData(format!(
            "unknown withdrawal request status {other}"
        ))),
    }
}

pub fn chain_from_row(row: &PgRow) -> R<Chain> {
    Ok(Chain {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        name: row.try_get("name").map_err(|e| invalid("name", e))?,
        family: parse_family(row.try_get::<String, _>("family").map_err(|e| invalid("family", e))?.as_str())?,
        rpc_url: row.try_get("rpc_url").map_err(|e| invalid("rpc_url", e))?,
        confirmation_threshold: row
            .try_get::<i64, _>("confirmation_threshold")
            .map_err(|e| invalid("confirmation_threshold", e))? as u64,
        block_time_seconds: row
            .try_get::<i64, _>("block_time_seconds")
            .map_err(|e| invalid("block_time_seconds", e))? as u64,
        chain_id: row
            .try_get::<Option<i64>, _>("chain_id")
            .map_err(|e| invalid("chain_id", e))?
            .map(|v| v as u64),
        is_active: row.try_get("is_active").map_err(|e| invalid("is_active", e))?,
    })
}

pub fn asset_on_chain_from_row(row: &PgRow) -> R<AssetOnChain> {
    Ok(AssetOnChain {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        chain_id: row.try_get("chain_id").map_err(|e| invalid("chain_id", e))?,
        asset_id: row.try_get("asset_id").map_err(|e| invalid("asset_id", e))?,
        contract_address: row
            .try_get("contract_address")
            .map_err(|e| invalid("contract_address", e))?,
        decimals: row.try_get::<i32, _>("decimals").map_err(|e| invalid("decimals", e))? as u32,
        is_native: row.try_get("is_native").map_err(|e| invalid("is_native", e))?,
        is_active: row.try_get("is_active").map_err(|e| invalid("is_active", e))?,
    })
}

pub fn user_wallet_from_row(row: &PgRow) -> R<UserWalletAddress> {
    Ok(UserWalletAddress {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        uid: row.try_get("uid").map_err(|e| invalid("uid", e))?,
        chain_id: row.try_get("chain_id").map_err(|e| invalid("chain_id", e))?,
        address: row.try_get("address").map_err(|e| invalid("address", e))?,
        wallet_group_id: row
            .try_get("wallet_group_id")
            .map_err(|e| invalid("wallet_group_id", e))?,
        derivation_index: row
            .try_get("derivation_index")
            .map_err(|e| invalid("derivation_index", e))?,
        is_active: row.try_get("is_active").map_err(|e| invalid("is_active", e))?,
    })
}

pub fn operation_wallet_from_row(row: &PgRow) -> R<OperationWalletAddress> {
    Ok(OperationWalletAddress {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        chain_id: row.try_get("chain_id").map_err(|e| invalid("chain_id", e))?,
        role: parse_role(row.try_get::<String, _>("role").map_err(|e| invalid("role", e))?.as_str())?,
        wallet_group_id: row
            .try_get("wallet_group_id")
            .map_err(|e| invalid("wallet_group_id", e))?,
        derivation_index: row
            .try_get("derivation_index")
            .map_err(|e| invalid("derivation_index", e))?,
        address: row.try_get("address").map_err(|e| invalid("address", e))?,
        is_active: row.try_get("is_active").map_err(|e| invalid("is_active", e))?,
        last_used_at: row
            .try_get("last_used_at")
            .map_err(|e| invalid("last_used_at", e))?,
    })
}

pub fn wallet_balance_from_row(row: &PgRow) -> R<WalletBalance> {
    Ok(WalletBalance {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        wallet_id: row.try_get("wallet_id").map_err(|e| invalid("wallet_id", e))?,
        asset_on_chain_id: row
            .try_get("asset_on_chain_id")
            .map_err(|e| invalid("asset_on_chain_id", e))?,
        on_chain_balance_raw: row
            .try_get("on_chain_balance_raw")
            .map_err(|e| invalid("on_chain_balance_raw", e))?,
        on_chain_balance_human: row
            .try_get("on_chain_balance_human")
            .map_err(|e| invalid("on_chain_balance_human", e))?,
        processing_status: parse_processing_status(
            row.try_get::<String, _>("processing_status")
                .map_err(|e| invalid("processing_status", e))?
                .as_str(),
        )?,
        general_lease: Lease {
            locked_until: row
                .try_get("locked_until")
                .map_err(|e| invalid("locked_until", e))?,
            locked_by: row.try_get("locked_by").map_err(|e| invalid("locked_by", e))?,
        },
        consolidation_lease: Lease {
            locked_until: row
                .try_get("consolidation_locked_until")
                .map_err(|e| invalid("consolidation_locked_until", e))?,
            locked_by: row
                .try_get("consolidation_locked_by")
                .map_err(|e| invalid("consolidation_locked_by", e))?,
        },
        gas_lease: Lease {
            locked_until: row
                .try_get("gas_locked_until")
                .map_err(|e| invalid("gas_locked_until", e))?,
            locked_by: row
                .try_get("gas_locked_by")
                .map_err(|e| invalid("gas_locked_by", e))?,
        },
        needs_consolidation: row
            .try_get("needs_consolidation")
            .map_err(|e| invalid("needs_consolidation", e))?,
        consolidation_priority: parse_priority(
            row.try_get::<String, _>("consolidation_priority")
                .map_err(|e| invalid("consolidation_priority", e))?
                .as_str(),
        )?,
        needs_gas: row.try_get("needs_gas").map_err(|e| invalid("needs_gas", e))?,
        gas_priority: parse_priority(
            row.try_get::<String, _>("gas_priority")
                .map_err(|e| invalid("gas_priority", e))?
                .as_str(),
        )?,
        sync_count: row.try_get("sync_count").map_err(|e| invalid("sync_count", e))?,
        error_count: row.try_get("error_count").map_err(|e| invalid("error_count", e))?,
        last_error: row.try_get("last_error").map_err(|e| invalid("last_error", e))?,
        last_checked: row.try_get("last_checked").map_err(|e| invalid("last_checked", e))?,
        last_processed_at: row
            .try_get("last_processed_at")
            .map_err(|e| invalid("last_processed_at", e))?,
        last_consolidation_at: row
            .try_get("last_consolidation_at")
            .map_err(|e| invalid("last_consolidation_at", e))?,
    })
}

pub fn deposit_from_row(row: &PgRow) -> R<Deposit> {
    Ok(Deposit {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        chain_id: row.try_get("chain_id").map_err(|e| invalid("chain_id", e))?,
        asset_on_chain_id: row
            .try_get("asset_on_chain_id")
            .map_err(|e| invalid("asset_on_chain_id", e))?,
        tx_hash: row.try_get("tx_hash").map_err(|e| invalid("tx_hash", e))?,
        log_index: row.try_get("log_index").map_err(|e| invalid("log_index", e))?,
        from_address: row.try_get("from_address").map_err(|e| invalid("from_address", e))?,
        to_address: row.try_get("to_address").map_err(|e| invalid("to_address", e))?,
        amount_raw: row.try_get("amount_raw").map_err(|e| invalid("amount_raw", e))?,
        amount_human: row.try_get("amount_human").map_err(|e| invalid("amount_human", e))?,
        block_number: row.try_get::<i64, _>("block_number").map_err(|e| invalid("block_number", e))? as u64,
        first_seen_block: row
            .try_get::<i64, _>("first_seen_block")
            .map_err(|e| invalid("first_seen_block", e))? as u64,
        status: parse_deposit_status(
            row.try_get::<String, _>("status").map_err(|e| invalid("status", e))?.as_str(),
        )?,
        confirmations: row.try_get::<i64, _>("confirmations").map_err(|e| invalid("confirmations", e))? as u64,
        confirmed_at: row.try_get("confirmed_at").map_err(|e| invalid("confirmed_at", e))?,
        credited_at: row.try_get("credited_at").map_err(|e| invalid("credited_at", e))?,
    })
}

pub fn consolidation_job_from_row(row: &PgRow) -> R<ConsolidationJob> {
    Ok(ConsolidationJob {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        chain_id: row.try_get("chain_id").map_err(|e| invalid("chain_id", e))?,
        wallet_id: row.try_get("wallet_id").map_err(|e| invalid("wallet_id", e))?,
        wallet_balance_id: row
            .try_get("wallet_balance_id")
            .map_err(|e| invalid("wallet_balance_id", e))?,
        destination_wallet_id: row
            .try_get("destination_wallet_id")
            .map_err(|e| invalid("destination_wallet_id", e))?,
        amount_raw: row.try_get("amount_raw").map_err(|e| invalid("amount_raw", e))?,
        amount_human: row.try_get("amount_human").map_err(|e| invalid("amount_human", e))?,
        status: parse_execution_status(
            row.try_get::<String, _>("status").map_err(|e| invalid("status", e))?.as_str(),
        )?,
        priority: parse_priority(
            row.try_get::<String, _>("priority").map_err(|e| invalid("priority", e))?.as_str(),
        )?,
        tx_hash: row.try_get("tx_hash").map_err(|e| invalid("tx_hash", e))?,
        retry_count: row.try_get::<i32, _>("retry_count").map_err(|e| invalid("retry_count", e))? as u32,
        error_message: row.try_get("error_message").map_err(|e| invalid("error_message", e))?,
        scheduled_at: row.try_get("scheduled_at").map_err(|e| invalid("scheduled_at", e))?,
        processed_at: row.try_get("processed_at").map_err(|e| invalid("processed_at", e))?,
        gas_used: row.try_get("gas_used").map_err(|e| invalid("gas_used", e))?,
        gas_price: row.try_get("gas_price").map_err(|e| invalid("gas_price", e))?,
    })
}

pub fn gas_topup_job_from_row(row: &PgRow) -> R<GasTopupJob> {
    Ok(GasTopupJob {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        chain_id: row.try_get("chain_id").map_err(|e| invalid("chain_id", e))?,
        gas_asset_on_chain_id: row
            .try_get("gas_asset_on_chain_id")
            .map_err(|e| invalid("gas_asset_on_chain_id", e))?,
        wallet_id: row.try_get("wallet_id").map_err(|e| invalid("wallet_id", e))?,
        wallet_balance_id: row
            .try_get("wallet_balance_id")
            .map_err(|e| invalid("wallet_balance_id", e))?,
        destination_wallet_id: row
            .try_get("destination_wallet_id")
            .map_err(|e| invalid("destination_wallet_id", e))?,
        topup_amount_raw: row
            .try_get("topup_amount_raw")
            .map_err(|e| invalid("topup_amount_raw", e))?,
        topup_amount_human: row
            .try_get("topup_amount_human")
            .map_err(|e| invalid("topup_amount_human", e))?,
        status: parse_execution_status(
            row.try_get::<String, _>("status").map_err(|e| invalid("status", e))?.as_str(),
        )?,
        priority: parse_priority(
            row.try_get::<String, _>("priority").map_err(|e| invalid("priority", e))?.as_str(),
        )?,
        tx_hash: row.try_get("tx_hash").map_err(|e| invalid("tx_hash", e))?,
        retry_count: row.try_get::<i32, _>("retry_count").map_err(|e| invalid("retry_count", e))? as u32,
        error_message: row.try_get("error_message").map_err(|e| invalid("error_message", e))?,
        scheduled_at: row.try_get("scheduled_at").map_err(|e| invalid("scheduled_at", e))?,
        processed_at: row.try_get("processed_at").map_err(|e| invalid("processed_at", e))?,
        gas_used: row.try_get("gas_used").map_err(|e| invalid("gas_used", e))?,
        gas_price: row.try_get("gas_price").map_err(|e| invalid("gas_price", e))?,
    })
}

pub fn withdrawal_request_from_row(row: &PgRow) -> R<WithdrawalRequest> {
    Ok(WithdrawalRequest {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        uid: row.try_get("uid").map_err(|e| invalid("uid", e))?,
        chain_id: row.try_get("chain_id").map_err(|e| invalid("chain_id", e))?,
        asset_on_chain_id: row
            .try_get("asset_on_chain_id")
            .map_err(|e| invalid("asset_on_chain_id", e))?,
        destination_address: row
            .try_get("destination_address")
            .map_err(|e| invalid("destination_address", e))?,
        amount_raw: row.try_get("amount_raw").map_err(|e| invalid("amount_raw", e))?,
        amount_human: row.try_get("amount_human").map_err(|e| invalid("amount_human", e))?,
        status: parse_withdrawal_request_status(
            row.try_get::<String, _>("status").map_err(|e| invalid("status", e))?.as_str(),
        )?,
        final_tx_hash: row.try_get("final_tx_hash").map_err(|e| invalid("final_tx_hash", e))?,
    })
}

pub fn withdrawal_job_from_row(row: &PgRow) -> R<WithdrawalJob> {
    Ok(WithdrawalJob {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        withdrawal_request_id: row
            .try_get("withdrawal_request_id")
            .map_err(|e| invalid("withdrawal_request_id", e))?,
        chain_id: row.try_get("chain_id").map_err(|e| invalid("chain_id", e))?,
        operation_wallet_address_id: row
            .try_get("operation_wallet_address_id")
            .map_err(|e| invalid("operation_wallet_address_id", e))?,
        destination_address: row
            .try_get("destination_address")
            .map_err(|e| invalid("destination_address", e))?,
        amount_raw: row.try_get("amount_raw").map_err(|e| invalid("amount_raw", e))?,
        amount_human: row.try_get("amount_human").map_err(|e| invalid("amount_human", e))?,
        status: parse_execution_status(
            row.try_get::<String, _>("status").map_err(|e| invalid("status", e))?.as_str(),
        )?,
        priority: parse_priority(
            row.try_get::<String, _>("priority").map_err(|e| invalid("priority", e))?.as_str(),
        )?,
        tx_hash: row.try_get("tx_hash").map_err(|e| invalid("tx_hash", e))?,
        retry_count: row.try_get::<i32, _>("retry_count").map_err(|e| invalid("retry_count", e))? as u32,
        max_retries: row.try_get::<i32, _>("max_retries").map_err(|e| invalid("max_retries", e))? as u32,
        error_message: row.try_get("error_message").map_err(|e| invalid("error_message", e))?,
        scheduled_at: row.try_get("scheduled_at").map_err(|e| invalid("scheduled_at", e))?,
        processed_at: row.try_get("processed_at").map_err(|e| invalid("processed_at", e))?,
        gas_used: row.try_get("gas_used").map_err(|e| invalid("gas_used", e))?,
        gas_price: row.try_get("gas_price").map_err(|e| invalid("gas_price", e))?,
    })
}

pub fn gas_rule_from_row(row: &PgRow) -> R<GasTopupRule> {
    Ok(GasTopupRule {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        chain_id: row.try_get("chain_id").map_err(|e| invalid("chain_id", e))?,
        gas_asset_on_chain_id: row
            .try_get("gas_asset_on_chain_id")
            .map_err(|e| invalid("gas_asset_on_chain_id", e))?,
        operator: row.try_get("operator").map_err(|e| invalid("operator", e))?,
        threshold_human: row
            .try_get("threshold_human")
            .map_err(|e| invalid("threshold_human", e))?,
        topup_amount_human: row
            .try_get("topup_amount_human")
            .map_err(|e| invalid("topup_amount_human", e))?,
        priority: parse_priority(
            row.try_get::<String, _>("priority").map_err(|e| invalid("priority", e))?.as_str(),
        )?,
        is_active: row.try_get("is_active").map_err(|e| invalid("is_active", e))?,
        metadata: row.try_get("metadata").map_err(|e| invalid("metadata", e))?,
    })
}

pub fn consolidation_rule_from_row(row: &PgRow) -> R<ConsolidationRule> {
    Ok(ConsolidationRule {
        id: row.try_get("id").map_err(|e| invalid("id", e))?,
        chain_id: row.try_get("chain_id").map_err(|e| invalid("chain_id", e))?,
        asset_on_chain_id: row
            .try_get("asset_on_chain_id")
            .map_err(|e| invalid("asset_on_chain_id", e))?,
        operator: row.try_get("operator").map_err(|e| invalid("operator", e))?,
        threshold_human: row
            .try_get("threshold_human")
            .map_err(|e| invalid("threshold_human", e))?,
        priority: parse_priority(
            row.try_get::<String, _>("priority").map_err(|e| invalid("priority", e))?.as_str(),
        )?,
        is_active: row.try_get("is_active").map_err(|e| invalid("is_active", e))?,
    })
}
