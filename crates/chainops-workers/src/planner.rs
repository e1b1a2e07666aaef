//! Rule-execution planner cycle (§4.7): evaluates gas-topup and consolidation
//! rules against leased, idle, non-zero user-wallet balance rows and enqueues
//! jobs. Gas always blocks consolidation in the same cycle (P6).

use std::collections::HashSet;

use chainops_common::decimal::{compare, human_to_raw};
use chainops_common::model::{
    ConsolidationRule, GasTopupRule, OperationRole, Priority, RuleKind, RuleLogEntry, WalletBalance,
};
use chainops_datastore::{
    ConsolidationQueueProvider, Datastore, GasTopupQueueProvider, NewConsolidationJob,
    NewGasTopupJob,
};
use chrono::{Duration, Utc};
use log::warn;
use uuid::Uuid;

use crate::error::CycleError;

const LEASE_TTL_SECONDS: i64 = 120;

#[derive(Debug, Default)]
pub struct PlannerSummary {
    pub leased: u64,
    pub gas_enqueued: u64,
    pub consolidation_enqueued: u64,
    pub errors: u64,
}

pub async fn run_cycle(
    ds: &dyn Datastore,
    worker_id: &str,
    batch_size: i64,
) -> Result<PlannerSummary, CycleError> {
    let mut summary = PlannerSummary::default();

    let user_wallet_ids: HashSet<Uuid> =
        ds.list_active_user_wallet_ids().await?.into_iter().collect();

    let leased = ds
        .lease_idle_for_planner(worker_id, Duration::seconds(LEASE_TTL_SECONDS), batch_size)
        .await?;
    summary.leased = leased.len() as u64;

    for row in leased {
        // Defence in depth (§4.7): the lease query already filters to user
        // wallets, but an operation-wallet row must never be mutated (P7).
        if !user_wallet_ids.contains(&row.wallet_id) {
            let _ = ds.record_planner_error(row.id, "wallet_id is not a user wallet").await;
            summary.errors += 1;
            continue;
        }

        match evaluate_row(ds, &row).await {
            Ok(outcome) => {
                if outcome.enqueued_gas {
                    summary.gas_enqueued += 1;
                }
                if outcome.enqueued_consolidation {
                    summary.consolidation_enqueued += 1;
                }
            }
            Err(e) => {
                warn!("planner evaluation failed for wallet_balance {}: {e}", row.id);
                let _ = ds.record_planner_error(row.id, &e.to_string()).await;
                summary.errors += 1;
            }
        }
    }

    Ok(summary)
}

struct EvaluationOutcome {
    enqueued_gas: bool,
    enqueued_consolidation: bool,
    /// Whether a consolidation rule matched this cycle, independent of
    /// whether a job was actually enqueued (gas blocks enqueue but §4.7 step
    /// 2 still wants `needs_consolidation` persisted on the current row).
    needs_consolidation: bool,
}

async fn evaluate_row(
    ds: &dyn Datastore,
    row: &WalletBalance,
) -> Result<EvaluationOutcome, CycleError> {
    let asset = ds
        .get_asset_on_chain(row.asset_on_chain_id)
        .await?
        .ok_or_else(|| CycleError::Other(format!("asset_on_chain {} no longer exists", row.asset_on_chain_id)))?;

    let native_asset = ds
        .get_native_asset_on_chain(asset.chain_id)
        .await?
        .ok_or_else(|| CycleError::Other(format!("chain {} has no native asset", asset.chain_id)))?;

    let native_row = ds
        .get_wallet_balance_by_wallet_asset(row.wallet_id, native_asset.id)
        .await?
        .ok_or_else(|| {
            CycleError::Other(format!(
                "wallet {} has no native-asset balance row for chain {}",
                row.wallet_id, asset.chain_id
            ))
        })?;

    let gas_match = evaluate_gas_rules(ds, &native_row, asset.chain_id, native_asset.id).await?;

    let outcome = if let Some(rule) = gas_match {
        enqueue_gas_and_block_consolidation(ds, row, &native_row, asset.chain_id, asset.id, native_asset.decimals, &rule)
            .await?
    } else {
        ds.set_native_needs_gas(native_row.id, false, Priority::Unknown).await?;
        evaluate_and_enqueue_consolidation(ds, row, asset.chain_id, asset.id).await?
    };

    ds.finalize_planner_row(
        row.id,
        outcome.needs_consolidation || row.needs_consolidation,
        row_priority_after(row, &outcome),
        outcome.enqueued_gas,
        if outcome.enqueued_gas { Priority::High } else { row.gas_priority },
    )
    .await?;

    Ok(outcome)
}

fn row_priority_after(row: &WalletBalance, outcome: &EvaluationOutcome) -> Priority {
    if outcome.enqueued_consolidation {
        Priority::Normal
    } else {
        row.consolidation_priority
    }
}

async fn evaluate_gas_rules(
    ds: &dyn Datastore,
    native_row: &WalletBalance,
    chain_id: Uuid,
    gas_asset_on_chain_id: Uuid,
) -> Result<Option<GasTopupRule>, CycleError> {
    let rules = ds.list_active_gas_rules(chain_id, gas_asset_on_chain_id).await?;
    let mut matched = None;

    for rule in rules {
        let is_match = match rule.operator() {
            Some(op) => compare(&native_row.on_chain_balance_human, &rule.threshold_human, op)
                .unwrap_or(false),
            None => false,
        };
        log_rule(
            ds,
            RuleKind::GasTopup,
            Some(rule.id),
            native_row.id,
            is_match,
            format!(
                "{} {} {} -> {is_match}",
                native_row.on_chain_balance_human, rule.operator, rule.threshold_human
            ),
        )
        .await;
        if is_match && matched.is_none() {
            matched = Some(rule);
        }
    }

    Ok(matched)
}

async fn enqueue_gas_and_block_consolidation(
    ds: &dyn Datastore,
    row: &WalletBalance,
    native_row: &WalletBalance,
    chain_id: Uuid,
    asset_on_chain_id: Uuid,
    gas_asset_decimals: u32,
    rule: &GasTopupRule,
) -> Result<EvaluationOutcome, CycleError> {
    ds.set_native_needs_gas(native_row.id, true, rule.priority).await?;

    // §4.7 step 2: a gas match still evaluates the current row's
    // consolidation rules (logged) and persists `needs_consolidation`, it
    // just withholds the enqueue this cycle — gas blocks consolidation.
    let needs_consolidation = evaluate_consolidation_rules(ds, row, chain_id, asset_on_chain_id)
        .await?
        .is_some();

    let destination = pick_gas_destination(ds, chain_id, rule).await?;

    let enqueued = if let Some(destination) = destination {
        let topup_amount_raw = human_to_raw(&rule.topup_amount_human, gas_asset_decimals)
            .map_err(|e| CycleError::Other(format!("gas rule {} has an unusable topup amount: {e}", rule.id)))?;
        let job = NewGasTopupJob {
            chain_id,
            gas_asset_on_chain_id: native_row.asset_on_chain_id,
            wallet_id: row.wallet_id,
            wallet_balance_id: native_row.id,
            destination_wallet_id: destination.id,
            topup_amount_raw,
            topup_amount_human: rule.topup_amount_human.clone(),
            priority: rule.priority,
        };
        let inserted = GasTopupQueueProvider::enqueue(ds, job).await?;
        if inserted {
            let _ = ds.touch_last_used(destination.id).await;
        }
        inserted
    } else {
        warn!("gas rule {} matched but no destination wallet is available", rule.id);
        false
    };

    Ok(EvaluationOutcome { enqueued_gas: enqueued, enqueued_consolidation: false, needs_consolidation })
}

async fn pick_gas_destination(
    ds: &dyn Datastore,
    chain_id: Uuid,
    rule: &GasTopupRule,
) -> Result<Option<chainops_common::model::OperationWalletAddress>, CycleError> {
    if let Some(preferred_id) = rule.preferred_wallet_id() {
        if let Some(preferred) = ds.get_operation_wallet(preferred_id).await? {
            if preferred.is_active && preferred.chain_id == chain_id {
                return Ok(Some(preferred));
            }
        }
    }

    if let Some(wallet) = ds.pick_round_robin(chain_id, OperationRole::Gas).await? {
        return Ok(Some(wallet));
    }
    Ok(ds.pick_round_robin(chain_id, OperationRole::Hot).await?)
}

async fn evaluate_consolidation_rules(
    ds: &dyn Datastore,
    row: &WalletBalance,
    chain_id: Uuid,
    asset_on_chain_id: Uuid,
) -> Result<Option<ConsolidationRule>, CycleError> {
    let rules = ds.list_active_consolidation_rules(chain_id, asset_on_chain_id).await?;
    let mut matched: Option<ConsolidationRule> = None;

    for rule in rules {
        let is_match = match rule.operator() {
            Some(op) => compare(&row.on_chain_balance_human, &rule.threshold_human, op)
                .unwrap_or(false),
            None => false,
        };
        log_rule(
            ds,
            RuleKind::Consolidation,
            Some(rule.id),
            row.id,
            is_match,
            format!(
                "{} {} {} -> {is_match}",
                row.on_chain_balance_human, rule.operator, rule.threshold_human
            ),
        )
        .await;
        if is_match && matched.is_none() {
            matched = Some(rule);
        }
    }

    Ok(matched)
}

async fn evaluate_and_enqueue_consolidation(
    ds: &dyn Datastore,
    row: &WalletBalance,
    chain_id: Uuid,
    asset_on_chain_id: Uuid,
) -> Result<EvaluationOutcome, CycleError> {
    let Some(_rule) = evaluate_consolidation_rules(ds, row, chain_id, asset_on_chain_id).await? else {
        return Ok(EvaluationOutcome { enqueued_gas: false, enqueued_consolidation: false, needs_consolidation: false });
    };

    // Race safety (§4.7 step 3): re-read `needs_gas` right before enqueueing;
    // another worker's gas match in between must still block consolidation.
    let fresh = ds
        .get_wallet_balance(row.id)
        .await?
        .ok_or_else(|| CycleError::Other(format!("wallet_balance {} disappeared mid-cycle", row.id)))?;
    if fresh.needs_gas {
        return Ok(EvaluationOutcome { enqueued_gas: false, enqueued_consolidation: false, needs_consolidation: true });
    }

    let destination = ds.pick_round_robin(chain_id, OperationRole::Hot).await?;
    let Some(destination) = destination else {
        warn!("consolidation matched for wallet_balance {} but no hot wallet is available", row.id);
        return Ok(EvaluationOutcome { enqueued_gas: false, enqueued_consolidation: false, needs_consolidation: true });
    };

    let job = NewConsolidationJob {
        chain_id,
        wallet_id: row.wallet_id,
        wallet_balance_id: row.id,
        destination_wallet_id: destination.id,
        amount_raw: row.on_chain_balance_raw.clone(),
        amount_human: row.on_chain_balance_human.clone(),
        priority: Priority::Normal,
    };
    let inserted = ConsolidationQueueProvider::enqueue(ds, job).await?;
    if inserted {
        let _ = ds.touch_last_used(destination.id).await;
    }

    Ok(EvaluationOutcome { enqueued_gas: false, enqueued_consolidation: inserted, needs_consolidation: true })
}

async fn log_rule(
    ds: &dyn Datastore,
    kind: RuleKind,
    rule_id: Option<Uuid>,
    wallet_balance_id: Uuid,
    matched: bool,
    detail: String,
) {
    let entry = RuleLogEntry {
        id: Uuid::new_v4(),
        kind,
        rule_id,
        wallet_balance_id,
        matched,
        detail,
        evaluated_at: Utc::now(),
    };
    if let Err(e) = ds.append(entry).await {
        warn!("failed to append rule log for wallet_balance {wallet_balance_id}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        asset_on_chain, consolidation_rule, gas_rule, idle_wallet_balance, operation_wallet, tron_chain, user_wallet,
    };
    use chainops_datastore::memory::InMemoryDatastore;

    #[tokio::test]
    async fn gas_rule_match_blocks_consolidation_in_the_same_cycle() {
        let ds = InMemoryDatastore::new();
        let chain = tron_chain(19);
        let trx = asset_on_chain(chain.id, 6, true);
        let usdt = asset_on_chain(chain.id, 6, false);
        let wallet = user_wallet(chain.id, "tuser");
        let hot = operation_wallet(chain.id, OperationRole::Hot, "Thot");
        let gas = operation_wallet(chain.id, OperationRole::Gas, "Tgas");

        ds.insert_chain(chain.clone());
        ds.insert_asset(trx.clone());
        ds.insert_asset(usdt.clone());
        ds.insert_user_wallet(wallet.clone());
        ds.insert_operation_wallet(hot.clone());
        ds.insert_operation_wallet(gas.clone());
        ds.insert_gas_rule(gas_rule(chain.id, trx.id, "<", "2", "10"));
        ds.insert_consolidation_rule(consolidation_rule(chain.id, usdt.id, ">", "100"));

        let trx_row = idle_wallet_balance(wallet.id, trx.id, "0");
        let usdt_row = idle_wallet_balance(wallet.id, usdt.id, "480");
        ds.insert_wallet_balance(trx_row.clone());
        ds.insert_wallet_balance(usdt_row.clone());

        let summary = run_cycle(&ds, "planner-1", 10).await.unwrap();
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.gas_enqueued, 1);
        assert_eq!(summary.consolidation_enqueued, 0, "P6: gas blocks consolidation in the same cycle");

        let trx_after = ds.get_wallet_balance(trx_row.id).await.unwrap().unwrap();
        let usdt_after = ds.get_wallet_balance(usdt_row.id).await.unwrap().unwrap();
        assert!(trx_after.needs_gas);
        assert!(usdt_after.needs_gas, "§4.7 step 2: needs_gas is also set on the current (non-native) row");
        assert!(usdt_after.needs_consolidation);
    }

    #[tokio::test]
    async fn no_gas_match_enqueues_consolidation_directly() {
        let ds = InMemoryDatastore::new();
        let chain = tron_chain(19);
        let trx = asset_on_chain(chain.id, 6, true);
        let usdt = asset_on_chain(chain.id, 6, false);
        let wallet = user_wallet(chain.id, "tuser");
        let hot = operation_wallet(chain.id, OperationRole::Hot, "Thot");

        ds.insert_chain(chain.clone());
        ds.insert_asset(trx.clone());
        ds.insert_asset(usdt.clone());
        ds.insert_user_wallet(wallet.clone());
        ds.insert_operation_wallet(hot.clone());
        ds.insert_gas_rule(gas_rule(chain.id, trx.id, "<", "2", "10"));
        ds.insert_consolidation_rule(consolidation_rule(chain.id, usdt.id, ">", "100"));

        let trx_row = idle_wallet_balance(wallet.id, trx.id, "10");
        let usdt_row = idle_wallet_balance(wallet.id, usdt.id, "480");
        ds.insert_wallet_balance(trx_row.clone());
        ds.insert_wallet_balance(usdt_row.clone());

        let summary = run_cycle(&ds, "planner-1", 10).await.unwrap();
        assert_eq!(summary.gas_enqueued, 0);
        assert_eq!(summary.consolidation_enqueued, 1);

        let trx_after = ds.get_wallet_balance(trx_row.id).await.unwrap().unwrap();
        assert!(!trx_after.needs_gas);
    }

    #[tokio::test]
    async fn operation_wallet_rows_are_never_leased_or_mutated() {
        let ds = InMemoryDatastore::new();
        let chain = tron_chain(19);
        let usdt = asset_on_chain(chain.id, 6, false);
        let hot = operation_wallet(chain.id, OperationRole::Hot, "Thot");
        ds.insert_chain(chain.clone());
        ds.insert_asset(usdt.clone());
        ds.insert_operation_wallet(hot.clone());

        // An operation wallet's own balance row must never be picked up by
        // the planner (P7) even though it satisfies every other filter.
        let op_row = idle_wallet_balance(hot.id, usdt.id, "1000");
        ds.insert_wallet_balance(op_row.clone());

        let summary = run_cycle(&ds, "planner-1", 10).await.unwrap();
        assert_eq!(summary.leased, 0);
        let unchanged = ds.get_wallet_balance(op_row.id).await.unwrap().unwrap();
        assert_eq!(unchanged, op_row);
    }
}
